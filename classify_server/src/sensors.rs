//! Sensors module.
//!
use anyhow::{anyhow, Context, Result};
use image::{imageops, RgbImage};
use rscam::{Camera, Config, IntervalInfo, ResolutionInfo};

use crate::config::Args;

const FORMAT: &[u8] = b"MJPG";

/// Source of webcam frames, already cropped, scaled and mirrored for display.
pub trait FrameSource: Send {
    /// Grab the latest frame.
    fn update(&mut self) -> Result<RgbImage>;
}

/// Webcam on a Linux video device delivering MJPG frames.
pub struct Webcam {
    cam: Camera,
    width: u32,
    height: u32,
    flip: bool,
}

impl Webcam {
    /// Open and start the video device given on the command line.
    pub fn setup(args: &Args) -> Result<Self> {
        let mut cam = Camera::new(&args.device)
            .with_context(|| format!("failed to open camera {}", &args.device))?;
        log_supported_formats(&cam);

        let resolution = pick_resolution(cam.resolutions(FORMAT)?, (args.width, args.height))?;
        let frame_rate = get_max_frame_rate(&cam, resolution)?;

        log::info!(
            "Using camera {} at {}x{}, interval {}/{}",
            &args.device,
            resolution.0,
            resolution.1,
            frame_rate.0,
            frame_rate.1
        );

        cam.start(&Config {
            interval: frame_rate,
            resolution,
            format: FORMAT,
            ..Default::default()
        })
        .with_context(|| format!("failed to start camera {}", &args.device))?;

        Ok(Self {
            cam,
            width: args.width,
            height: args.height,
            flip: args.flip(),
        })
    }
}

impl FrameSource for Webcam {
    fn update(&mut self) -> Result<RgbImage> {
        let frame = self.cam.capture()?;
        let image: RgbImage = turbojpeg::decompress_image(&frame[..])?;
        Ok(fit_frame(&image, self.width, self.height, self.flip))
    }
}

/// Crop the centre of the frame to the target aspect ratio, scale it to the target size and
/// optionally mirror it.
pub fn fit_frame(frame: &RgbImage, width: u32, height: u32, flip: bool) -> RgbImage {
    let (frame_width, frame_height) = frame.dimensions();

    // Widest crop with the target aspect ratio
    let (crop_width, crop_height) =
        if frame_width as u64 * height as u64 > frame_height as u64 * width as u64 {
            ((frame_height as u64 * width as u64 / height as u64) as u32, frame_height)
        } else {
            (frame_width, (frame_width as u64 * height as u64 / width as u64) as u32)
        };

    let cropped = imageops::crop_imm(
        frame,
        (frame_width - crop_width) / 2,
        (frame_height - crop_height) / 2,
        crop_width,
        crop_height,
    )
    .to_image();

    let mut resized = if (crop_width, crop_height) == (width, height) {
        cropped
    } else {
        imageops::resize(&cropped, width, height, imageops::FilterType::Triangle)
    };

    if flip {
        imageops::flip_horizontal_in_place(&mut resized);
    }

    resized
}

/// Pick the smallest supported resolution covering the target size, else the largest one.
fn pick_resolution(resolution_info: ResolutionInfo, target: (u32, u32)) -> Result<(u32, u32)> {
    log::debug!("Found resolutions: {:?}", &resolution_info);
    match resolution_info {
        ResolutionInfo::Discretes(resolutions) => {
            let covering = resolutions
                .iter()
                .filter(|res| res.0 >= target.0 && res.1 >= target.1)
                .min_by_key(|res| res.0 * res.1);
            covering
                .or_else(|| resolutions.iter().max_by_key(|res| res.0 * res.1))
                .copied()
        }
        ResolutionInfo::Stepwise { min, max, step } => {
            let fit = |target: u32, min: u32, max: u32, step: u32| {
                let steps = (target.saturating_sub(min) + step.max(1) - 1) / step.max(1);
                (min + steps * step.max(1)).min(max)
            };
            Some((
                fit(target.0, min.0, max.0, step.0),
                fit(target.1, min.1, max.1, step.1),
            ))
        }
    }
    .ok_or_else(|| anyhow!("no resolution found"))
}

/// Get the maximum supported frame rate for the given resolution.
fn get_max_frame_rate(cam: &Camera, resolution: (u32, u32)) -> Result<(u32, u32)> {
    let interval_info = cam.intervals(FORMAT, resolution)?;
    log::debug!("Found frame rates: {:?}", &interval_info);
    match interval_info {
        IntervalInfo::Discretes(intervals) => intervals
            .iter()
            // Intervals are seconds per frame, the shortest one is the highest frame rate
            .min_by(|a, b| (a.0 as u64 * b.1 as u64).cmp(&(b.0 as u64 * a.1 as u64)))
            .copied(),
        IntervalInfo::Stepwise { min, .. } => Some(min),
    }
    .ok_or_else(|| anyhow!("no frame rate found"))
}

fn log_supported_formats(cam: &Camera) {
    let formats: Vec<_> = cam.formats().filter_map(|fmt| fmt.ok()).collect();
    log::debug!(
        "Supported formats: {:?}, using format {:?}",
        formats,
        std::str::from_utf8(FORMAT)
    );
}

#[cfg(test)]
mod test {

    use super::*;
    use image::Rgb;

    #[test]
    fn get_cam_info_if_available() -> Result<()> {
        let cam_name = "/dev/video0";
        let cam = Camera::new(cam_name);

        match cam {
            Err(err) => println!("Could not initialize camera (maybe non available): {err}"),
            Ok(cam) => {
                let formats: Vec<_> = cam.formats().collect();
                println!("Supported formats: {formats:?}");

                let resolutions = cam.resolutions(FORMAT)?;
                println!("Supported resolutions: {resolutions:?}");

                let selected_resolution = pick_resolution(resolutions, (400, 400))?;
                let frame_rates = cam.intervals(FORMAT, selected_resolution)?;
                println!("Supported frame rates: {frame_rates:?}");
            }
        }

        Ok(())
    }

    #[test]
    fn pick_smallest_covering_resolution() -> Result<()> {
        let info = ResolutionInfo::Discretes(vec![(1280, 720), (320, 240), (640, 480), (1920, 1080)]);
        assert_eq!(pick_resolution(info, (400, 400))?, (640, 480));
        Ok(())
    }

    #[test]
    fn pick_largest_resolution_if_none_covers() -> Result<()> {
        let info = ResolutionInfo::Discretes(vec![(320, 240), (160, 120)]);
        assert_eq!(pick_resolution(info, (400, 400))?, (320, 240));
        Ok(())
    }

    #[test]
    fn pick_stepwise_resolution() -> Result<()> {
        let info = ResolutionInfo::Stepwise {
            min: (160, 120),
            max: (1280, 720),
            step: (16, 16),
        };
        assert_eq!(pick_resolution(info, (400, 400))?, (400, 408));
        Ok(())
    }

    #[test]
    fn no_resolution_is_an_error() {
        assert!(pick_resolution(ResolutionInfo::Discretes(vec![]), (400, 400)).is_err());
    }

    #[test]
    fn fit_frame_crops_centre_square() {
        // Left third red, middle third green, right third blue
        let frame = RgbImage::from_fn(90, 30, |x, _| match x {
            0..=29 => Rgb([255, 0, 0]),
            30..=59 => Rgb([0, 255, 0]),
            _ => Rgb([0, 0, 255]),
        });

        let fitted = fit_frame(&frame, 30, 30, false);

        assert_eq!(fitted.dimensions(), (30, 30));
        assert!(fitted.pixels().all(|p| *p == Rgb([0, 255, 0])));
    }

    #[test]
    fn fit_frame_mirrors() {
        let frame = RgbImage::from_fn(2, 2, |x, _| match x {
            0 => Rgb([255, 0, 0]),
            _ => Rgb([0, 0, 255]),
        });

        let fitted = fit_frame(&frame, 2, 2, true);

        assert_eq!(fitted[(0, 0)], Rgb([0, 0, 255]));
        assert_eq!(fitted[(1, 1)], Rgb([255, 0, 0]));
    }

    #[test]
    fn fit_frame_scales_to_target() {
        let frame = RgbImage::from_pixel(1280, 720, Rgb([10, 20, 30]));
        let fitted = fit_frame(&frame, 400, 400, true);

        assert_eq!(fitted.dimensions(), (400, 400));
        assert_eq!(fitted[(200, 200)], Rgb([10, 20, 30]));
    }
}
