//! Display surface the webcam frames are painted on before streaming.
//!
use anyhow::Result;
use bytes::Bytes;
use common::protocol::LabelRow;
use image::{imageops, Rgb, RgbImage};
use imageproc::{drawing::draw_filled_rect_mut, rect::Rect};

/// Fill colour of highlighted bars.
const PRIMARY: Rgb<u8> = Rgb([0x4f, 0x46, 0xe5]);
/// Fill colour of all other bars.
const SECONDARY: Rgb<u8> = Rgb([0x94, 0xa3, 0xb8]);
/// Colour of the unfilled track.
const TRACK: Rgb<u8> = Rgb([0x1e, 0x29, 0x3b]);

const BAR_HEIGHT: u32 = 8;
const BAR_GAP: u32 = 4;
const MARGIN: u32 = 8;

pub struct DisplaySurface {
    width: u32,
    height: u32,
    quality: i32,
    overlay_bars: bool,
}

impl DisplaySurface {
    pub fn new(width: u32, height: u32, quality: i32, overlay_bars: bool) -> Self {
        Self {
            width,
            height,
            quality,
            overlay_bars,
        }
    }

    /// Scale the frame to the surface and draw the bars on top if enabled.
    pub fn render(&self, frame: &RgbImage, rows: &[LabelRow]) -> RgbImage {
        let mut canvas = if frame.dimensions() == (self.width, self.height) {
            frame.clone()
        } else {
            imageops::resize(
                frame,
                self.width,
                self.height,
                imageops::FilterType::Triangle,
            )
        };

        if self.overlay_bars {
            draw_bars(&mut canvas, rows);
        }

        canvas
    }

    /// Render the frame and encode it as one item of a multipart JPEG stream.
    pub fn paint(&self, frame: &RgbImage, rows: &[LabelRow]) -> Result<Bytes> {
        let canvas = self.render(frame, rows);
        let buf = turbojpeg::compress_image(&canvas, self.quality, turbojpeg::Subsamp::Sub2x2)?;
        Ok(as_jpeg_stream_item(&buf))
    }
}

/// Draw one horizontal bar per row, stacked from the bottom edge upwards.
fn draw_bars(canvas: &mut RgbImage, rows: &[LabelRow]) {
    let (width, height) = canvas.dimensions();
    let track_width = width.saturating_sub(2 * MARGIN);
    if track_width == 0 {
        return;
    }

    for (idx, row) in rows.iter().rev().enumerate() {
        let offset = MARGIN + idx as u32 * (BAR_HEIGHT + BAR_GAP) + BAR_HEIGHT;
        if offset > height {
            break;
        }
        let y = (height - offset) as i32;

        draw_filled_rect_mut(
            canvas,
            Rect::at(MARGIN as i32, y).of_size(track_width, BAR_HEIGHT),
            TRACK,
        );

        let fill_width = (track_width as f32 * row.width_percent / 100.0).round() as u32;
        if fill_width > 0 {
            let color = if row.highlighted { PRIMARY } else { SECONDARY };
            draw_filled_rect_mut(
                canvas,
                Rect::at(MARGIN as i32, y).of_size(fill_width, BAR_HEIGHT),
                color,
            );
        }
    }
}

/// Wrap JPEG data as part of a `multipart/x-mixed-replace` body with boundary `frame`.
pub fn as_jpeg_stream_item(data: &[u8]) -> Bytes {
    Bytes::copy_from_slice(
        &[
            "--frame\r\nContent-Type: image/jpeg\r\n\r\n".as_bytes(),
            data,
            "\r\n\r\n".as_bytes(),
        ]
        .concat(),
    )
}
