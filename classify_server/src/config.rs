//! Command line configuration.
//!
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// File name of the network inside the model directory.
pub const MODEL_FILE: &str = "model.onnx";
/// File name of the class metadata inside the model directory.
pub const METADATA_FILE: &str = "metadata.json";

/// Memory layout of the network input.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum InputLayout {
    /// `1 x size x size x 3`, as exported from Teachable Machine.
    #[default]
    Nhwc,
    /// `1 x 3 x size x size`
    Nchw,
}

#[derive(Parser, Clone, Debug)]
#[clap(author, version, about = "Classify your webcam stream in the browser")]
pub struct Args {
    /// Address to serve the page on
    #[clap(long, default_value = "127.0.0.1:3000")]
    pub server_address: String,

    /// Directory holding `model.onnx` and `metadata.json`
    #[clap(long, default_value = "./model/")]
    pub model_dir: PathBuf,

    /// Input layout of the network
    #[clap(long, value_enum, default_value_t = InputLayout::Nhwc)]
    pub layout: InputLayout,

    /// Video device to capture from
    #[clap(long, default_value = "/dev/video0")]
    pub device: String,

    /// Width of the webcam frame
    #[clap(long, default_value_t = 400, value_parser = clap::value_parser!(u32).range(1..))]
    pub width: u32,

    /// Height of the webcam frame
    #[clap(long, default_value_t = 400, value_parser = clap::value_parser!(u32).range(1..))]
    pub height: u32,

    /// Do not mirror the webcam frame
    #[clap(long)]
    pub no_flip: bool,

    /// Frame loop ticks per second
    #[clap(long, default_value_t = 60, value_parser = clap::value_parser!(u32).range(1..))]
    pub refresh_rate: u32,

    /// Quality of the JPEG frames on the stream
    #[clap(long, default_value_t = 90, value_parser = clap::value_parser!(i32).range(1..=100))]
    pub jpeg_quality: i32,

    /// Probability above which a bar is highlighted
    #[clap(long, default_value_t = 0.8)]
    pub highlight_threshold: f32,

    /// Paint the probability bars onto the streamed frames as well
    #[clap(long)]
    pub overlay_bars: bool,
}

impl Args {
    pub fn model_path(&self) -> PathBuf {
        self.model_dir.join(MODEL_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.model_dir.join(METADATA_FILE)
    }

    pub fn flip(&self) -> bool {
        !self.no_flip
    }
}

impl Default for Args {
    fn default() -> Self {
        Self::parse_from(["classify_server"])
    }
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn defaults_read_from_fixed_model_dir() {
        let args = Args::default();

        assert_eq!(args.model_path(), PathBuf::from("./model/model.onnx"));
        assert_eq!(args.metadata_path(), PathBuf::from("./model/metadata.json"));
        assert_eq!((args.width, args.height), (400, 400));
        assert!(args.flip());
        assert_eq!(args.layout, InputLayout::Nhwc);
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "classify_server",
            "--model-dir",
            "/opt/models/cats",
            "--layout",
            "nchw",
            "--no-flip",
            "--refresh-rate",
            "30",
        ]);

        assert_eq!(args.model_path(), PathBuf::from("/opt/models/cats/model.onnx"));
        assert_eq!(args.layout, InputLayout::Nchw);
        assert!(!args.flip());
        assert_eq!(args.refresh_rate, 30);
    }

    #[test]
    fn zero_sizes_and_rates_are_rejected() {
        for flag in ["--width", "--height", "--refresh-rate", "--jpeg-quality"] {
            assert!(
                Args::try_parse_from(["classify_server", flag, "0"]).is_err(),
                "{flag} accepted 0"
            );
        }
        assert!(Args::try_parse_from(["classify_server", "--jpeg-quality", "101"]).is_err());
        assert!(Args::try_parse_from(["classify_server", "--jpeg-quality", "100"]).is_ok());
    }
}
