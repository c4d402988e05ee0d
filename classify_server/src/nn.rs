//! Image classification network.
//!
//! The model directory holds an ONNX graph together with a `metadata.json` naming the classes in
//! output order, as produced by exporting a Teachable Machine image project and converting the
//! graph to ONNX.
use std::path::Path;

use anyhow::{bail, Context, Result};
use common::protocol::Prediction;
use image::RgbImage;
use serde::Deserialize;
use tract_onnx::prelude::*;

use crate::config::{Args, InputLayout};

type NnModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Divisor mapping `u8` pixels to `[0, 2]` before shifting to `[-1, 1]`.
const PIXEL_SCALE: f32 = 127.0;

/// Allowed deviation of the score sum from one to treat scores as probabilities.
const SUM_TOLERANCE: f32 = 1.0e-3;

/// Anything that turns a frame into one prediction per class.
pub trait Classifier: Send {
    /// Number of classes, which is also the length of every prediction vector.
    fn total_classes(&self) -> usize;

    /// Classify a frame. Predictions are in class order.
    fn predict(&self, frame: &RgbImage) -> Result<Vec<Prediction>>;
}

/// Content of `metadata.json`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default)]
    pub model_name: Option<String>,
    pub labels: Vec<String>,
    #[serde(default = "default_image_size")]
    pub image_size: u32,
}

fn default_image_size() -> u32 {
    224
}

impl Metadata {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("malformed {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let metadata: Metadata = serde_json::from_str(content)?;
        if metadata.labels.is_empty() {
            bail!("metadata lists no class labels");
        }
        if metadata.image_size == 0 {
            bail!("image size must be positive");
        }

        Ok(metadata)
    }
}

pub struct ImageModel {
    model: NnModel,
    labels: Vec<String>,
    image_size: u32,
    layout: InputLayout,
}

impl ImageModel {
    /// Load the network and its metadata from the paths given on the command line.
    pub fn load(args: &Args) -> Result<Self> {
        let metadata = Metadata::from_path(args.metadata_path())?;
        let model = load_onnx(&args.model_path(), metadata.image_size, args.layout)?;

        log::info!(
            "Loaded model {} with {} classes",
            metadata.model_name.as_deref().unwrap_or("<unnamed>"),
            metadata.labels.len()
        );

        Ok(Self {
            model,
            labels: metadata.labels,
            image_size: metadata.image_size,
            layout: args.layout,
        })
    }
}

impl Classifier for ImageModel {
    fn total_classes(&self) -> usize {
        self.labels.len()
    }

    fn predict(&self, frame: &RgbImage) -> Result<Vec<Prediction>> {
        let input = tvec!(preproc(frame, self.image_size, self.layout).into());
        let raw_nn_out = self.model.run(input)?;
        let Some(output) = raw_nn_out.first() else {
            bail!("network produced no output");
        };
        postproc(output, &self.labels)
    }
}

fn load_onnx(path: &Path, image_size: u32, layout: InputLayout) -> Result<NnModel> {
    let size = image_size as usize;
    let shape = match layout {
        InputLayout::Nhwc => tvec!(1, size, size, 3),
        InputLayout::Nchw => tvec!(1, 3, size, size),
    };
    let input_fact = InferenceFact::dt_shape(f32::datum_type(), shape);

    let model = tract_onnx::onnx()
        .model_for_path(path)
        .with_context(|| format!("failed to read {}", path.display()))?
        .with_input_fact(0, input_fact)?
        .into_optimized()?
        .into_runnable()?;

    Ok(model)
}

/// Crop the centre square of the frame, resize it to the network input and scale to `[-1, 1]`.
fn preproc(frame: &RgbImage, image_size: u32, layout: InputLayout) -> Tensor {
    let side = frame.width().min(frame.height());
    let x = (frame.width() - side) / 2;
    let y = (frame.height() - side) / 2;
    let cropped = image::imageops::crop_imm(frame, x, y, side, side).to_image();

    let resized: RgbImage = image::imageops::resize(
        &cropped,
        image_size,
        image_size,
        image::imageops::FilterType::Triangle,
    );

    let size = image_size as usize;
    let scale = |x: usize, y: usize, c: usize| {
        resized[(x as _, y as _)][c] as f32 / PIXEL_SCALE - 1.0
    };

    match layout {
        InputLayout::Nhwc => {
            tract_ndarray::Array4::from_shape_fn((1, size, size, 3), |(_, y, x, c)| scale(x, y, c))
                .into()
        }
        InputLayout::Nchw => {
            tract_ndarray::Array4::from_shape_fn((1, 3, size, size), |(_, c, y, x)| scale(x, y, c))
                .into()
        }
    }
}

/// Turn the first network output into one prediction per label.
fn postproc(output: &Tensor, labels: &[String]) -> Result<Vec<Prediction>> {
    let scores: Vec<f32> = output.to_array_view::<f32>()?.iter().cloned().collect();

    if scores.len() != labels.len() {
        bail!(
            "network produced {} scores for {} classes",
            scores.len(),
            labels.len()
        );
    }

    Ok(labels
        .iter()
        .zip(into_probabilities(scores))
        .map(|(label, probability)| Prediction::new(label.as_str(), probability))
        .collect())
}

/// Pass probability distributions through, softmax anything else. Results lie within `[0, 1]`.
fn into_probabilities(scores: Vec<f32>) -> Vec<f32> {
    let in_range = scores.iter().all(|s| (0.0..=1.0).contains(s));
    let sum: f32 = scores.iter().sum();

    let probabilities = if in_range && (sum - 1.0).abs() <= SUM_TOLERANCE {
        scores
    } else {
        softmax(&scores)
    };

    probabilities
        .into_iter()
        .map(|p| if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) })
        .collect()
}

fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
