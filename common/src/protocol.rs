//! Messages exchanged with the page.
//!
//! Field names are camel-cased on the wire so the page script can use them directly.
use serde::{Deserialize, Serialize};

/// Probability of one class for one frame.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub class_name: String,
    pub probability: f32,
}

impl Prediction {
    pub fn new(class_name: impl Into<String>, probability: f32) -> Self {
        Self {
            class_name: class_name.into(),
            probability,
        }
    }
}

/// One row of the label container, bound by index to a class.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelRow {
    /// Class name shown left of the bar.
    pub name: String,
    /// Width of the filled part of the bar in percent, always within `[0, 100]`.
    pub width_percent: f32,
    /// Probability with two decimals.
    pub prob_text: String,
    /// Whether the bar is painted in the primary colour.
    pub highlighted: bool,
}

/// State of the start control and the elements around it.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub start_enabled: bool,
    pub loading: bool,
    /// Text of the overlay on top of the canvas, `None` if hidden.
    pub overlay: Option<String>,
    pub error: Option<String>,
    pub total_classes: usize,
}

impl Default for Status {
    fn default() -> Self {
        Self {
            start_enabled: true,
            loading: false,
            overlay: Some("Click Start to begin".into()),
            error: None,
            total_classes: 0,
        }
    }
}
