//! Label rows showing the per-class probabilities.
use anyhow::{bail, Result};
use common::protocol::{LabelRow, Prediction};

/// Width of a probability bar in percent.
pub fn bar_width(probability: f32) -> f32 {
    if probability.is_nan() {
        return 0.0;
    }
    (probability * 100.0).clamp(0.0, 100.0)
}

/// The label container: one row per class, created once and updated in place every frame.
#[derive(Debug)]
pub struct LabelBoard {
    rows: Vec<LabelRow>,
    highlight_threshold: f32,
}

impl LabelBoard {
    pub fn new(total_classes: usize, highlight_threshold: f32) -> Self {
        Self {
            rows: vec![LabelRow::default(); total_classes],
            highlight_threshold,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[LabelRow] {
        &self.rows
    }

    /// Write the prediction at index `i` into row `i`.
    pub fn update(&mut self, predictions: &[Prediction]) -> Result<()> {
        if predictions.len() != self.rows.len() {
            bail!(
                "got {} predictions for {} label rows",
                predictions.len(),
                self.rows.len()
            );
        }

        for (row, prediction) in self.rows.iter_mut().zip(predictions) {
            row.name.clone_from(&prediction.class_name);
            row.width_percent = bar_width(prediction.probability);
            row.prob_text = format!("{:.2}", prediction.probability);
            row.highlighted = prediction.probability > self.highlight_threshold;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn one_row_per_class() {
        let board = LabelBoard::new(3, 0.8);
        assert_eq!(board.len(), 3);
        assert!(board.rows().iter().all(|row| row.name.is_empty()));
        assert!(LabelBoard::new(0, 0.8).is_empty());
    }

    #[test]
    fn bar_width_is_clamped_percentage() {
        assert_eq!(bar_width(0.0), 0.0);
        assert_eq!(bar_width(0.5), 50.0);
        assert_eq!(bar_width(1.0), 100.0);
        assert_eq!(bar_width(1.5), 100.0);
        assert_eq!(bar_width(-0.2), 0.0);
        assert_eq!(bar_width(f32::NAN), 0.0);
    }

    #[test]
    fn rows_follow_predictions_by_index() -> Result<()> {
        let mut board = LabelBoard::new(2, 0.8);

        board.update(&[Prediction::new("Cat", 0.9), Prediction::new("Dog", 0.1)])?;
        assert_eq!(
            board.rows(),
            &[
                LabelRow {
                    name: "Cat".into(),
                    width_percent: 90.0,
                    prob_text: "0.90".into(),
                    highlighted: true,
                },
                LabelRow {
                    name: "Dog".into(),
                    width_percent: 10.0,
                    prob_text: "0.10".into(),
                    highlighted: false,
                },
            ]
        );

        board.update(&[Prediction::new("Cat", 0.25), Prediction::new("Dog", 0.75)])?;
        assert_eq!(board.rows()[0].prob_text, "0.25");
        assert!(!board.rows()[0].highlighted);
        assert_eq!(board.rows()[1].width_percent, 75.0);

        Ok(())
    }

    #[test]
    fn highlight_is_strictly_above_threshold() -> Result<()> {
        let mut board = LabelBoard::new(1, 0.8);
        board.update(&[Prediction::new("a", 0.8)])?;
        assert!(!board.rows()[0].highlighted);
        Ok(())
    }

    #[test]
    fn prediction_count_must_match_rows() {
        let mut board = LabelBoard::new(2, 0.8);
        assert!(board.update(&[Prediction::new("only", 1.0)]).is_err());
    }
}
