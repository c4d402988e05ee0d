//! Per-frame capture, classification and painting.
//!
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use bytes::Bytes;
use common::protocol::LabelRow;
use tokio::time::{interval, MissedTickBehavior};

use crate::{
    config::Args, labels::LabelBoard, meter::TickMeter, nn::Classifier, pubsub::Publisher,
    sensors::FrameSource, surface::DisplaySurface,
};

/// Knobs of the frame loop taken from the command line.
#[derive(Clone, Debug)]
pub struct LoopSettings {
    pub refresh_rate: u32,
    pub highlight_threshold: f32,
    pub width: u32,
    pub height: u32,
    pub jpeg_quality: i32,
    pub overlay_bars: bool,
}

impl From<&Args> for LoopSettings {
    fn from(args: &Args) -> Self {
        Self {
            refresh_rate: args.refresh_rate,
            highlight_threshold: args.highlight_threshold,
            width: args.width,
            height: args.height,
            jpeg_quality: args.jpeg_quality,
            overlay_bars: args.overlay_bars,
        }
    }
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from(&Args::default())
    }
}

pub struct FrameLoop {
    source: Box<dyn FrameSource>,
    model: Box<dyn Classifier>,
    board: LabelBoard,
    surface: DisplaySurface,
    period: Duration,
}

impl FrameLoop {
    /// Build the loop with one label row per class of the model.
    pub fn new(
        source: Box<dyn FrameSource>,
        model: Box<dyn Classifier>,
        settings: &LoopSettings,
    ) -> Self {
        let board = LabelBoard::new(model.total_classes(), settings.highlight_threshold);
        let surface = DisplaySurface::new(
            settings.width,
            settings.height,
            settings.jpeg_quality,
            settings.overlay_bars,
        );
        let period = Duration::from_secs_f64(1.0 / settings.refresh_rate.max(1) as f64);

        Self {
            source,
            model,
            board,
            surface,
            period,
        }
    }

    pub fn rows(&self) -> &[LabelRow] {
        self.board.rows()
    }

    /// Run a single frame: grab, classify, update the rows and paint.
    ///
    /// Returns the painted frame as multipart stream item.
    pub fn tick(&mut self) -> Result<Bytes> {
        let frame = self.source.update().context("failed to update webcam frame")?;
        let predictions = self.model.predict(&frame).context("failed to classify frame")?;
        self.board.update(&predictions)?;
        self.surface.paint(&frame, self.board.rows())
    }

    /// Tick once per display refresh until an error occurs.
    ///
    /// A tick finishes before the next one starts. Late ticks delay the schedule instead of
    /// bursting to catch up.
    pub async fn run(mut self, publisher: Arc<Publisher>) -> Result<()> {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut meter = TickMeter::new(self.period);

        loop {
            ticker.tick().await;

            let started = Instant::now();
            let painted = self.tick()?;
            meter.record(started.elapsed());

            publisher.publish_rows(self.board.rows());
            publisher.publish_frame(painted);

            if let Some(summary) = meter.take_report(Instant::now()) {
                log::info!(
                    "{:.1} ticks/s, mean {:?} ({:.0}% of period), slowest {:?}, {} overruns, {} viewers",
                    summary.ticks_per_second,
                    summary.mean_busy,
                    summary.budget_percent,
                    summary.slowest,
                    summary.overruns,
                    publisher.viewers()
                );
            }
        }
    }
}
