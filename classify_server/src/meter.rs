//! Frame loop timing.
//!
//! The loop has one refresh period per tick. The meter sums how long capture, inference and
//! painting took and how often a tick ran over its period, and hands out a summary per window.
use std::time::{Duration, Instant};

/// Length of one reporting window.
pub const REPORT_WINDOW: Duration = Duration::from_secs(2);

/// Timing of the ticks in one window.
#[derive(Debug, PartialEq)]
pub struct TickSummary {
    pub ticks: u32,
    pub ticks_per_second: f32,
    pub mean_busy: Duration,
    pub slowest: Duration,
    /// Ticks that took longer than the refresh period.
    pub overruns: u32,
    /// Mean busy time as share of the refresh period.
    pub budget_percent: f32,
}

pub struct TickMeter {
    period: Duration,
    window_start: Instant,
    ticks: u32,
    busy: Duration,
    slowest: Duration,
    overruns: u32,
}

impl TickMeter {
    pub fn new(period: Duration) -> Self {
        Self::starting_at(period, Instant::now())
    }

    pub fn starting_at(period: Duration, window_start: Instant) -> Self {
        Self {
            period,
            window_start,
            ticks: 0,
            busy: Duration::ZERO,
            slowest: Duration::ZERO,
            overruns: 0,
        }
    }

    /// Account one tick that kept the loop busy for `busy`.
    pub fn record(&mut self, busy: Duration) {
        self.ticks += 1;
        self.busy += busy;
        self.slowest = self.slowest.max(busy);
        if busy > self.period {
            self.overruns += 1;
        }
    }

    /// Close the window if it is over and return its summary. Empty windows yield nothing.
    pub fn take_report(&mut self, now: Instant) -> Option<TickSummary> {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < REPORT_WINDOW {
            return None;
        }

        let summary = (self.ticks > 0).then(|| {
            let mean_busy = self.busy / self.ticks;
            TickSummary {
                ticks: self.ticks,
                ticks_per_second: self.ticks as f32 / elapsed.as_secs_f32(),
                mean_busy,
                slowest: self.slowest,
                overruns: self.overruns,
                budget_percent: 100.0 * mean_busy.as_secs_f32() / self.period.as_secs_f32(),
            }
        });

        *self = Self::starting_at(self.period, now);

        summary
    }
}
