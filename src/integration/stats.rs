//! Throughput counters.

use std::time::{Duration, Instant};

/// Totals for one processed stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Frames pulled from the source and processed
    pub frames: u64,
    /// Frames the sink accepted
    pub frames_written: u64,
    /// Detection results published by the detect worker
    pub published: u64,
    /// Detection results applied to the track state
    pub applied: u64,
    /// Results overwritten before the main loop consumed them
    pub skipped: u64,
    /// The exit flag ended the stream
    pub interrupted: bool,
    /// The sink was still enabled at the end of the stream
    pub output_enabled: bool,
}

/// Capture and detection rates over one second windows.
#[derive(Debug)]
pub(crate) struct FpsMeter {
    window_start: Instant,
    frames: u64,
    published_at_start: u64,
}

impl FpsMeter {
    const WINDOW: Duration = Duration::from_secs(1);

    pub fn new() -> Self {
        Self {
            window_start: Instant::now(),
            frames: 0,
            published_at_start: 0,
        }
    }

    /// Count a frame; once per window returns `(capture_fps, detect_fps)`.
    pub fn tick(&mut self, published: u64) -> Option<(f64, f64)> {
        self.frames += 1;

        let elapsed = self.window_start.elapsed();
        if elapsed < Self::WINDOW {
            return None;
        }

        let secs = elapsed.as_secs_f64();
        let rates = (
            self.frames as f64 / secs,
            published.saturating_sub(self.published_at_start) as f64 / secs,
        );

        self.window_start = Instant::now();
        self.frames = 0;
        self.published_at_start = published;

        Some(rates)
    }
}
