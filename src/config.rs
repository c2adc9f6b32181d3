//! Pipeline configuration.

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::motion::MotionConfig;
use crate::tracker::{ExtrapolatorConfig, TrackerConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub tracker: TrackerConfig,
    pub motion: MotionConfig,
    pub extrapolation: ExtrapolatorConfig,
    /// Display boxes extrapolated to the current frame instead of the
    /// motion corrected ones.
    pub extrapolate: bool,
    /// Detect worker waits until its last result was consumed.
    pub back_pressure: bool,
    /// Resize every captured frame to `(width, height)`.
    pub resize: Option<(u32, u32)>,
    pub draw_overlay: bool,
    /// Lower bound for the output frame rate.
    pub min_output_fps: f64,
    /// Recent frames kept to replay optical flow from a late detection.
    pub flow_backlog: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            motion: MotionConfig::default(),
            extrapolation: ExtrapolatorConfig::default(),
            extrapolate: false,
            back_pressure: false,
            resize: None,
            draw_overlay: true,
            min_output_fps: 35.0,
            flow_backlog: 32,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |msg: &str| Err(PipelineError::Config(msg.to_string()));

        if self.tracker.history_frames == 0 {
            return invalid("tracker.history_frames must be at least 1");
        }

        if !(self.tracker.max_distance.is_finite() && self.tracker.max_distance >= 0.0) {
            return invalid("tracker.max_distance must be a non-negative number");
        }

        if self.motion.window_size < 3 {
            return invalid("motion.window_size must be at least 3");
        }

        if self.motion.iterations == 0 {
            return invalid("motion.iterations must be at least 1");
        }

        if !(self.motion.max_displacement > 0.0) {
            return invalid("motion.max_displacement must be positive");
        }

        if let Some(err) = self.motion.flow_error {
            if !(err > 0.0) {
                return invalid("motion.flow_error must be positive");
            }
        }

        if self.extrapolation.capacity < 2 {
            return invalid("extrapolation.capacity must be at least 2");
        }

        if let Some((w, h)) = self.resize {
            if w == 0 || h == 0 {
                return invalid("resize must be non-zero");
            }
        }

        if !(self.min_output_fps.is_finite() && self.min_output_fps > 0.0) {
            return invalid("min_output_fps must be positive");
        }

        if self.motion.enabled && self.flow_backlog == 0 {
            return invalid("flow_backlog must be at least 1 with motion enabled");
        }

        Ok(())
    }
}
