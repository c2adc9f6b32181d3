//! TrackerPipeline for combining detection with tracking on still images.

use crate::integration::detector::{Detector, IntoDetections, detect_resized};
use crate::integration::Frame;
use crate::tracker::{Detection, TrackManager, TrackerConfig};

/// A combined tracker that bundles detection inference with identity
/// tracking, one frame at a time on the calling thread.
///
/// Suited to single images and image lists. Video streams go through the
/// [`Scheduler`](crate::Scheduler), which overlaps capture, detection and
/// output.
pub struct TrackerPipeline<D: Detector> {
    detector: D,
    tracker: TrackManager,
}

impl<D: Detector> TrackerPipeline<D> {
    /// Create a new tracking pipeline with the given detector and tracker config.
    pub fn new(detector: D, config: TrackerConfig) -> Self {
        Self {
            detector,
            tracker: TrackManager::new(config),
        }
    }

    /// Create a new tracking pipeline with default tracker configuration.
    pub fn with_default_config(detector: D) -> Self {
        Self::new(detector, TrackerConfig::default())
    }

    /// Detect on `frame` resized to the detector input and return the
    /// tracked boxes in `frame` pixels.
    pub fn process_frame(&mut self, frame: &Frame) -> Result<Vec<Detection>, D::Error> {
        let (w, h) = self.detector.input_size();
        let resized = frame.resized(w, h);
        let detections = detect_resized(&mut self.detector, &resized, frame.dims())?;

        Ok(self.tracker.update(detections))
    }

    /// Track detections produced outside the pipeline.
    pub fn track<I: IntoDetections>(&mut self, output: I) -> Vec<Detection> {
        self.tracker.update(output.into_detections())
    }

    /// Get a reference to the underlying detector.
    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Get a mutable reference to the underlying detector.
    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    /// Get a reference to the underlying tracker.
    pub fn tracker(&self) -> &TrackManager {
        &self.tracker
    }

    /// Get a mutable reference to the underlying tracker.
    pub fn tracker_mut(&mut self) -> &mut TrackManager {
        &mut self.tracker
    }
}
