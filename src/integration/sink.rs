//! Output sinks.

use crate::integration::Frame;
use crate::tracker::Detection;

/// Properties of the recorded output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputSpec {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

impl OutputSpec {
    /// Output at the frame size, never slower than `min_fps`.
    pub fn new(width: u32, height: u32, source_fps: Option<f64>, min_fps: f64) -> Self {
        let fps = source_fps
            .filter(|fps| fps.is_finite())
            .map_or(min_fps, |fps| fps.max(min_fps));

        Self { width, height, fps }
    }
}

/// Consumer of finished frames, in presentation order.
///
/// An error from `open` or `write` disables output for the rest of the
/// stream; the pipeline itself keeps running.
pub trait FrameSink: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    fn open(&mut self, _spec: &OutputSpec) -> Result<(), Self::Error> {
        Ok(())
    }

    /// `detections` are the boxes shown on `frame`.
    fn write(&mut self, frame: &Frame, detections: &[Detection]) -> Result<(), Self::Error>;
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl FrameSink for NullSink {
    type Error = std::convert::Infallible;

    fn write(&mut self, _frame: &Frame, _detections: &[Detection]) -> Result<(), Self::Error> {
        Ok(())
    }
}
