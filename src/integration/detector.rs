//! Trait for object detection inference backends.

use crate::integration::Frame;
use crate::tracker::Detection;

/// Trait for object detection inference backends.
///
/// Implement this trait to connect any detection model to the pipeline. The
/// detector is long lived: it is called repeatedly from the detect worker and
/// must return an empty list, not an error, for a frame without objects.
/// Device selection belongs to the implementation's constructor.
///
/// # Example
///
/// ```ignore
/// use flowtrack_rs::{Detection, Detector, Frame};
///
/// struct MyDetector {
///     // Your model here
/// }
///
/// impl Detector for MyDetector {
///     type Error = std::io::Error;
///
///     fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Self::Error> {
///         // Run inference and return boxes in `frame` pixels
///         Ok(vec![])
///     }
///
///     fn input_width(&self) -> u32 { 416 }
///     fn input_height(&self) -> u32 { 416 }
/// }
/// ```
pub trait Detector: Send {
    /// Error type for detection failures.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Run inference on a frame of the network input size.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Self::Error>;

    /// Network input width in pixels.
    fn input_width(&self) -> u32;

    /// Network input height in pixels.
    fn input_height(&self) -> u32;

    fn input_size(&self) -> (u32, u32) {
        (self.input_width(), self.input_height())
    }
}

/// Run `detector` on a frame already resized to its input size and map the
/// boxes back to `original` frame dimensions.
pub fn detect_resized<D: Detector + ?Sized>(
    detector: &mut D,
    resized: &Frame,
    original: (u32, u32),
) -> Result<Vec<Detection>, D::Error> {
    let mut detections = detector.detect(resized)?;
    let from = resized.dims();

    for det in &mut detections {
        det.rescale(from, original);
    }

    Ok(detections)
}

/// Helper trait for converting model-specific outputs to `Detection`.
///
/// Implement this for your model's output format to enable easy conversion.
pub trait IntoDetections {
    /// Convert the output into a vector of detections.
    fn into_detections(self) -> Vec<Detection>;
}

impl IntoDetections for Vec<Detection> {
    fn into_detections(self) -> Vec<Detection> {
        self
    }
}
