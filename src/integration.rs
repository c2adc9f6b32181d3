//! Integration module connecting detectors, frame sources and sinks with
//! the tracker.
//!
//! Collaborators are plugged in through the [`Detector`], [`FrameSource`]
//! and [`FrameSink`] traits. [`TrackerPipeline`] runs them sequentially,
//! [`Scheduler`] overlaps capture, detection and output on worker threads.

mod builder;
mod detector;
mod frame;
mod handoff;
mod labels;
mod overlay;
mod pipeline;
mod scheduler;
mod sink;
mod source;
mod stats;

pub use builder::DetectionBuilder;
pub use detector::{Detector, IntoDetections, detect_resized};
pub use frame::Frame;
pub use handoff::ExitFlag;
pub use labels::ClassNames;
pub use overlay::{class_color, draw_detections};
pub use pipeline::TrackerPipeline;
pub use scheduler::Scheduler;
pub use sink::{FrameSink, NullSink, OutputSpec};
pub use source::{FrameSource, SourceKind};
pub use stats::RunReport;
