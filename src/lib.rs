//! Real-time multi-object tracking between a slow asynchronous detector and a
//! fast frame source.
//!
//! - [`tracker`]: identity assignment ([`TrackManager`]) and linear
//!   extrapolation ([`CoordinateExtrapolator`]).
//! - [`motion`]: pyramidal Lucas-Kanade optical flow that moves boxes between
//!   detector updates.
//! - [`integration`]: collaborator traits and the threaded [`Scheduler`].

pub mod config;
pub mod error;
pub mod integration;
pub mod motion;
pub mod tracker;

pub use config::PipelineConfig;
pub use error::{BoxError, PipelineError};
pub use integration::{
    ClassNames, DetectionBuilder, Detector, ExitFlag, Frame, FrameSink, FrameSource,
    IntoDetections, NullSink, OutputSpec, RunReport, Scheduler, SourceKind, TrackerPipeline,
    draw_detections,
};
pub use motion::{
    ErrorPolicy, FlowPoint, FlowSolver, MotionConfig, MotionEstimator, NoMotion,
    OpticalFlowEstimator, PyramidalLk,
};
pub use tracker::{
    CoordinateExtrapolator, Detection, ExtrapolatorConfig, HistoryRing, PositionSample, Rect,
    TrackManager, TrackerConfig, merge_retained,
};
