mod estimator;
mod lucas_kanade;
mod plane;

pub use estimator::{
    ErrorPolicy, MotionConfig, MotionEstimator, NoMotion, OpticalFlowEstimator,
    estimator_from_config,
};
pub use lucas_kanade::{FlowPoint, FlowSolver, PyramidalLk};
pub use plane::{Plane, Pyramid};
