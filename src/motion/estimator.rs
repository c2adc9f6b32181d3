//! Moves tracked boxes between detector updates.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::integration::Frame;
use crate::motion::lucas_kanade::{FlowPoint, FlowSolver, PyramidalLk};
use crate::motion::plane::Plane;
use crate::tracker::Detection;

/// What happens to a box whose flow measurement was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Remove the box from the tracked set.
    #[default]
    Drop,
    /// Keep the box at its last accepted position, never shifting it again.
    Hold,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub enabled: bool,
    /// Lucas-Kanade window side in pixels
    pub window_size: usize,
    pub max_level: usize,
    pub iterations: usize,
    /// Largest accepted flow residual, `4 * window_size` when unset
    pub flow_error: Option<f32>,
    /// Per axis displacement treated as a tracking failure
    pub max_displacement: f32,
    pub error_policy: ErrorPolicy,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            window_size: 9,
            max_level: 3,
            iterations: 30,
            flow_error: None,
            max_displacement: 100.0,
            error_policy: ErrorPolicy::Drop,
        }
    }
}

impl MotionConfig {
    pub fn flow_error(&self) -> f32 {
        self.flow_error.unwrap_or(self.window_size as f32 * 4.0)
    }
}

/// Two phase box mover: [`prime`](Self::prime) with a detection set, then
/// [`advance`](Self::advance) once per newer frame.
pub trait MotionEstimator: Send {
    /// Start tracking `detections` as seen in `frame`.
    fn prime(&mut self, frame: &Frame, detections: &[Detection]);

    /// Move the tracked set onto `frame` and return it.
    fn advance(&mut self, frame: &Frame) -> Vec<Detection>;

    fn reset(&mut self);

    /// False for estimators that never move boxes.
    fn is_active(&self) -> bool;
}

/// Estimator used when optical flow is disabled: boxes stay where the last
/// detection put them.
#[derive(Debug, Default)]
pub struct NoMotion {
    detections: Vec<Detection>,
}

impl MotionEstimator for NoMotion {
    fn prime(&mut self, _frame: &Frame, detections: &[Detection]) {
        self.detections = detections.to_vec();
    }

    fn advance(&mut self, _frame: &Frame) -> Vec<Detection> {
        self.detections.clone()
    }

    fn reset(&mut self) {
        self.detections.clear();
    }

    fn is_active(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy)]
struct TrackedPoint {
    detection: Detection,
    point: Point2<f32>,
    valid: bool,
}

impl TrackedPoint {
    fn new(detection: Detection) -> Self {
        let (cx, cy) = detection.center();
        Self {
            detection,
            point: Point2::new(cx, cy),
            valid: true,
        }
    }
}

/// Sparse optical flow on box centers.
pub struct OpticalFlowEstimator<S: FlowSolver = PyramidalLk> {
    solver: S,
    config: MotionConfig,
    prev: Option<Plane>,
    tracked: Vec<TrackedPoint>,
}

impl OpticalFlowEstimator<PyramidalLk> {
    pub fn new(config: MotionConfig) -> Self {
        let solver = PyramidalLk::new(config.window_size, config.max_level, config.iterations);
        Self::with_solver(config, solver)
    }
}

impl<S: FlowSolver> OpticalFlowEstimator<S> {
    pub fn with_solver(config: MotionConfig, solver: S) -> Self {
        Self {
            solver,
            config,
            prev: None,
            tracked: Vec::new(),
        }
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    /// Tracked boxes, including held ones.
    pub fn tracked(&self) -> Vec<Detection> {
        self.tracked.iter().map(|t| t.detection).collect()
    }

    fn shifted(&self, tracked: &TrackedPoint, flow: &FlowPoint) -> Option<Detection> {
        if !flow.found || flow.error > self.config.flow_error() {
            return None;
        }

        let moved = flow.position - tracked.point;
        let limit = self.config.max_displacement;
        if moved.x.abs() >= limit || moved.y.abs() >= limit {
            return None;
        }

        let x = tracked.detection.x as f32 + moved.x;
        let y = tracked.detection.y as f32 + moved.y;
        if x <= 0.0 || y <= 0.0 {
            return None;
        }

        let mut det = tracked.detection;
        det.x = (x + 0.5).floor() as u32;
        det.y = (y + 0.5).floor() as u32;
        Some(det)
    }
}

impl<S: FlowSolver> MotionEstimator for OpticalFlowEstimator<S> {
    fn prime(&mut self, frame: &Frame, detections: &[Detection]) {
        self.prev = (!frame.is_empty()).then(|| Plane::from_frame(frame));
        self.tracked = detections.iter().copied().map(TrackedPoint::new).collect();
    }

    fn advance(&mut self, frame: &Frame) -> Vec<Detection> {
        if frame.is_empty() {
            return self.tracked();
        }

        let next = Plane::from_frame(frame);
        let Some(prev) = self.prev.take() else {
            self.prev = Some(next);
            return self.tracked();
        };

        if prev.dims() != next.dims() {
            debug!(
                from = ?prev.dims(),
                to = ?next.dims(),
                "frame size changed, flow cache reset"
            );
            self.prev = Some(next);
            return self.tracked();
        }

        let active: Vec<usize> = (0..self.tracked.len())
            .filter(|&i| self.tracked[i].valid)
            .collect();
        let points: Vec<Point2<f32>> = active.iter().map(|&i| self.tracked[i].point).collect();

        if !points.is_empty() {
            let flows = self.solver.solve(&prev, &next, &points);

            for (&i, flow) in active.iter().zip(flows.iter()) {
                match self.shifted(&self.tracked[i], flow) {
                    Some(det) => {
                        let tracked = &mut self.tracked[i];
                        tracked.detection = det;
                        tracked.point = flow.position;
                    }
                    None => {
                        trace!(
                            track_id = self.tracked[i].detection.track_id,
                            found = flow.found,
                            error = flow.error,
                            "flow point rejected"
                        );
                        self.tracked[i].valid = false;
                    }
                }
            }

            // a solver returning fewer points than asked loses the rest
            for &i in active.iter().skip(flows.len()) {
                self.tracked[i].valid = false;
            }
        }

        if self.config.error_policy == ErrorPolicy::Drop {
            self.tracked.retain(|t| t.valid);
        }

        self.prev = Some(next);
        self.tracked()
    }

    fn reset(&mut self) {
        self.prev = None;
        self.tracked.clear();
    }

    fn is_active(&self) -> bool {
        true
    }
}

/// Pick the estimator named by `config`.
pub fn estimator_from_config(config: &MotionConfig) -> Box<dyn MotionEstimator> {
    if config.enabled {
        Box::new(OpticalFlowEstimator::new(config.clone()))
    } else {
        Box::new(NoMotion::default())
    }
}
