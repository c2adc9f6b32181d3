//! Threaded capture, detect and encode pipeline for video streams.
//!
//! The main loop runs on the calling thread. Capture and encode run as one
//! short-lived worker per frame, detection as a single long-lived worker.
//! All of them are scoped threads: [`Scheduler::run`] cannot return while
//! any of its workers is still running.

use std::thread::{self, Scope, ScopedJoinHandle};

use tracing::{debug, error, info, trace, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::integration::Frame;
use crate::integration::detector::{Detector, detect_resized};
use crate::integration::handoff::{
    DetectRequest, Detected, ExitFlag, FailOnPanic, Handoff, StopOnDrop,
};
use crate::integration::overlay::draw_detections;
use crate::integration::sink::{FrameSink, OutputSpec};
use crate::integration::source::FrameSource;
use crate::integration::stats::{FpsMeter, RunReport};
use crate::motion::{MotionEstimator, estimator_from_config};
use crate::tracker::{CoordinateExtrapolator, Detection, HistoryRing, TrackManager};

/// Runs a [`Detector`] over frame streams with identity tracking, optical
/// flow correction and extrapolation between detector updates.
pub struct Scheduler<D: Detector> {
    detector: D,
    config: PipelineConfig,
    state: TrackState,
}

impl<D: Detector> Scheduler<D> {
    /// Validate `config` and build the scheduler.
    pub fn new(detector: D, config: PipelineConfig) -> Result<Self> {
        config.validate()?;

        let state = TrackState {
            tracks: TrackManager::new(config.tracker.clone()),
            motion: estimator_from_config(&config.motion),
            extrapolator: CoordinateExtrapolator::new(config.extrapolation.clone()),
            backlog: HistoryRing::with_capacity(config.flow_backlog),
        };

        Ok(Self {
            detector,
            config,
            state,
        })
    }

    /// Replace the motion estimator chosen from the configuration.
    pub fn with_motion(mut self, motion: Box<dyn MotionEstimator>) -> Self {
        self.state.motion = motion;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    pub fn into_detector(self) -> D {
        self.detector
    }

    /// Track state of the last stream.
    pub fn tracks(&self) -> &TrackManager {
        &self.state.tracks
    }

    /// Process one stream until it ends, fails or `exit` is set.
    ///
    /// Track, motion and extrapolation state start fresh for every call.
    pub fn run<S, K>(&mut self, source: &mut S, sink: &mut K, exit: &ExitFlag) -> Result<RunReport>
    where
        S: FrameSource,
        K: FrameSink,
    {
        let Self {
            detector,
            config,
            state,
        } = self;
        let config: &PipelineConfig = config;
        state.reset();

        let shared = Handoff::default();
        let handoff = &shared;
        let ctx = Stream {
            config,
            handoff,
            exit,
            input_size: detector.input_size(),
            live: source.is_live(),
            source_fps: source.frame_rate(),
        };
        info!(
            live = ctx.live,
            input = ?ctx.input_size,
            back_pressure = config.back_pressure,
            "stream started"
        );

        let report = thread::scope(move |scope| -> Result<RunReport> {
            let _stop = StopOnDrop(handoff);
            let back_pressure = config.back_pressure;
            let detect = spawn_named(scope, "detect", move || {
                detect_loop(detector, handoff, exit, back_pressure)
            })?;

            let outcome = drive(scope, ctx, state, source, sink);
            handoff.stop();
            join(detect, "detect")?;
            outcome
        })?;

        info!(
            frames = report.frames,
            written = report.frames_written,
            published = report.published,
            applied = report.applied,
            skipped = report.skipped,
            interrupted = report.interrupted,
            "stream finished"
        );
        Ok(report)
    }

    /// Process streams one after another. A failed stream is logged and
    /// abandoned; the next one still runs. Stops early once `exit` is set.
    pub fn run_each<S, K, I>(&mut self, streams: I, exit: &ExitFlag) -> Vec<Result<RunReport>>
    where
        S: FrameSource,
        K: FrameSink,
        I: IntoIterator<Item = (S, K)>,
    {
        let mut reports = Vec::new();

        for (index, (mut source, mut sink)) in streams.into_iter().enumerate() {
            if exit.is_set() {
                break;
            }

            let outcome = self.run(&mut source, &mut sink, exit);
            if let Err(err) = &outcome {
                error!(stream = index, error = %err, "stream abandoned");
            }
            reports.push(outcome);
        }

        reports
    }
}

/// Single threaded tracking state touched only by the main loop.
struct TrackState {
    tracks: TrackManager,
    motion: Box<dyn MotionEstimator>,
    extrapolator: CoordinateExtrapolator,
    /// Recent frames, to replay optical flow from the frame a late result
    /// was computed on.
    backlog: HistoryRing<Frame>,
}

impl TrackState {
    fn reset(&mut self) {
        self.tracks.reset();
        self.motion.reset();
        self.extrapolator.reset();
        self.backlog.clear();
    }

    /// Feed a detection result to the tracker and re-prime the estimator.
    ///
    /// Returns the tracked set when the estimator had to be primed on
    /// `current` itself, so there is nothing left to advance.
    fn apply(&mut self, detected: Detected, current: &Frame) -> Option<Vec<Detection>> {
        let frame_index = detected.frame_index;
        let assigned = self.tracks.update(detected.detections);
        debug!(frame = frame_index, tracks = assigned.len(), "detections applied");

        if !self.motion.is_active() {
            self.motion.prime(current, &assigned);
            self.extrapolator.record(&assigned, frame_index as f64);
            return None;
        }

        let mut replay = self
            .backlog
            .asc_iter()
            .skip_while(|frame| frame.index() < frame_index);

        match replay.next() {
            Some(base) if base.index() == frame_index => {
                self.motion.prime(base, &assigned);
                for frame in replay {
                    self.motion.advance(frame);
                }
                None
            }
            _ => {
                trace!(frame = frame_index, "result older than flow backlog");
                self.motion.prime(current, &assigned);
                Some(assigned)
            }
        }
    }

    /// Boxes for `frame`: the fresh result if any, moved by optical flow.
    fn step(&mut self, frame: &Frame, detected: Option<Detected>) -> Vec<Detection> {
        let fresh = detected.and_then(|detected| self.apply(detected, frame));
        let current = match fresh {
            Some(current) => current,
            None => self.motion.advance(frame),
        };

        if self.motion.is_active() {
            self.extrapolator.record(&current, frame.index() as f64);
            self.backlog.push(frame.clone());
        }

        current
    }

    /// Apply a result drained at end of stream; nothing is displayed.
    fn absorb(&mut self, detected: Detected) {
        let assigned = self.tracks.update(detected.detections);
        if !self.motion.is_active() {
            self.extrapolator.record(&assigned, detected.frame_index as f64);
        }
    }
}

/// Per-run settings shared by the main loop helpers.
#[derive(Clone, Copy)]
struct Stream<'a> {
    config: &'a PipelineConfig,
    handoff: &'a Handoff,
    exit: &'a ExitFlag,
    input_size: (u32, u32),
    live: bool,
    source_fps: Option<f64>,
}

fn drive<'scope, 'env: 'scope, S, K>(
    scope: &'scope Scope<'scope, 'env>,
    ctx: Stream<'_>,
    state: &mut TrackState,
    source: &'env mut S,
    sink: &'env mut K,
) -> Result<RunReport>
where
    S: FrameSource,
    K: FrameSink,
{
    let Stream {
        config,
        handoff,
        exit,
        input_size: (input_w, input_h),
        live,
        source_fps,
    } = ctx;

    let mut report = RunReport::default();
    let mut output = Output::Closed(sink);
    let mut meter = FpsMeter::new();
    let mut capture = Some(spawn_capture(scope, source, 0, config.resize)?);
    let mut next_index = 1;

    while let Some(handle) = capture.take() {
        let (source, captured) = join(handle, "capture")?;
        let Some(frame) = captured.map_err(PipelineError::frame_source)? else {
            debug!(frames = report.frames, "end of stream");
            break;
        };

        if exit.is_set() {
            report.interrupted = true;
            break;
        }

        capture = Some(spawn_capture(scope, source, next_index, config.resize)?);
        next_index += 1;
        report.frames += 1;

        let (detected, published) = {
            let mut shared = handoff.lock();
            if let Some(err) = shared.failure.take() {
                return Err(err);
            }
            let detected = shared.consume();
            let offered = shared.offer(|| DetectRequest {
                frame: frame.resized(input_w, input_h),
                original: frame.dims(),
            });
            if !offered {
                trace!(frame = frame.index(), "detector busy");
            }
            handoff.notify_consumed();
            (detected, shared.published)
        };

        let current = state.step(&frame, detected);
        let display = if config.extrapolate {
            state.extrapolator.predict(frame.index() as f64)
        } else {
            current
        };

        if matches!(output, Output::Closed(_)) {
            let spec = OutputSpec::new(
                frame.width(),
                frame.height(),
                source_fps,
                config.min_output_fps,
            );
            output = output.open(&spec);
        }

        if output.is_enabled() {
            let mut out = frame;
            if config.draw_overlay {
                draw_detections(&mut out, &display);
            }
            output = output.emit(scope, out, display, !live, &mut report.frames_written)?;
        }

        if !live {
            wait_for_result(handoff, exit);
        }

        if let Some((capture_fps, detect_fps)) = meter.tick(published) {
            debug!(capture_fps, detect_fps, "throughput");
        }
    }

    let pending = {
        let mut shared = handoff.lock();
        shared.request = None;
        while shared.in_flight && !exit.is_set() {
            handoff.wait_published(&mut shared);
        }

        let pending = shared.consume();
        handoff.notify_consumed();
        if let Some(err) = shared.failure.take() {
            return Err(err);
        }

        report.published = shared.published;
        report.applied = shared.applied;
        report.skipped = shared.skipped;
        pending
    };

    if let Some(detected) = pending {
        state.absorb(detected);
    }

    let output = output.settle(true, &mut report.frames_written)?;
    report.output_enabled = output.is_enabled();
    report.interrupted |= exit.is_set();

    Ok(report)
}

/// File mode: wait until the detector caught up with the frame just handed
/// over, so every frame gets a result.
fn wait_for_result(handoff: &Handoff, exit: &ExitFlag) {
    let mut shared = handoff.lock();
    while shared.result.is_none() && shared.failure.is_none() && !shared.finished && !exit.is_set() {
        handoff.wait_published(&mut shared);
    }
}

fn detect_loop<D: Detector>(
    detector: &mut D,
    handoff: &Handoff,
    exit: &ExitFlag,
    back_pressure: bool,
) {
    let _fail_on_panic = FailOnPanic(handoff);
    let stopped = || handoff.is_stopped() || exit.is_set();

    loop {
        let request = {
            let mut shared = handoff.lock();
            loop {
                if stopped() {
                    shared.finished = true;
                    handoff.notify_published();
                    return;
                }
                if let Some(request) = shared.request.take() {
                    shared.in_flight = true;
                    break request;
                }
                handoff.wait_consumed(&mut shared);
            }
        };

        let frame_index = request.frame.index();
        match detect_resized(detector, &request.frame, request.original) {
            Ok(detections) => {
                trace!(frame = frame_index, count = detections.len(), "result published");
                let mut shared = handoff.lock();
                shared.publish(Detected {
                    frame_index,
                    detections,
                });
                handoff.notify_published();

                if back_pressure {
                    while shared.result.is_some() && !stopped() {
                        handoff.wait_consumed(&mut shared);
                    }
                }
            }
            Err(err) => {
                error!(frame = frame_index, error = %err, "detector failed");
                let mut shared = handoff.lock();
                shared.in_flight = false;
                shared.finished = true;
                shared.failure = Some(PipelineError::detector(frame_index, err));
                handoff.notify_published();
                return;
            }
        }
    }
}

type Captured<'env, S> = (
    &'env mut S,
    std::result::Result<Option<Frame>, <S as FrameSource>::Error>,
);

fn spawn_capture<'scope, 'env: 'scope, S: FrameSource>(
    scope: &'scope Scope<'scope, 'env>,
    source: &'env mut S,
    index: u64,
    resize: Option<(u32, u32)>,
) -> Result<ScopedJoinHandle<'scope, Captured<'env, S>>> {
    spawn_named(scope, "capture", move || {
        let captured = source.next_frame().map(|frame| {
            frame.map(|frame| {
                let frame = match resize {
                    Some((w, h)) => frame.resized(w, h),
                    None => frame,
                };
                frame.with_index(index)
            })
        });
        (source, captured)
    })
}

type Encoded<'env, K> = (
    &'env mut K,
    std::result::Result<(), <K as FrameSink>::Error>,
);

/// Output side of the loop. The sink travels into the encode worker and
/// comes back when the worker is joined.
enum Output<'scope, 'env, K: FrameSink> {
    Closed(&'env mut K),
    Ready(&'env mut K),
    Busy(ScopedJoinHandle<'scope, Encoded<'env, K>>),
    Disabled,
}

impl<'scope, 'env: 'scope, K: FrameSink> Output<'scope, 'env, K> {
    fn is_enabled(&self) -> bool {
        !matches!(self, Output::Disabled)
    }

    fn open(self, spec: &OutputSpec) -> Self {
        match self {
            Output::Closed(sink) => match sink.open(spec) {
                Ok(()) => {
                    info!(width = spec.width, height = spec.height, fps = spec.fps, "output opened");
                    Output::Ready(sink)
                }
                Err(err) => {
                    warn!(error = %err, "failed to open output, recording disabled");
                    Output::Disabled
                }
            },
            other => other,
        }
    }

    /// Collect a finished encode unit. With `wait` a running one is joined,
    /// without it a running one is left alone.
    fn settle(self, wait: bool, written: &mut u64) -> Result<Self> {
        match self {
            Output::Busy(handle) if !wait && !handle.is_finished() => Ok(Output::Busy(handle)),
            Output::Busy(handle) => {
                let (sink, result) = join(handle, "encode")?;
                match result {
                    Ok(()) => {
                        *written += 1;
                        Ok(Output::Ready(sink))
                    }
                    Err(err) => {
                        warn!(error = %err, "frame sink failed, recording disabled");
                        Ok(Output::Disabled)
                    }
                }
            }
            other => Ok(other),
        }
    }

    /// Hand `frame` to a new encode unit. Live streams drop the frame while
    /// the previous one is still being written; files wait for it.
    fn emit(
        self,
        scope: &'scope Scope<'scope, 'env>,
        frame: Frame,
        detections: Vec<Detection>,
        wait: bool,
        written: &mut u64,
    ) -> Result<Self> {
        match self.settle(wait, written)? {
            Output::Ready(sink) => {
                let handle = spawn_named(scope, "encode", move || {
                    let result = sink.write(&frame, &detections);
                    (sink, result)
                })?;
                Ok(Output::Busy(handle))
            }
            Output::Busy(handle) => {
                trace!(frame = frame.index(), "encoder busy, frame dropped");
                Ok(Output::Busy(handle))
            }
            other => Ok(other),
        }
    }
}

fn spawn_named<'scope, 'env: 'scope, F, T>(
    scope: &'scope Scope<'scope, 'env>,
    name: &'static str,
    f: F,
) -> Result<ScopedJoinHandle<'scope, T>>
where
    F: FnOnce() -> T + Send + 'scope,
    T: Send + 'scope,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn_scoped(scope, f)
        .map_err(|source| PipelineError::Spawn { name, source })
}

fn join<T>(handle: ScopedJoinHandle<'_, T>, name: &'static str) -> Result<T> {
    handle
        .join()
        .map_err(|_| PipelineError::WorkerPanicked(name))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::tracker::{ExtrapolatorConfig, TrackerConfig};

    /// Moves every primed box 2 px right per advanced frame and logs the
    /// frame each prime happened on.
    struct Slide {
        boxes: Vec<Detection>,
        primed_on: Arc<Mutex<Vec<u64>>>,
    }

    impl MotionEstimator for Slide {
        fn prime(&mut self, frame: &Frame, detections: &[Detection]) {
            self.primed_on.lock().push(frame.index());
            self.boxes = detections.to_vec();
        }

        fn advance(&mut self, _frame: &Frame) -> Vec<Detection> {
            for det in &mut self.boxes {
                det.x += 2;
            }
            self.boxes.clone()
        }

        fn reset(&mut self) {
            self.boxes.clear();
        }

        fn is_active(&self) -> bool {
            true
        }
    }

    fn state(backlog: usize) -> (TrackState, Arc<Mutex<Vec<u64>>>) {
        let primed_on = Arc::new(Mutex::new(Vec::new()));
        let state = TrackState {
            tracks: TrackManager::new(TrackerConfig::default()),
            motion: Box::new(Slide {
                boxes: Vec::new(),
                primed_on: primed_on.clone(),
            }),
            extrapolator: CoordinateExtrapolator::new(ExtrapolatorConfig::default()),
            backlog: HistoryRing::with_capacity(backlog),
        };
        (state, primed_on)
    }

    fn frame(index: u64) -> Frame {
        Frame::blank(8, 8).with_index(index)
    }

    /// Result computed on frame 2, with the box where it was on frame 2.
    fn late_result() -> Detected {
        Detected {
            frame_index: 2,
            detections: vec![Detection::new(44, 40, 10, 10, 0, 0.9)],
        }
    }

    #[test]
    fn test_late_result_is_replayed_from_its_frame() {
        let (mut state, primed_on) = state(32);
        for index in 0..5 {
            assert!(state.step(&frame(index), None).is_empty());
        }

        let out = state.step(&frame(5), Some(late_result()));
        assert_eq!(*primed_on.lock(), vec![2]);
        assert_eq!(out.len(), 1);
        // frames 3, 4 replayed from the backlog, then frame 5 itself
        assert_eq!(out[0].x, 50);
        assert_ne!(out[0].track_id, 0);
    }

    #[test]
    fn test_result_older_than_backlog_is_primed_on_current_frame() {
        let (mut state, primed_on) = state(1);
        for index in 0..5 {
            state.step(&frame(index), None);
        }

        let out = state.step(&frame(5), Some(late_result()));
        assert_eq!(*primed_on.lock(), vec![5]);
        assert_eq!(out[0].x, 44);

        // flow carries on from there
        let out = state.step(&frame(6), None);
        assert_eq!(out[0].x, 46);
    }
}
