//! Shared state between the main loop and the detect worker.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::error::PipelineError;
use crate::integration::Frame;
use crate::tracker::Detection;

/// Upper bound of a single blocking wait; every wait re-checks the exit
/// flags after this long.
pub(crate) const WAIT_SLICE: Duration = Duration::from_millis(10);

/// Cooperative stop request shared with the caller.
///
/// Setting it makes every worker return within one loop iteration and
/// [`Scheduler::run`](crate::Scheduler::run) return an interrupted report.
#[derive(Debug, Clone, Default)]
pub struct ExitFlag(Arc<AtomicBool>);

impl ExitFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Frame handed to the detect worker.
pub(crate) struct DetectRequest {
    /// Frame at the detector input size
    pub frame: Frame,
    /// Size the boxes are mapped back to
    pub original: (u32, u32),
}

/// Published detector output.
#[derive(Debug)]
pub(crate) struct Detected {
    pub frame_index: u64,
    pub detections: Vec<Detection>,
}

#[derive(Default)]
pub(crate) struct HandoffState {
    /// Latest frame waiting for the detector
    pub request: Option<DetectRequest>,
    /// Latest unconsumed result, `None` once consumed
    pub result: Option<Detected>,
    /// The worker is running the detector
    pub in_flight: bool,
    /// The worker has returned
    pub finished: bool,
    pub failure: Option<PipelineError>,
    pub published: u64,
    pub applied: u64,
    pub skipped: u64,
}

impl HandoffState {
    /// Take the pending result, counting it as applied.
    pub fn consume(&mut self) -> Option<Detected> {
        let result = self.result.take();
        if result.is_some() {
            self.applied += 1;
        }
        result
    }

    /// Hand a new frame to an idle worker, replacing one it has not picked
    /// up yet. While a detection is running nothing is built and `false` is
    /// returned.
    pub fn offer(&mut self, request: impl FnOnce() -> DetectRequest) -> bool {
        if self.in_flight {
            return false;
        }
        self.request = Some(request());
        true
    }

    /// Store a result, replacing an unconsumed one.
    pub fn publish(&mut self, detected: Detected) {
        if self.result.replace(detected).is_some() {
            self.skipped += 1;
        }
        self.published += 1;
        self.in_flight = false;
    }
}

/// One lock, two condition variables.
///
/// `published` is signalled by the detect worker when a result (or a
/// failure) is available. `consumed` is signalled by the main loop when it
/// took a result or handed over a new frame.
#[derive(Default)]
pub(crate) struct Handoff {
    state: Mutex<HandoffState>,
    published: Condvar,
    consumed: Condvar,
    stop: AtomicBool,
}

impl Handoff {
    pub fn lock(&self) -> MutexGuard<'_, HandoffState> {
        self.state.lock()
    }

    pub fn notify_published(&self) {
        self.published.notify_all();
    }

    pub fn notify_consumed(&self) {
        self.consumed.notify_all();
    }

    pub fn wait_published(&self, guard: &mut MutexGuard<'_, HandoffState>) {
        self.published.wait_for(guard, WAIT_SLICE);
    }

    pub fn wait_consumed(&self, guard: &mut MutexGuard<'_, HandoffState>) {
        self.consumed.wait_for(guard, WAIT_SLICE);
    }

    /// Ask the detect worker to return.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.notify_consumed();
        self.notify_published();
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// Stops the detect worker when dropped, so an early return from the main
/// loop never leaves it waiting.
pub(crate) struct StopOnDrop<'a>(pub &'a Handoff);

impl Drop for StopOnDrop<'_> {
    fn drop(&mut self) {
        self.0.stop();
    }
}

/// Reports the detect worker as failed if it unwinds, so the main loop
/// never waits for a result that cannot come.
pub(crate) struct FailOnPanic<'a>(pub &'a Handoff);

impl Drop for FailOnPanic<'_> {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            return;
        }

        let mut shared = self.0.lock();
        shared.in_flight = false;
        shared.finished = true;
        shared
            .failure
            .get_or_insert(PipelineError::WorkerPanicked("detect"));
        drop(shared);
        self.0.notify_published();
    }
}
