//! Identity assignment across frames.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::tracker::detection::{Detection, MAX_FRAMES_COUNTER};
use crate::tracker::history::HistoryRing;

/// Configuration for the TrackManager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Number of previously returned frames searched for a match.
    pub history_frames: usize,
    /// Largest center distance, in pixels, that still counts as the same object.
    pub max_distance: f32,
    /// Bridge momentary detector misses with the previous detections.
    pub retain_unmatched: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            history_frames: 10,
            max_distance: 150.0,
            retain_unmatched: true,
        }
    }
}

pub struct TrackManager {
    history: HistoryRing<Vec<Detection>>,
    previous: Vec<Detection>,
    next_id: u64,
    config: TrackerConfig,
}

impl TrackManager {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            history: HistoryRing::with_capacity(config.history_frames),
            previous: Vec::new(),
            next_id: 1,
            config,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Forget every identity. Minted ids keep increasing so they are never
    /// reused by the same manager.
    pub fn reset(&mut self) {
        self.history.clear();
        self.previous.clear();
    }

    /// Assign identities and push the result into the history window.
    ///
    /// With `retain_unmatched` the detections returned by the previous call
    /// that found no counterpart here are merged back in, see
    /// [`merge_retained`].
    pub fn assign(&mut self, detections: Vec<Detection>, retain_unmatched: bool) -> Vec<Detection> {
        let assigned = self.match_history(detections);
        self.history.push(assigned.clone());

        if !retain_unmatched {
            self.previous = assigned.clone();
            return assigned;
        }

        let mut merged = assigned;
        merge_retained(&self.previous, &mut merged);
        self.previous = merged.clone();

        merged
    }

    /// [`assign`](Self::assign) driven by the configured retention mode.
    pub fn update(&mut self, detections: Vec<Detection>) -> Vec<Detection> {
        let retain = self.config.retain_unmatched;
        self.assign(detections, retain)
    }

    /// Assign identities without touching the history window.
    ///
    /// Ids minted here are still unique for this manager.
    pub fn peek(&mut self, detections: Vec<Detection>) -> Vec<Detection> {
        self.match_history(detections)
    }

    /// Detections returned by the last [`assign`](Self::assign) call.
    pub fn previous(&self) -> &[Detection] {
        &self.previous
    }

    fn mint_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn match_history(&mut self, mut detections: Vec<Detection>) -> Vec<Detection> {
        let mut claimed: HashSet<u64> = detections
            .iter()
            .filter(|d| d.is_tracked())
            .map(|d| d.track_id)
            .collect();

        for idx in 0..detections.len() {
            if detections[idx].is_tracked() {
                continue;
            }

            let (track_id, frames_counter) =
                match self.closest_in_history(&detections[idx], &claimed) {
                    Some((track_id, frames_counter)) => {
                        (track_id, (frames_counter + 1).min(MAX_FRAMES_COUNTER))
                    }
                    None => {
                        let track_id = self.mint_id();
                        trace!(track_id, obj_id = detections[idx].obj_id, "minted track id");
                        (track_id, 0)
                    }
                };

            let det = &mut detections[idx];
            det.track_id = track_id;
            det.frames_counter = frames_counter;
            claimed.insert(track_id);
        }

        detections
    }

    /// Search the window newest frame first; the first frame holding an
    /// eligible candidate decides. Ties keep the earliest candidate.
    fn closest_in_history(&self, det: &Detection, claimed: &HashSet<u64>) -> Option<(u64, u32)> {
        for frame in self.history.iter() {
            let mut best: Option<(f32, &Detection)> = None;

            for prev in frame {
                if prev.obj_id != det.obj_id || claimed.contains(&prev.track_id) {
                    continue;
                }

                let dist = prev.center_distance(det);
                if dist > self.config.max_distance {
                    continue;
                }

                if best.is_none_or(|(best_dist, _)| dist < best_dist) {
                    best = Some((dist, prev));
                }
            }

            if let Some((_, prev)) = best {
                return Some((prev.track_id, prev.frames_counter));
            }
        }

        None
    }
}

/// Merge detections of the previous frame that are missing from `current`.
///
/// A missing detection with `frames_counter = c > 0` is carried over with
/// `c - 1`, so it bridges at most `c` frames. A detection present in both
/// takes the previous counter plus one, capped at [`MAX_FRAMES_COUNTER`].
pub fn merge_retained(previous: &[Detection], current: &mut Vec<Detection>) {
    for old in previous {
        match current.iter_mut().find(|d| d.same_identity(old)) {
            Some(det) => {
                det.frames_counter = (old.frames_counter + 1).min(MAX_FRAMES_COUNTER);
            }
            None if old.frames_counter > 0 => {
                let mut stale = *old;
                stale.frames_counter -= 1;
                current.push(stale);
            }
            None => {}
        }
    }
}
