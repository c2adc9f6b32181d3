//! Linear extrapolation of box positions between detector updates.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::tracker::detection::Detection;
use crate::tracker::history::HistoryRing;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtrapolatorConfig {
    /// Samples kept per identity. Two are enough for linear extrapolation.
    pub capacity: usize,
    /// Halve a velocity component that reverses sign between the last two
    /// sample intervals.
    pub damp_reversals: bool,
}

impl Default for ExtrapolatorConfig {
    fn default() -> Self {
        Self {
            capacity: 3,
            damp_reversals: false,
        }
    }
}

/// One recorded position of an identity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSample {
    pub track_id: u64,
    pub obj_id: u32,
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub timestamp: f64,
}

impl PositionSample {
    fn from_detection(det: &Detection, timestamp: f64) -> Self {
        Self {
            track_id: det.track_id,
            obj_id: det.obj_id,
            x: det.x as f32,
            y: det.y as f32,
            w: det.w as f32,
            h: det.h as f32,
            timestamp,
        }
    }
}

#[derive(Debug)]
struct TrackHistory {
    latest: Detection,
    samples: HistoryRing<PositionSample>,
}

/// Bounded per-identity position history with linear prediction.
#[derive(Debug)]
pub struct CoordinateExtrapolator {
    config: ExtrapolatorConfig,
    tracks: HashMap<u64, TrackHistory>,
    order: Vec<u64>,
}

impl CoordinateExtrapolator {
    pub fn new(config: ExtrapolatorConfig) -> Self {
        Self {
            config,
            tracks: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.tracks.clear();
        self.order.clear();
    }

    /// Append one sample per tracked detection.
    ///
    /// The recorded set becomes the live set: identities missing from
    /// `detections` are forgotten. A sample at the same timestamp as the
    /// newest one replaces it, an older one is ignored.
    pub fn record(&mut self, detections: &[Detection], timestamp: f64) {
        let capacity = self.config.capacity.max(2);

        self.order.clear();
        for det in detections.iter().filter(|d| d.is_tracked()) {
            if self.order.contains(&det.track_id) {
                continue;
            }
            self.order.push(det.track_id);

            let sample = PositionSample::from_detection(det, timestamp);
            let track = self
                .tracks
                .entry(det.track_id)
                .or_insert_with(|| TrackHistory {
                    latest: *det,
                    samples: HistoryRing::with_capacity(capacity),
                });

            match track.samples.front_mut() {
                Some(newest) if newest.timestamp > timestamp => continue,
                Some(newest) if newest.timestamp == timestamp => *newest = sample,
                _ => {
                    track.samples.push(sample);
                }
            }
            track.latest = *det;
        }

        let live = &self.order;
        self.tracks.retain(|id, _| live.contains(id));
    }

    /// Number of samples held for an identity.
    pub fn samples(&self, track_id: u64) -> usize {
        self.tracks.get(&track_id).map_or(0, |t| t.samples.len())
    }

    /// Predict every live identity at `timestamp`.
    ///
    /// Identities with a single sample are returned unshifted; box sizes are
    /// taken from the newest sample.
    pub fn predict(&self, timestamp: f64) -> Vec<Detection> {
        self.order
            .iter()
            .filter_map(|id| self.tracks.get(id))
            .map(|track| self.predict_track(track, timestamp))
            .collect()
    }

    fn predict_track(&self, track: &TrackHistory, timestamp: f64) -> Detection {
        let mut det = track.latest;
        let (Some(s1), Some(s0)) = (track.samples.get(0), track.samples.get(1)) else {
            if let Some(s1) = track.samples.front() {
                det.x = s1.x as u32;
                det.y = s1.y as u32;
            }
            return det;
        };

        let (mut vx, mut vy) = velocity(s0, s1);

        if self.config.damp_reversals {
            if let Some(older) = track.samples.get(2) {
                let (px, py) = velocity(older, s0);
                if vx * px < 0.0 {
                    vx /= 2.0;
                }
                if vy * py < 0.0 {
                    vy /= 2.0;
                }
            }
        }

        let dt = timestamp - s1.timestamp;
        let x = s1.x as f64 + vx * dt;
        let y = s1.y as f64 + vy * dt;

        det.x = x.max(0.0).round() as u32;
        det.y = y.max(0.0).round() as u32;
        det.w = s1.w as u32;
        det.h = s1.h as u32;

        det
    }
}

fn velocity(from: &PositionSample, to: &PositionSample) -> (f64, f64) {
    let dt = to.timestamp - from.timestamp;
    if dt <= 0.0 {
        return (0.0, 0.0);
    }

    (
        (to.x - from.x) as f64 / dt,
        (to.y - from.y) as f64 / dt,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracked(track_id: u64, x: u32, y: u32) -> Detection {
        let mut det = Detection::new(x, y, 20, 30, 0, 0.8);
        det.track_id = track_id;
        det
    }

    #[test]
    fn test_linear_prediction_is_exact() {
        let mut ex = CoordinateExtrapolator::new(ExtrapolatorConfig::default());
        ex.record(&[tracked(1, 0, 5)], 0.0);
        ex.record(&[tracked(1, 10, 5)], 1.0);

        let out = ex.predict(2.0);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].x, 20);
        assert_eq!(out[0].y, 5);
        assert_eq!((out[0].w, out[0].h), (20, 30));
    }

    #[test]
    fn test_single_sample_is_unshifted() {
        let mut ex = CoordinateExtrapolator::new(ExtrapolatorConfig::default());
        ex.record(&[tracked(4, 33, 44)], 3.0);

        let out = ex.predict(10.0);
        assert_eq!((out[0].x, out[0].y), (33, 44));
    }

    #[test]
    fn test_prediction_clamps_at_origin() {
        let mut ex = CoordinateExtrapolator::new(ExtrapolatorConfig::default());
        ex.record(&[tracked(1, 10, 10)], 0.0);
        ex.record(&[tracked(1, 5, 10)], 1.0);

        let out = ex.predict(5.0);
        assert_eq!(out[0].x, 0);
    }

    #[test]
    fn test_history_is_bounded_and_ordered() {
        let mut ex = CoordinateExtrapolator::new(ExtrapolatorConfig {
            capacity: 2,
            damp_reversals: false,
        });
        for t in 0..5 {
            ex.record(&[tracked(1, t * 2, 0)], t as f64);
        }
        assert_eq!(ex.samples(1), 2);

        // stale timestamp ignored, equal timestamp replaces
        ex.record(&[tracked(1, 100, 0)], 1.0);
        ex.record(&[tracked(1, 10, 0)], 4.0);
        let out = ex.predict(5.0);
        assert_eq!(out[0].x, 14);
    }

    #[test]
    fn test_absent_identities_are_evicted() {
        let mut ex = CoordinateExtrapolator::new(ExtrapolatorConfig::default());
        ex.record(&[tracked(1, 0, 0), tracked(2, 50, 0)], 0.0);
        ex.record(&[tracked(2, 60, 0)], 1.0);

        let out = ex.predict(1.0);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].track_id, 2);
        assert_eq!(ex.samples(1), 0);
    }

    #[test]
    fn test_damped_reversal() {
        let mut ex = CoordinateExtrapolator::new(ExtrapolatorConfig {
            capacity: 3,
            damp_reversals: true,
        });
        ex.record(&[tracked(1, 100, 0)], 0.0);
        ex.record(&[tracked(1, 120, 0)], 1.0);
        ex.record(&[tracked(1, 110, 0)], 2.0);

        // -10 px/frame halved to -5
        let out = ex.predict(4.0);
        assert_eq!(out[0].x, 100);
    }
}
