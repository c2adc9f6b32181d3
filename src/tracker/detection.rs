//! Detection record shared by the detector, the tracker and the output stage.

use crate::tracker::rect::Rect;

/// Upper bound of [`Detection::frames_counter`].
pub const MAX_FRAMES_COUNTER: u32 = 3;

/// One bounding box for a single frame.
///
/// Produced fresh by a detector with `track_id == 0` and enriched in place by
/// the [`TrackManager`](crate::tracker::TrackManager).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Detection {
    /// Top-left x coordinate in pixels
    pub x: u32,
    /// Top-left y coordinate in pixels
    pub y: u32,
    /// Box width in pixels
    pub w: u32,
    /// Box height in pixels
    pub h: u32,
    /// Class label
    pub obj_id: u32,
    /// Detection confidence in `[0, 1]`
    pub prob: f32,
    /// Identity across frames, 0 while unassigned
    pub track_id: u64,
    /// Consecutive frames this identity has been confirmed, saturating at
    /// [`MAX_FRAMES_COUNTER`]
    pub frames_counter: u32,
}

impl Detection {
    pub fn new(x: u32, y: u32, w: u32, h: u32, obj_id: u32, prob: f32) -> Self {
        Self {
            x,
            y,
            w,
            h,
            obj_id,
            prob,
            track_id: 0,
            frames_counter: 0,
        }
    }

    /// Build a detection from a floating point box, rounding to whole pixels
    /// and clamping negative coordinates to the image origin.
    pub fn from_rect(rect: Rect, obj_id: u32, prob: f32) -> Self {
        let [x1, y1, x2, y2] = rect.to_tlbr();
        let x1 = x1.max(0.0).round();
        let y1 = y1.max(0.0).round();
        let x2 = x2.max(x1).round();
        let y2 = y2.max(y1).round();

        Self::new(
            x1 as u32,
            y1 as u32,
            (x2 - x1) as u32,
            (y2 - y1) as u32,
            obj_id,
            prob,
        )
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x as f32, self.y as f32, self.w as f32, self.h as f32)
    }

    /// Center of the box in pixels.
    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (
            self.x as f32 + self.w as f32 / 2.0,
            self.y as f32 + self.h as f32 / 2.0,
        )
    }

    /// Euclidean distance between box centers.
    #[inline]
    pub fn center_distance(&self, other: &Detection) -> f32 {
        self.rect().center_distance(&other.rect())
    }

    #[inline]
    pub fn is_tracked(&self) -> bool {
        self.track_id != 0
    }

    /// Same physical object: identical identity and class.
    #[inline]
    pub fn same_identity(&self, other: &Detection) -> bool {
        self.track_id == other.track_id && self.obj_id == other.obj_id
    }

    /// Rescale a box detected on a `from` sized image to a `to` sized image.
    pub fn rescale(&mut self, from: (u32, u32), to: (u32, u32)) {
        if from == to || from.0 == 0 || from.1 == 0 {
            return;
        }

        let wk = to.0 as f32 / from.0 as f32;
        let hk = to.1 as f32 / from.1 as f32;

        self.x = (self.x as f32 * wk).round() as u32;
        self.w = (self.w as f32 * wk).round() as u32;
        self.y = (self.y as f32 * hk).round() as u32;
        self.h = (self.h as f32 * hk).round() as u32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_distance() {
        let a = Detection::new(0, 0, 10, 10, 0, 0.9);
        let b = Detection::new(30, 40, 10, 10, 0, 0.9);
        assert_eq!(a.center(), (5.0, 5.0));
        assert!((a.center_distance(&b) - 50.0).abs() < 1e-4);
    }

    #[test]
    fn test_from_rect_clamps_negative() {
        let det = Detection::from_rect(Rect::new(-4.0, 2.4, 10.0, 10.0), 1, 0.5);
        assert_eq!((det.x, det.y, det.w, det.h), (0, 2, 6, 10));
        assert_eq!(det.track_id, 0);
    }

    #[test]
    fn test_rescale() {
        let mut det = Detection::new(100, 50, 20, 10, 0, 0.9);
        det.rescale((416, 416), (832, 208));
        assert_eq!((det.x, det.y, det.w, det.h), (200, 25, 40, 5));
    }

    #[test]
    fn test_rescale_same_size_is_identity() {
        let mut det = Detection::new(7, 9, 3, 4, 0, 0.9);
        det.rescale((640, 480), (640, 480));
        assert_eq!((det.x, det.y, det.w, det.h), (7, 9, 3, 4));
    }
}
