//! Builder for creating Detection objects from various input formats.

use crate::tracker::{Detection, Rect};

/// Builder for creating `Detection` objects from various input formats.
#[derive(Debug, Clone, Default)]
pub struct DetectionBuilder {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    obj_id: u32,
    prob: f32,
}

impl DetectionBuilder {
    /// Create a new detection builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set bounding box in TLBR format (x1, y1, x2, y2).
    pub fn tlbr(mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        self.x1 = x1;
        self.y1 = y1;
        self.x2 = x2;
        self.y2 = y2;
        self
    }

    /// Set bounding box in XYWH format (center_x, center_y, width, height).
    pub fn xywh(mut self, cx: f32, cy: f32, w: f32, h: f32) -> Self {
        self.x1 = cx - w / 2.0;
        self.y1 = cy - h / 2.0;
        self.x2 = cx + w / 2.0;
        self.y2 = cy + h / 2.0;
        self
    }

    /// Set bounding box in TLWH format (left, top, width, height).
    pub fn tlwh(mut self, l: f32, t: f32, w: f32, h: f32) -> Self {
        self.x1 = l;
        self.y1 = t;
        self.x2 = l + w;
        self.y2 = t + h;
        self
    }

    /// Set bounding box from normalized center coordinates (0..1) of an
    /// image of the given size.
    pub fn relative(self, cx: f32, cy: f32, w: f32, h: f32, width: u32, height: u32) -> Self {
        let (iw, ih) = (width as f32, height as f32);
        self.xywh(cx * iw, cy * ih, w * iw, h * ih)
    }

    /// Set the class id.
    pub fn class(mut self, obj_id: u32) -> Self {
        self.obj_id = obj_id;
        self
    }

    /// Set the confidence.
    pub fn prob(mut self, prob: f32) -> Self {
        self.prob = prob;
        self
    }

    /// Build the final `Detection`, clamped to non-negative pixels.
    pub fn build(self) -> Detection {
        let rect = Rect::from_tlbr(self.x1, self.y1, self.x2, self.y2);
        Detection::from_rect(rect, self.obj_id, self.prob.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_builder() {
        let det = DetectionBuilder::new()
            .tlbr(10.0, 20.0, 50.0, 80.0)
            .class(3)
            .prob(0.95)
            .build();

        assert_eq!((det.x, det.y, det.w, det.h), (10, 20, 40, 60));
        assert_eq!(det.obj_id, 3);
        assert_eq!(det.prob, 0.95);
        assert_eq!(det.track_id, 0);
    }

    #[test]
    fn test_relative_box() {
        let det = DetectionBuilder::new()
            .relative(0.5, 0.5, 0.25, 0.5, 400, 200)
            .build();

        assert_eq!((det.x, det.y, det.w, det.h), (150, 50, 100, 100));
    }
}
