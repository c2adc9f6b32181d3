//! Sparse pyramidal Lucas-Kanade optical flow.

use nalgebra::{Matrix2, Point2, Vector2};

use crate::motion::plane::{Plane, Pyramid};

/// Flow result for one tracked point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowPoint {
    /// Estimated position in the next frame
    pub position: Point2<f32>,
    /// False when the solver lost the point
    pub found: bool,
    /// Mean absolute intensity residual over the window (0..255 scale)
    pub error: f32,
}

impl FlowPoint {
    pub fn lost(position: Point2<f32>) -> Self {
        Self {
            position,
            found: false,
            error: f32::INFINITY,
        }
    }
}

/// Sparse optical flow between two grayscale frames.
pub trait FlowSolver: Send {
    /// Return one [`FlowPoint`] per input point, in input order.
    fn solve(&mut self, prev: &Plane, next: &Plane, points: &[Point2<f32>]) -> Vec<FlowPoint>;
}

/// Pyramidal Lucas-Kanade tracker (forward additive formulation).
#[derive(Debug, Clone)]
pub struct PyramidalLk {
    /// Side of the square integration window in pixels
    pub window_size: usize,
    /// Reduced pyramid levels on top of the full resolution image
    pub max_level: usize,
    /// Gauss-Newton iterations per level
    pub iterations: usize,
    /// Convergence threshold in pixels
    pub epsilon: f32,
    /// Smallest accepted eigenvalue of the normalized gradient matrix
    pub min_eigen: f32,
}

impl Default for PyramidalLk {
    fn default() -> Self {
        Self::new(9, 3, 30)
    }
}

impl PyramidalLk {
    pub fn new(window_size: usize, max_level: usize, iterations: usize) -> Self {
        Self {
            window_size: window_size.max(3),
            max_level,
            iterations: iterations.max(1),
            epsilon: 0.01,
            min_eigen: 1e-3,
        }
    }

    fn half_window(&self) -> i32 {
        (self.window_size / 2) as i32
    }

    fn track_point(&self, prev: &Pyramid, next: &Pyramid, p: Point2<f32>) -> FlowPoint {
        let levels = prev.num_levels().min(next.num_levels());
        let half = self.half_window();
        let mut guess = Vector2::<f32>::zeros();

        for level in (0..levels).rev() {
            let scale = 1.0 / (1u32 << level) as f32;
            let px = p.x * scale;
            let py = p.y * scale;
            let prev_img = &prev.levels[level];
            let next_img = &next.levels[level];

            let mut patch = Vec::with_capacity(self.window_size * self.window_size);
            let mut g = Matrix2::<f32>::zeros();

            for dy in -half..=half {
                for dx in -half..=half {
                    let x = px + dx as f32;
                    let y = py + dy as f32;
                    let (ix, iy) = prev_img.gradient(x, y);

                    g[(0, 0)] += ix * ix;
                    g[(0, 1)] += ix * iy;
                    g[(1, 1)] += iy * iy;
                    patch.push((x, y, prev_img.sample(x, y), ix, iy));
                }
            }
            g[(1, 0)] = g[(0, 1)];

            if min_eigenvalue(&g) / (patch.len() as f32) < self.min_eigen {
                return FlowPoint::lost(p + guess / scale);
            }

            let Some(g_inv) = g.try_inverse() else {
                return FlowPoint::lost(p + guess / scale);
            };

            let mut v = Vector2::<f32>::zeros();
            for _ in 0..self.iterations {
                let mut b = Vector2::<f32>::zeros();
                for &(x, y, i, ix, iy) in &patch {
                    let diff = i - next_img.sample(x + guess.x + v.x, y + guess.y + v.y);
                    b.x += diff * ix;
                    b.y += diff * iy;
                }

                let eta = g_inv * b;
                v += eta;

                if eta.norm() < self.epsilon {
                    break;
                }
            }

            guess = if level > 0 { (guess + v) * 2.0 } else { guess + v };
        }

        let position = p + guess;
        let base = &next.levels[0];
        if !position.x.is_finite() || !position.y.is_finite() || !base.contains(position.x, position.y)
        {
            return FlowPoint::lost(position);
        }

        FlowPoint {
            position,
            found: true,
            error: self.residual(&prev.levels[0], base, p, guess),
        }
    }

    fn residual(&self, prev: &Plane, next: &Plane, p: Point2<f32>, d: Vector2<f32>) -> f32 {
        let half = self.half_window();
        let mut sum = 0.0;
        let mut count = 0usize;

        for dy in -half..=half {
            for dx in -half..=half {
                let x = p.x + dx as f32;
                let y = p.y + dy as f32;
                sum += (prev.sample(x, y) - next.sample(x + d.x, y + d.y)).abs();
                count += 1;
            }
        }

        sum / count as f32
    }
}

impl FlowSolver for PyramidalLk {
    fn solve(&mut self, prev: &Plane, next: &Plane, points: &[Point2<f32>]) -> Vec<FlowPoint> {
        let min_size = self.window_size as u32;
        let prev_pyr = Pyramid::build(prev, self.max_level, min_size);
        let next_pyr = Pyramid::build(next, self.max_level, min_size);

        points
            .iter()
            .map(|p| self.track_point(&prev_pyr, &next_pyr, *p))
            .collect()
    }
}

fn min_eigenvalue(g: &Matrix2<f32>) -> f32 {
    let a = g[(0, 0)];
    let b = g[(0, 1)];
    let c = g[(1, 1)];
    let half_trace = (a + c) * 0.5;
    let half_diff = (a - c) * 0.5;

    half_trace - (half_diff * half_diff + b * b).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texture(x: f32, y: f32) -> f32 {
        128.0 + 50.0 * (x / 9.0).sin() + 50.0 * (y / 11.0).cos()
    }

    #[test]
    fn test_recovers_subpixel_shift() {
        let (dx, dy) = (2.4, -1.3);
        let prev = Plane::from_fn(160, 120, texture);
        let next = Plane::from_fn(160, 120, |x, y| texture(x - dx, y - dy));

        let mut lk = PyramidalLk::default();
        let out = lk.solve(&prev, &next, &[Point2::new(80.0, 60.0)]);

        assert_eq!(out.len(), 1);
        assert!(out[0].found);
        assert!((out[0].position.x - 82.4).abs() < 0.2, "{:?}", out[0]);
        assert!((out[0].position.y - 58.7).abs() < 0.2, "{:?}", out[0]);
        assert!(out[0].error < 2.0);
    }

    #[test]
    fn test_flat_region_is_lost() {
        let prev = Plane::from_fn(64, 64, |_, _| 100.0);
        let next = prev.clone();

        let mut lk = PyramidalLk::default();
        let out = lk.solve(&prev, &next, &[Point2::new(32.0, 32.0)]);
        assert!(!out[0].found);
    }

    #[test]
    fn test_min_eigenvalue() {
        let g = Matrix2::new(4.0, 0.0, 0.0, 1.0);
        assert!((min_eigenvalue(&g) - 1.0).abs() < 1e-6);
    }
}
