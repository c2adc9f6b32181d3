//! Grayscale intensity planes and image pyramids for optical flow.

use image::GrayImage;
use ndarray::Array2;

use crate::integration::Frame;

/// Single channel `f32` image, indexed `[row, column]`.
#[derive(Debug, Clone)]
pub struct Plane {
    data: Array2<f32>,
}

impl Plane {
    pub fn from_gray(img: &GrayImage) -> Self {
        let (w, h) = img.dimensions();
        let data = Array2::from_shape_fn((h as usize, w as usize), |(r, c)| {
            img.get_pixel(c as u32, r as u32)[0] as f32
        });
        Self { data }
    }

    pub fn from_frame(frame: &Frame) -> Self {
        Self::from_gray(&frame.to_luma())
    }

    /// Build a plane from an intensity function of `(x, y)`.
    pub fn from_fn<F>(width: u32, height: u32, f: F) -> Self
    where
        F: Fn(f32, f32) -> f32,
    {
        let data = Array2::from_shape_fn((height as usize, width as usize), |(r, c)| {
            f(c as f32, r as f32)
        });
        Self { data }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.data.ncols() as u32
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.data.nrows() as u32
    }

    #[inline]
    pub fn dims(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    #[inline]
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= 0.0 && y >= 0.0 && x < self.width() as f32 && y < self.height() as f32
    }

    /// Bilinear sample, coordinates clamped to the border.
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        let max_x = (self.data.ncols() - 1) as f32;
        let max_y = (self.data.nrows() - 1) as f32;
        let x = x.clamp(0.0, max_x);
        let y = y.clamp(0.0, max_y);

        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = (x0 + 1).min(self.data.ncols() - 1);
        let y1 = (y0 + 1).min(self.data.nrows() - 1);
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;

        let top = self.data[[y0, x0]] * (1.0 - fx) + self.data[[y0, x1]] * fx;
        let bottom = self.data[[y1, x0]] * (1.0 - fx) + self.data[[y1, x1]] * fx;

        top * (1.0 - fy) + bottom * fy
    }

    /// Central difference gradient `(dI/dx, dI/dy)` at a sub-pixel position.
    #[inline]
    pub fn gradient(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (self.sample(x + 1.0, y) - self.sample(x - 1.0, y)) * 0.5,
            (self.sample(x, y + 1.0) - self.sample(x, y - 1.0)) * 0.5,
        )
    }

    /// Half resolution plane, each pixel the mean of a 2x2 block.
    pub fn downsample(&self) -> Plane {
        let h = (self.data.nrows() / 2).max(1);
        let w = (self.data.ncols() / 2).max(1);
        let last_r = self.data.nrows() - 1;
        let last_c = self.data.ncols() - 1;

        let data = Array2::from_shape_fn((h, w), |(r, c)| {
            let (r0, c0) = ((2 * r).min(last_r), (2 * c).min(last_c));
            let (r1, c1) = ((2 * r + 1).min(last_r), (2 * c + 1).min(last_c));
            (self.data[[r0, c0]] + self.data[[r0, c1]] + self.data[[r1, c0]] + self.data[[r1, c1]])
                * 0.25
        });

        Plane { data }
    }
}

/// Coarse-to-fine stack of planes, level 0 at full resolution.
#[derive(Debug, Clone)]
pub struct Pyramid {
    pub levels: Vec<Plane>,
}

impl Pyramid {
    /// Build up to `max_level` reduced levels, stopping once a level would be
    /// smaller than `min_size` on either side.
    pub fn build(base: &Plane, max_level: usize, min_size: u32) -> Self {
        let mut levels = vec![base.clone()];

        for _ in 0..max_level {
            let Some(last) = levels.last() else { break };
            if last.width() / 2 < min_size || last.height() / 2 < min_size {
                break;
            }
            let next = last.downsample();
            levels.push(next);
        }

        Self { levels }
    }

    #[inline]
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bilinear_sample() {
        let plane = Plane::from_fn(4, 4, |x, _| x * 10.0);
        assert!((plane.sample(1.5, 2.0) - 15.0).abs() < 1e-5);
        // clamped outside the image
        assert!((plane.sample(-3.0, 0.0) - 0.0).abs() < 1e-5);
        assert!((plane.sample(10.0, 0.0) - 30.0).abs() < 1e-5);
    }

    #[test]
    fn test_gradient_of_ramp() {
        let plane = Plane::from_fn(10, 10, |x, y| 2.0 * x + 3.0 * y);
        let (gx, gy) = plane.gradient(5.0, 5.0);
        assert!((gx - 2.0).abs() < 1e-5);
        assert!((gy - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_downsample_averages_blocks() {
        let plane = Plane::from_fn(4, 2, |x, _| x);
        let half = plane.downsample();
        assert_eq!(half.dims(), (2, 1));
        assert!((half.sample(0.0, 0.0) - 0.5).abs() < 1e-5);
        assert!((half.sample(1.0, 0.0) - 2.5).abs() < 1e-5);
    }

    #[test]
    fn test_pyramid_stops_at_min_size() {
        let plane = Plane::from_fn(64, 32, |_, _| 0.0);
        let pyramid = Pyramid::build(&plane, 5, 8);
        assert_eq!(pyramid.num_levels(), 3);
        assert_eq!(pyramid.levels[2].dims(), (16, 8));
    }
}
