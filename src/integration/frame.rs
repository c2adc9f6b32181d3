//! Owned image buffer passed between pipeline stages.

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};

/// One captured frame.
///
/// A frame is owned by exactly one stage at a time; stages hand frames over
/// by value (or clone them) instead of sharing a mutable buffer.
#[derive(Debug, Clone)]
pub struct Frame {
    index: u64,
    image: RgbImage,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self { index: 0, image }
    }

    /// Wrap packed RGB8 data, `None` when `data` does not match the size.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        RgbImage::from_raw(width, height, data).map(Self::new)
    }

    /// Black frame of the given size.
    pub fn blank(width: u32, height: u32) -> Self {
        Self::new(RgbImage::new(width, height))
    }

    /// Attach the capture sequence number.
    pub fn with_index(mut self, index: u64) -> Self {
        self.index = index;
        self
    }

    /// Capture sequence number, also used as the frame timestamp.
    #[inline]
    pub fn index(&self) -> u64 {
        self.index
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    #[inline]
    pub fn dims(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbImage {
        &mut self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Packed RGB8 pixel data.
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Copy of this frame scaled to `width` x `height`, keeping its index.
    pub fn resized(&self, width: u32, height: u32) -> Frame {
        if self.dims() == (width, height) || width == 0 || height == 0 {
            return self.clone();
        }

        Frame {
            index: self.index,
            image: imageops::resize(&self.image, width, height, FilterType::Triangle),
        }
    }

    /// Grayscale copy used by motion estimation.
    pub fn to_luma(&self) -> GrayImage {
        imageops::grayscale(&self.image)
    }
}
