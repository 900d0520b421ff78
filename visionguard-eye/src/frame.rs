//! In-memory frame representation

use image::{Rgb, RgbImage};

use crate::annotate;

/// Caption burned into placeholder frames when no capture device delivers
pub const NO_SOURCE_CAPTION: &str = "NO CAMERA DETECTED - SIMULATING";

/// An immutable RGB frame and its position in the stream
#[derive(Debug, Clone)]
pub struct Frame {
    index: u64,
    image: RgbImage,
}

impl Frame {
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self { index, image }
    }

    /// Black frame carrying a visible "no source" marker
    pub fn placeholder(index: u64, width: u32, height: u32) -> Self {
        let mut image = RgbImage::new(width.max(1), height.max(1));
        let baseline = (height / 2) as i32;
        annotate::draw_text(&mut image, 50, baseline, NO_SOURCE_CAPTION, 3, Rgb([200, 200, 200]));
        Self { index, image }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
