use image::RgbImage;
use visionguard_core::Detection;

use crate::error::VisionError;

/// Black-box classifier: boxes, labels and confidences for one image.
///
/// Implementations must be deterministic for a given image and safe to share
/// across connections; the detector calls them from blocking threads.
pub trait ObjectClassifier: Send + Sync {
    fn name(&self) -> &'static str;

    fn classify(&self, image: &RgbImage) -> Result<Vec<Detection>, VisionError>;
}

/// Reports nothing. Stands in when no model is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullClassifier;

impl ObjectClassifier for NullClassifier {
    fn name(&self) -> &'static str {
        "null"
    }

    fn classify(&self, _image: &RgbImage) -> Result<Vec<Detection>, VisionError> {
        Ok(Vec::new())
    }
}
