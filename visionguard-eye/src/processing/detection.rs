//! Object detection stage

use image::{Rgb, RgbImage};
use std::sync::Arc;
use tracing::debug;
use visionguard_core::Detection;

use crate::annotate;
use crate::error::VisionError;
use crate::frame::Frame;
use crate::models::ObjectClassifier;

/// Overlay color for ordinary detections
pub const DETECTION_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Annotated copy of a frame plus what was found in it
#[derive(Debug, Clone)]
pub struct DetectorOutput {
    pub annotated: RgbImage,
    pub detections: Vec<Detection>,
}

/// Wraps a classifier and burns its results into a copy of the frame.
/// Shared read-only across connections.
pub struct Detector {
    classifier: Arc<dyn ObjectClassifier>,
}

impl Detector {
    pub fn new(classifier: Arc<dyn ObjectClassifier>) -> Self {
        Self { classifier }
    }

    pub fn classifier_name(&self) -> &'static str {
        self.classifier.name()
    }

    /// Classify and annotate. Blocking; never mutates `frame`.
    pub fn detect(&self, frame: &Frame) -> Result<DetectorOutput, VisionError> {
        let detections = self.classifier.classify(frame.image())?;
        debug!("Frame {}: {} detections", frame.index(), detections.len());

        let mut annotated = frame.image().clone();
        for detection in &detections {
            draw_detection(&mut annotated, detection);
        }

        Ok(DetectorOutput { annotated, detections })
    }
}

fn draw_detection(image: &mut RgbImage, detection: &Detection) {
    let bbox = &detection.bbox;
    let (x1, y1, x2, y2) = (
        bbox.x1.round() as i32,
        bbox.y1.round() as i32,
        bbox.x2.round() as i32,
        bbox.y2.round() as i32,
    );
    annotate::draw_rectangle(image, x1, y1, x2, y2, 2, DETECTION_COLOR);

    let label = format!("{} {:.2}", detection.label, detection.confidence);
    let baseline = (y1 - 10).max(7);
    annotate::draw_text(image, x1, baseline, &label, 1, DETECTION_COLOR);
}
