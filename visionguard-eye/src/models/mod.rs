//! Object classifiers consumed by the detector

pub mod classifier;
#[cfg(feature = "yolo")]
pub mod yolo;

pub use classifier::{NullClassifier, ObjectClassifier};
#[cfg(feature = "yolo")]
pub use yolo::{YoloClassifier, COCO_CLASSES};
