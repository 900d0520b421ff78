//! visionguard-eye: frame acquisition, detection and hazard policy
//!
//! Turns raw frames (from a capture device or a client-pushed image) into
//! annotated frames, object detections and, at a debounced rate, hazard
//! events. Nothing in here touches the network transport.

pub mod annotate;
pub mod camera;
pub mod codec;
pub mod config;
pub mod error;
pub mod frame;
pub mod models;
pub mod processing;
pub mod source;

pub use config::{HazardConfig, VisionConfig};
pub use error::VisionError;
pub use frame::Frame;
pub use models::{NullClassifier, ObjectClassifier};
pub use processing::{Detector, DetectorOutput, HazardOutcome, HazardPolicy, HazardTrigger, RandomTrigger};
pub use source::{FrameSource, PullSource, PushSource, StreamMode};
