//! Per-frame processing stages

pub mod detection;
pub mod hazard;

pub use detection::{Detector, DetectorOutput};
pub use hazard::{HazardOutcome, HazardPolicy, HazardTrigger, RandomTrigger};
