//! Configuration for visionguard-eye

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::processing::hazard::HAZARD_CATALOG;

/// Longest accepted hazard cooldown (one day)
pub const MAX_COOLDOWN_SECS: f64 = 86_400.0;

/// Capture and detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// USB camera device index (0, 1, 2, etc.)
    pub camera_id: u32,
    /// Target frame rate (frames per second), also paces pull-mode emission
    pub frame_rate: u32,
    /// Camera resolution (width, height), also the placeholder frame size
    pub resolution: (u32, u32),
    /// JPEG quality for emitted frames (1-100)
    pub jpeg_quality: u8,
    /// YOLOv8 ONNX model; detection is disabled when unset
    pub model_path: Option<PathBuf>,
    /// Minimum class score for a detection to be reported
    pub confidence_threshold: f32,
    /// IoU above which overlapping same-class boxes are suppressed
    pub iou_threshold: f32,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            camera_id: 0,
            frame_rate: 20,
            resolution: (640, 480),
            jpeg_quality: 80,
            model_path: None,
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
        }
    }
}

impl VisionConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.frame_rate == 0 || self.frame_rate > 120 {
            return Err("Frame rate must be between 1 and 120".to_string());
        }

        if self.resolution.0 == 0 || self.resolution.1 == 0 {
            return Err("Resolution must be non-zero".to_string());
        }

        if self.resolution.0 > 7680 || self.resolution.1 > 4320 {
            return Err("Resolution too large (max 8K)".to_string());
        }

        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err("JPEG quality must be between 1 and 100".to_string());
        }

        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err("Confidence threshold must be within [0, 1]".to_string());
        }

        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err("IoU threshold must be within [0, 1]".to_string());
        }

        if self.camera_id > 100 {
            return Err("Camera ID too large (max 100)".to_string());
        }

        Ok(())
    }

    /// Interval between pull-mode emissions
    pub fn frame_interval(&self) -> Duration {
        let fps = self.frame_rate.max(1);
        Duration::from_secs_f64(1.0 / fps as f64)
    }
}

/// Hazard sampling policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HazardConfig {
    /// Per-frame probability that a hazard fires once out of cooldown
    pub probability: f64,
    /// Minimum seconds between two hazards on the same connection
    pub cooldown_secs: f64,
    /// Fixed RNG seed; entropy-seeded when unset
    pub seed: Option<u64>,
    /// Hazard types the trigger picks from
    pub catalog: Vec<String>,
    /// Optional relative weights, one per catalog entry
    pub weights: Option<Vec<f64>>,
}

impl Default for HazardConfig {
    fn default() -> Self {
        Self {
            probability: 0.05,
            cooldown_secs: 5.0,
            seed: None,
            catalog: HAZARD_CATALOG.iter().map(|s| s.to_string()).collect(),
            weights: None,
        }
    }
}

impl HazardConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.probability.is_finite() || !(0.0..=1.0).contains(&self.probability) {
            return Err("Hazard probability must be within [0, 1]".to_string());
        }

        if !self.cooldown_secs.is_finite() || !(0.0..=MAX_COOLDOWN_SECS).contains(&self.cooldown_secs) {
            return Err(format!(
                "Hazard cooldown must be between 0 and {} seconds",
                MAX_COOLDOWN_SECS
            ));
        }

        if self.catalog.is_empty() {
            return Err("Hazard catalog cannot be empty".to_string());
        }

        if let Some(weights) = &self.weights {
            if weights.len() != self.catalog.len() {
                return Err(format!(
                    "Hazard weights ({}) must match catalog size ({})",
                    weights.len(),
                    self.catalog.len()
                ));
            }
            if weights.iter().any(|w| !w.is_finite() || *w < 0.0) || weights.iter().all(|w| *w == 0.0) {
                return Err("Hazard weights must be non-negative with at least one positive".to_string());
            }
        }

        Ok(())
    }

    pub fn cooldown(&self) -> Duration {
        let secs = if self.cooldown_secs.is_finite() {
            self.cooldown_secs.clamp(0.0, MAX_COOLDOWN_SECS)
        } else {
            MAX_COOLDOWN_SECS
        };
        Duration::from_secs_f64(secs)
    }
}
