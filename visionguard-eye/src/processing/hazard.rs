//! Hazard sampling policy
//!
//! The detector's label vocabulary cannot recognize domain hazards (fire,
//! weapons, falls), so hazards are raised by a pluggable trigger rather than
//! by the classifier. The policy owns the rate limiting: a hazard may only
//! fire once the per-connection cooldown has elapsed, and at most one hazard
//! fires per frame. Swapping `RandomTrigger` for a secondary classifier does
//! not change the `evaluate` contract.

use chrono::Utc;
use image::{Rgb, RgbImage};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use visionguard_core::{Detection, HazardEvent, Severity};

use crate::annotate;
use crate::config::HazardConfig;
use crate::error::VisionError;

/// Hazard types raised by the default trigger
pub const HAZARD_CATALOG: &[&str] = &["Fire", "Smoke", "Accident", "Weapon Threat", "High-Risk Fall"];

/// Hazard types reported as Critical; everything else is High
pub const CRITICAL_HAZARDS: &[&str] = &["Fire", "Weapon Threat", "Accident"];

/// Border and caption color for a fired hazard
pub const HAZARD_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

pub fn severity_for(kind: &str) -> Severity {
    if CRITICAL_HAZARDS.iter().any(|c| c.eq_ignore_ascii_case(kind)) {
        Severity::Critical
    } else {
        Severity::High
    }
}

/// Decision source for the hazard policy
pub trait HazardTrigger: Send {
    /// Whether a hazard fires on this (cooldown-eligible) frame
    fn should_fire(&mut self, now: Instant) -> bool;

    /// Hazard type for a firing
    fn pick_type(&mut self) -> String;
}

/// Fires with a fixed per-frame probability and picks types uniformly or by weight
pub struct RandomTrigger {
    rng: StdRng,
    probability: f64,
    catalog: Vec<String>,
    weights: Option<WeightedIndex<f64>>,
}

impl RandomTrigger {
    pub fn new(probability: f64, seed: Option<u64>) -> Self {
        Self {
            rng: seeded_rng(seed),
            probability: probability.clamp(0.0, 1.0),
            catalog: HAZARD_CATALOG.iter().map(|s| s.to_string()).collect(),
            weights: None,
        }
    }

    pub fn from_config(config: &HazardConfig) -> Result<Self, VisionError> {
        config.validate().map_err(VisionError::Config)?;

        let weights = match &config.weights {
            Some(weights) => Some(
                WeightedIndex::new(weights.iter().copied())
                    .map_err(|e| VisionError::Config(format!("Invalid hazard weights: {}", e)))?,
            ),
            None => None,
        };

        Ok(Self {
            rng: seeded_rng(config.seed),
            probability: config.probability,
            catalog: config.catalog.clone(),
            weights,
        })
    }
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

impl HazardTrigger for RandomTrigger {
    fn should_fire(&mut self, _now: Instant) -> bool {
        self.rng.gen::<f64>() < self.probability
    }

    fn pick_type(&mut self) -> String {
        let index = match &self.weights {
            Some(weights) => weights.sample(&mut self.rng),
            None => self.rng.gen_range(0..self.catalog.len()),
        };
        self.catalog[index].clone()
    }
}

/// Result of evaluating one frame
#[derive(Debug, Clone)]
pub struct HazardOutcome {
    pub annotated: RgbImage,
    /// Zero or one event
    pub events: Vec<HazardEvent>,
    /// Updated only when a hazard fired
    pub last_hazard_at: Option<Instant>,
}

/// Per-connection hazard policy
pub struct HazardPolicy {
    trigger: Box<dyn HazardTrigger>,
    cooldown: Duration,
}

impl HazardPolicy {
    pub fn new(trigger: Box<dyn HazardTrigger>, cooldown: Duration) -> Self {
        Self { trigger, cooldown }
    }

    pub fn from_config(config: &HazardConfig) -> Result<Self, VisionError> {
        let trigger = RandomTrigger::from_config(config)?;
        Ok(Self::new(Box::new(trigger), config.cooldown()))
    }

    pub fn evaluate(
        &mut self,
        annotated: RgbImage,
        _detections: &[Detection],
        now: Instant,
        last_hazard_at: Option<Instant>,
    ) -> HazardOutcome {
        let in_cooldown = last_hazard_at
            .map(|last| now.saturating_duration_since(last) < self.cooldown)
            .unwrap_or(false);

        if in_cooldown || !self.trigger.should_fire(now) {
            return HazardOutcome {
                annotated,
                events: Vec::new(),
                last_hazard_at,
            };
        }

        let kind = self.trigger.pick_type();
        let severity = severity_for(&kind);
        info!("Hazard fired: {} ({})", kind, severity);

        let mut annotated = annotated;
        draw_hazard(&mut annotated, &kind);

        let event = HazardEvent {
            kind,
            severity,
            detected_at: Utc::now(),
        };
        debug!("Next hazard allowed after {:?}", self.cooldown);

        HazardOutcome {
            annotated,
            events: vec![event],
            last_hazard_at: Some(now),
        }
    }
}

fn draw_hazard(image: &mut RgbImage, kind: &str) {
    let (width, height) = (image.width() as i32, image.height() as i32);
    let inset = 50.min(width / 4).min(height / 4);
    annotate::draw_rectangle(image, inset, inset, width - inset, height - inset, 4, HAZARD_COLOR);
    let caption = format!("HAZARD DETECTED: {}", kind);
    annotate::draw_text(image, inset + 20, inset + 40, &caption, 3, HAZARD_COLOR);
}
