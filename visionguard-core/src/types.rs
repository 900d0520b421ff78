use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Axis-aligned box in pixel coordinates, corners (x1, y1) top-left and (x2, y2) bottom-right
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    /// Create a box, rejecting non-finite or degenerate corners
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Result<Self> {
        if !(x1.is_finite() && y1.is_finite() && x2.is_finite() && y2.is_finite()) {
            return Err(Error::InvalidBoundingBox("non-finite coordinate".to_string()));
        }
        if x1 >= x2 {
            return Err(Error::InvalidBoundingBox(format!("x1 ({}) >= x2 ({})", x1, x2)));
        }
        if y1 >= y2 {
            return Err(Error::InvalidBoundingBox(format!("y1 ({}) >= y2 ({})", y1, y2)));
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over union with another box, 0.0 when disjoint
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let inter_x1 = self.x1.max(other.x1);
        let inter_y1 = self.y1.max(other.y1);
        let inter_x2 = self.x2.min(other.x2);
        let inter_y2 = self.y2.min(other.y2);

        if inter_x2 <= inter_x1 || inter_y2 <= inter_y1 {
            return 0.0;
        }

        let inter = (inter_x2 - inter_x1) * (inter_y2 - inter_y1);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 || !union.is_finite() {
            return 0.0;
        }
        inter / union
    }
}

/// One object reported by the classifier for a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: usize,
    pub label: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(class_id: usize, label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Result<Self> {
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(Error::InvalidConfidence(confidence));
        }
        Ok(Self {
            class_id,
            label: label.into(),
            confidence,
            bbox,
        })
    }
}

/// Hazard severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "High",
            Severity::Critical => "Critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(Error::UnknownSeverity(s.to_string())),
        }
    }
}

/// A hazard fired by the hazard policy for a single frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardEvent {
    pub kind: String,
    pub severity: Severity,
    pub detected_at: DateTime<Utc>,
}

/// Authority label and message for one hazard, from the backend or the fallback table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub authority: String,
    pub message: String,
}

/// Enriched alert as delivered to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    #[serde(rename = "authorityMapped")]
    pub authority: String,
}

impl Alert {
    /// Merge a hazard with its enrichment. Consumes both: an alert is built exactly once per event.
    pub fn from_enrichment(event: HazardEvent, enrichment: EnrichmentResult) -> Self {
        Self {
            kind: event.kind,
            severity: event.severity,
            timestamp: event.detected_at,
            description: enrichment.message,
            authority: enrichment.authority,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_rejects_degenerate() {
        assert!(BoundingBox::new(10.0, 10.0, 10.0, 20.0).is_err());
        assert!(BoundingBox::new(10.0, 20.0, 30.0, 5.0).is_err());
        assert!(BoundingBox::new(f32::NAN, 0.0, 1.0, 1.0).is_err());
        assert!(BoundingBox::new(0.0, 0.0, 1.0, 1.0).is_ok());
    }

    #[test]
    fn test_bbox_iou() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0).unwrap();
        let b = BoundingBox::new(5.0, 0.0, 15.0, 10.0).unwrap();
        let c = BoundingBox::new(20.0, 20.0, 30.0, 30.0).unwrap();
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-6);
        assert_eq!(a.iou(&c), 0.0);
    }

    #[test]
    fn test_detection_confidence_range() {
        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0).unwrap();
        assert!(Detection::new(0, "person", 0.5, bbox).is_ok());
        assert!(Detection::new(0, "person", 1.5, bbox).is_err());
        assert!(Detection::new(0, "person", -0.1, bbox).is_err());
        assert!(Detection::new(0, "person", f32::NAN, bbox).is_err());
    }

    #[test]
    fn test_severity_round_trip_str() {
        assert_eq!("critical".parse::<Severity>().unwrap(), Severity::Critical);
        assert_eq!("High".parse::<Severity>().unwrap(), Severity::High);
        assert!("low".parse::<Severity>().is_err());
        assert_eq!(Severity::Critical.to_string(), "Critical");
    }

    #[test]
    fn test_alert_wire_field_names() {
        let event = HazardEvent {
            kind: "Fire".to_string(),
            severity: Severity::Critical,
            detected_at: Utc::now(),
        };
        let alert = Alert::from_enrichment(
            event,
            EnrichmentResult {
                authority: "Fire Department".to_string(),
                message: "Fire in hall B".to_string(),
            },
        );
        let value = serde_json::to_value(&alert).unwrap();
        assert_eq!(value["type"], "Fire");
        assert_eq!(value["severity"], "Critical");
        assert_eq!(value["authorityMapped"], "Fire Department");
        assert_eq!(value["description"], "Fire in hall B");
        assert!(value["timestamp"].as_str().unwrap().contains('T'));
    }
}
