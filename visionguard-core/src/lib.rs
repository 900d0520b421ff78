//! visionguard-core: shared domain types for the VisionGuard streaming pipeline
//!
//! Holds the values that flow between the eye (detection + hazard policy),
//! the llm (alert enrichment) and the server (stream orchestration) crates,
//! plus the JSON messages exchanged with WebSocket clients.

pub mod error;
pub mod types;
pub mod messages;

pub use error::{Error, Result};
pub use types::{Alert, BoundingBox, Detection, EnrichmentResult, HazardEvent, Severity};
pub use messages::{ClientMessage, ServerMessage};
