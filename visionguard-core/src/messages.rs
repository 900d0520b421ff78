//! WebSocket message envelopes

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::Alert;

/// Messages sent by clients on the stream endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Encoded image as a data URL, e.g. `data:image/jpeg;base64,...`
    ClientFrame { image: String },
}

impl ClientMessage {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Messages sent by the server, one per tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    FrameUpdate { image: String, alerts: Vec<Alert> },
}

impl ServerMessage {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
