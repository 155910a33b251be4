//! WebSocket protocol message types

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Server-to-browser messages
///
/// Serialized as `{"type": "...", "payload": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Pairing image as a `data:image/png;base64,...` URL
    Qr(String),
    /// Human-readable status text
    Message(String),
    /// The session is paired
    Ready(bool),
}

impl ServerMessage {
    /// Encode as a JSON text frame
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Browser-to-server messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Ask for a fresh QR code. Images are pushed proactively, so this is advisory.
    RequestQr,
}

impl ClientMessage {
    /// Decode a JSON text frame
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Protocol(format!("{}: {}", e, text)))
    }
}
