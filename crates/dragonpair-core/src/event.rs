//! Lifecycle events emitted by the external messaging client
//!
//! The bridge process writes one event per line as JSON, e.g.
//! `{"event":"qr","data":"1@ABC==,xyz"}` or `{"event":"ready"}`.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Opaque pairing token issued by the messaging client
///
/// Valid once, superseded by the next token. Its content is never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PairingToken(pub String);

impl PairingToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PairingToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session lifecycle event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// A new pairing token is waiting to be scanned
    Qr(PairingToken),
    /// Credentials were accepted and stored
    Authenticated,
    /// The client is paired and usable
    Ready,
    /// Restoring or creating the session failed
    AuthFailure(String),
    /// The client lost its session
    Disconnected(String),
}

impl LifecycleEvent {
    /// Parse one line of bridge output
    pub fn from_line(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line.trim())?)
    }

    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::Qr(_) => "qr",
            LifecycleEvent::Authenticated => "authenticated",
            LifecycleEvent::Ready => "ready",
            LifecycleEvent::AuthFailure(_) => "auth_failure",
            LifecycleEvent::Disconnected(_) => "disconnected",
        }
    }
}
