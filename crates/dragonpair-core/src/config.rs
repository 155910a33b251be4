//! Configuration types for dragonpair

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default HTTP port when `PORT` is not set
pub const DEFAULT_PORT: u16 = 3000;

/// Client identifier used to namespace the stored session
pub const DEFAULT_CLIENT_ID: &str = "dragons-md";

/// Flags handed to the headless browser driven by the messaging client
pub const DEFAULT_BROWSER_ARGS: [&str; 2] = ["--no-sandbox", "--disable-setuid-sandbox"];

/// What the relay does when the messaging client reports a disconnect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DisconnectPolicy {
    /// Report the disconnect and leave the session alone
    #[default]
    Keep,
    /// Destroy the client, wipe the stored session and pair again
    Reset,
}

impl std::str::FromStr for DisconnectPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keep" => Ok(DisconnectPolicy::Keep),
            "reset" | "teardown" => Ok(DisconnectPolicy::Reset),
            _ => Err(format!("Invalid disconnect policy: {}. Use: keep, reset", s)),
        }
    }
}

/// What a browser sees right after it connects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ReplayPolicy {
    /// Send the last known QR code / ready state and status text first
    #[default]
    LastKnown,
    /// Only messages broadcast after the connection was opened
    None,
}

impl std::str::FromStr for ReplayPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "last-known" | "last" => Ok(ReplayPolicy::LastKnown),
            "none" | "off" => Ok(ReplayPolicy::None),
            _ => Err(format!("Invalid replay policy: {}. Use: last-known, none", s)),
        }
    }
}

/// Main configuration for dragonpair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server port
    pub port: u16,
    /// Session namespace handed to the messaging client
    pub client_id: String,
    /// Directory under which the messaging client keeps its sessions
    pub session_root: PathBuf,
    /// Run the client's browser without a window
    pub headless: bool,
    /// Extra browser flags
    pub browser_args: Vec<String>,
    /// Edge length of the rendered QR image in pixels
    pub qr_size: u32,
    /// Disconnect handling
    pub disconnect_policy: DisconnectPolicy,
    /// Late-joiner handling
    pub replay_policy: ReplayPolicy,
    /// Program that runs the messaging client bridge
    pub bridge_program: String,
    /// Arguments for the bridge program
    pub bridge_args: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            client_id: DEFAULT_CLIENT_ID.to_string(),
            session_root: default_session_root(),
            headless: true,
            browser_args: DEFAULT_BROWSER_ARGS.iter().map(|s| s.to_string()).collect(),
            qr_size: 300,
            disconnect_policy: DisconnectPolicy::Keep,
            replay_policy: ReplayPolicy::LastKnown,
            bridge_program: "node".to_string(),
            bridge_args: vec!["bridge/whatsapp-bridge.js".to_string()],
        }
    }
}

/// `<data dir>/dragonpair`, or `./.dragonpair` when the platform has none
fn default_session_root() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("dragonpair"))
        .unwrap_or_else(|| PathBuf::from(".dragonpair"))
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: set port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Builder pattern: set client id
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Builder pattern: set session root directory
    pub fn with_session_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.session_root = root.into();
        self
    }

    /// Builder pattern: set headless mode
    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Builder pattern: set QR image size
    pub fn with_qr_size(mut self, size: u32) -> Self {
        self.qr_size = size;
        self
    }

    /// Builder pattern: set disconnect policy
    pub fn with_disconnect_policy(mut self, policy: DisconnectPolicy) -> Self {
        self.disconnect_policy = policy;
        self
    }

    /// Builder pattern: set replay policy
    pub fn with_replay_policy(mut self, policy: ReplayPolicy) -> Self {
        self.replay_policy = policy;
        self
    }

    /// Builder pattern: set the bridge command line
    pub fn with_bridge(mut self, program: impl Into<String>, args: Vec<String>) -> Self {
        self.bridge_program = program.into();
        self.bridge_args = args;
        self
    }

    /// Directory holding this client's session files
    pub fn session_dir(&self) -> PathBuf {
        self.session_root.join(format!("session-{}", self.client_id))
    }

    /// Check values that would otherwise fail deep inside the messaging client
    pub fn validate(&self) -> Result<()> {
        if self.client_id.is_empty()
            || !self
                .client_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::Config(format!(
                "Invalid client id '{}': only alphanumerics, '-' and '_' are allowed",
                self.client_id
            )));
        }

        if self.qr_size == 0 {
            return Err(Error::Config("QR size must be greater than zero".to_string()));
        }

        if self.bridge_program.trim().is_empty() {
            return Err(Error::Config("Bridge program must not be empty".to_string()));
        }

        Ok(())
    }
}
