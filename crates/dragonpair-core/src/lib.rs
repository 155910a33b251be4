//! dragonpair Core - Shared types and protocol definitions
//!
//! This crate provides the configuration, lifecycle event and wire protocol
//! types used across all dragonpair components.

pub mod config;
pub mod error;
pub mod event;
pub mod protocol;

pub use config::{Config, DisconnectPolicy, ReplayPolicy};
pub use error::{Error, Result};
pub use event::{LifecycleEvent, PairingToken};
pub use protocol::{ClientMessage, ServerMessage};
