//! dragonpair Server - Axum-based HTTP and WebSocket relay
//!
//! This crate serves the pairing page and relays the messaging client's
//! lifecycle events to every connected browser.

pub mod broadcast;
pub mod http;
pub mod relay;
pub mod render;
pub mod websocket;

pub use broadcast::{AppState, SessionPhase, Snapshot};
pub use http::create_router;
pub use relay::{Relay, RelayCommand, RelayError};
pub use render::{QrRenderer, RenderError, RenderedQr};
pub use websocket::handle_socket;
