//! dragonpair Session - Facade over the external messaging client
//!
//! The pairing handshake, credential format and messaging transport all live
//! in the external client. This crate only starts and stops it, tells it where
//! to keep its session files, and turns what it reports into
//! [`LifecycleEvent`](dragonpair_core::LifecycleEvent)s.
//!
//! # Example
//!
//! ```no_run
//! use dragonpair_core::Config;
//! use dragonpair_session::{BridgeClient, ClientEvent, PairingSession, SessionDir};
//!
//! async fn example() {
//!     let config = Config::new();
//!     let client = BridgeClient::from_config(&config);
//!     let mut session = PairingSession::new(Box::new(client), SessionDir::from_config(&config));
//!
//!     session.start().await.unwrap();
//!     while let Some(event) = session.next_event().await {
//!         match event {
//!             ClientEvent::Lifecycle(event) => println!("{}", event.name()),
//!             ClientEvent::Exited(reason) => println!("client exited: {}", reason),
//!         }
//!     }
//! }
//! ```

pub mod bridge;
pub mod client;
pub mod error;
pub mod session;
pub mod storage;

pub use bridge::{BridgeClient, BridgeConfig};
pub use client::{ClientEvent, EventSink, MessagingClient};
pub use error::{SessionError, SessionResult};
pub use session::{PairingSession, EVENT_CHANNEL_CAPACITY};
pub use storage::SessionDir;
