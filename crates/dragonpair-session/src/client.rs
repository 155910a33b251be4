//! The seam between dragonpair and the external messaging client

use async_trait::async_trait;
use dragonpair_core::LifecycleEvent;
use tokio::sync::mpsc;

use crate::error::{SessionError, SessionResult};

/// Everything a client reports to its session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A lifecycle event, in the order the client observed it
    Lifecycle(LifecycleEvent),
    /// The client stopped without being asked to; carries the reason
    Exited(String),
}

impl From<LifecycleEvent> for ClientEvent {
    fn from(event: LifecycleEvent) -> Self {
        ClientEvent::Lifecycle(event)
    }
}

/// Where a client delivers its events
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<ClientEvent>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<ClientEvent>) -> Self {
        Self { tx }
    }

    /// A sink and the receiver it feeds
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ClientEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Report a lifecycle event
    pub async fn send(&self, event: LifecycleEvent) -> SessionResult<()> {
        self.deliver(ClientEvent::Lifecycle(event)).await
    }

    /// Report that the client stopped on its own
    pub async fn exited(&self, reason: impl Into<String>) -> SessionResult<()> {
        self.deliver(ClientEvent::Exited(reason.into())).await
    }

    async fn deliver(&self, event: ClientEvent) -> SessionResult<()> {
        self.tx.send(event).await.map_err(|_| SessionError::Closed)
    }
}

/// A messaging client that can be paired from the browser
///
/// Implementations report everything through the sink handed to
/// [`initialize`](MessagingClient::initialize); events must be sent in the
/// order the client observes them. A client that dies after a successful
/// `initialize` reports it with [`EventSink::exited`].
#[async_trait]
pub trait MessagingClient: Send {
    /// Start the client. Returns once it is running, not once it is paired.
    async fn initialize(&mut self, events: EventSink) -> SessionResult<()>;

    /// Stop the client. Stopping a client that is not running is a no-op.
    async fn destroy(&mut self) -> SessionResult<()>;
}
