//! Single owning handle to the messaging client
//!
//! One [`PairingSession`] exists per process. It owns the client, the session
//! directory and the event channel the client reports into, so whoever holds
//! it (the relay) is the only code that can start, stop or listen to the client.

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::client::{ClientEvent, EventSink, MessagingClient};
use crate::error::SessionResult;
use crate::storage::SessionDir;

/// Capacity of the lifecycle event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Facade over the external messaging client
pub struct PairingSession {
    client: Box<dyn MessagingClient>,
    dir: SessionDir,
    events_tx: EventSink,
    events_rx: mpsc::Receiver<ClientEvent>,
}

impl PairingSession {
    pub fn new(client: Box<dyn MessagingClient>, dir: SessionDir) -> Self {
        let (events_tx, events_rx) = EventSink::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            client,
            dir,
            events_tx,
            events_rx,
        }
    }

    pub fn dir(&self) -> &SessionDir {
        &self.dir
    }

    /// Prepare the session directory and initialize the client
    pub async fn start(&mut self) -> SessionResult<()> {
        self.dir.ensure()?;
        debug!("Session directory: {:?}", self.dir.path());
        self.client.initialize(self.events_tx.clone()).await?;
        info!("Messaging client initialized");
        Ok(())
    }

    /// Tear the client down and start it again
    ///
    /// With `clear_session` the stored credentials are removed first, which
    /// makes the client issue a fresh pairing token. Events still queued from
    /// the previous run are discarded.
    pub async fn restart(&mut self, clear_session: bool) -> SessionResult<()> {
        self.client.destroy().await?;

        let mut stale = 0;
        while self.events_rx.try_recv().is_ok() {
            stale += 1;
        }
        if stale > 0 {
            debug!("Discarded {} queued events from the previous run", stale);
        }

        if clear_session {
            self.dir.clear()?;
        }

        self.start().await
    }

    /// Wait for the next client event
    ///
    /// The session keeps a sender of its own, so this only returns `None`
    /// once the session is dropped; a destroyed client simply never yields.
    pub async fn next_event(&mut self) -> Option<ClientEvent> {
        self.events_rx.recv().await
    }

    /// Stop the client for good
    pub async fn shutdown(&mut self) -> SessionResult<()> {
        self.client.destroy().await
    }
}
