//! Broadcast channel and last-known pairing state

use chrono::{DateTime, Utc};
use dragonpair_core::{Config, ReplayPolicy, ServerMessage};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use crate::relay::RelayCommand;
use crate::render::RenderedQr;

/// Messages buffered per browser before it starts missing some
pub const BROADCAST_CAPACITY: usize = 32;

/// Where the pairing session currently stands, as seen by the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SessionPhase {
    /// Client is being initialized
    #[default]
    Starting,
    /// A QR code is waiting to be scanned
    AwaitingScan,
    /// Credentials accepted, waiting for ready
    Authenticated,
    /// Paired and usable
    Ready,
    /// Last authentication attempt failed
    AuthFailed,
    /// Client lost its session
    Disconnected,
    /// Client could not be started; nothing more will happen
    Failed,
}

/// Last-known state, replayed to browsers that connect late
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub phase: SessionPhase,
    /// Last status text sent to browsers
    pub status: Option<String>,
    /// Current (not yet superseded) pairing image
    pub qr: Option<RenderedQr>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    /// Messages that bring a fresh browser up to date
    pub fn replay(&self) -> Vec<ServerMessage> {
        let mut messages = Vec::new();

        if self.phase == SessionPhase::Ready {
            messages.push(ServerMessage::Ready(true));
        } else if let Some(qr) = &self.qr {
            messages.push(ServerMessage::Qr(qr.data_url.clone()));
        }

        if let Some(status) = &self.status {
            messages.push(ServerMessage::Message(status.clone()));
        }

        messages
    }
}

/// Shared application state
pub struct AppState {
    /// Configuration
    pub config: Config,
    /// Fan-out to every connected browser
    tx: broadcast::Sender<ServerMessage>,
    /// Last-known state; updates and subscriptions both hold this lock
    snapshot: RwLock<Snapshot>,
    /// Commands for the relay task
    commands: mpsc::Sender<RelayCommand>,
    /// Open browser connections
    clients: AtomicUsize,
}

impl AppState {
    /// Create a new application state
    pub fn new(config: Config, commands: mpsc::Sender<RelayCommand>) -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            config,
            tx,
            snapshot: RwLock::new(Snapshot::default()),
            commands,
            clients: AtomicUsize::new(0),
        }
    }

    /// Update the snapshot and broadcast `messages`, atomically with respect to
    /// [`subscribe`](Self::subscribe)
    ///
    /// Returns how many browsers were listening.
    pub fn publish(&self, update: impl FnOnce(&mut Snapshot), messages: Vec<ServerMessage>) -> usize {
        let mut snapshot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        update(&mut snapshot);
        snapshot.updated_at = Some(Utc::now());

        let mut receivers = 0;
        for message in messages {
            // Err only means nobody is connected
            receivers = self.tx.send(message).unwrap_or(0);
        }
        receivers
    }

    /// Subscribe a new browser
    ///
    /// Returns the replay for it (empty under [`ReplayPolicy::None`]) and a
    /// receiver for everything broadcast afterwards.
    pub fn subscribe(&self) -> (Vec<ServerMessage>, broadcast::Receiver<ServerMessage>) {
        let snapshot = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        let rx = self.tx.subscribe();
        let replay = match self.config.replay_policy {
            ReplayPolicy::LastKnown => snapshot.replay(),
            ReplayPolicy::None => Vec::new(),
        };
        (replay, rx)
    }

    /// Copy of the current snapshot
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current session phase
    pub fn phase(&self) -> SessionPhase {
        self.snapshot.read().unwrap_or_else(PoisonError::into_inner).phase
    }

    /// Ask the relay to tear down and re-pair. Returns false if the relay is gone or busy.
    pub fn request_reset(&self) -> bool {
        self.commands.try_send(RelayCommand::Reset).is_ok()
    }

    /// Stop the relay and its messaging client. Returns false if the relay was already gone.
    pub async fn shutdown_relay(&self) -> bool {
        match self.commands.send(RelayCommand::Shutdown).await {
            Ok(()) => true,
            Err(_) => {
                debug!("Relay already stopped");
                false
            }
        }
    }

    pub(crate) fn client_connected(&self) -> usize {
        self.clients.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn client_disconnected(&self) -> usize {
        self.clients.fetch_sub(1, Ordering::SeqCst).saturating_sub(1)
    }

    /// Number of open browser connections
    pub fn client_count(&self) -> usize {
        self.clients.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(policy: ReplayPolicy) -> AppState {
        let (commands, _rx) = mpsc::channel(1);
        AppState::new(Config::new().with_replay_policy(policy), commands)
    }

    fn qr(url: &str) -> RenderedQr {
        RenderedQr {
            png: vec![1, 2, 3],
            data_url: url.to_string(),
        }
    }

    #[test]
    fn test_replay_prefers_ready_over_stale_qr() {
        let snapshot = Snapshot {
            phase: SessionPhase::Ready,
            status: Some("Bot is ready, paired".to_string()),
            qr: Some(qr("data:old")),
            updated_at: None,
        };
        assert_eq!(
            snapshot.replay(),
            vec![
                ServerMessage::Ready(true),
                ServerMessage::Message("Bot is ready, paired".to_string())
            ]
        );
    }

    #[test]
    fn test_empty_snapshot_replays_nothing() {
        assert!(Snapshot::default().replay().is_empty());
    }

    #[test]
    fn test_subscribe_then_publish() {
        let state = state(ReplayPolicy::LastKnown);
        state.publish(
            |s| {
                s.phase = SessionPhase::AwaitingScan;
                s.qr = Some(qr("data:first"));
            },
            vec![ServerMessage::Qr("data:first".to_string())],
        );

        let (replay, mut rx) = state.subscribe();
        assert_eq!(replay, vec![ServerMessage::Qr("data:first".to_string())]);
        // Nothing from before the subscription is queued
        assert!(rx.try_recv().is_err());

        let receivers = state.publish(|_| {}, vec![ServerMessage::Message("hello".to_string())]);
        assert_eq!(receivers, 1);
        assert_eq!(rx.try_recv().unwrap(), ServerMessage::Message("hello".to_string()));
    }

    #[tokio::test]
    async fn test_shutdown_after_relay_gone() {
        // The command receiver is dropped inside the helper
        let state = state(ReplayPolicy::LastKnown);
        assert!(!state.shutdown_relay().await);
        assert!(!state.request_reset());
    }

    #[tokio::test]
    async fn test_shutdown_reaches_relay() {
        let (commands, mut rx) = mpsc::channel(1);
        let state = AppState::new(Config::new(), commands);
        assert!(state.shutdown_relay().await);
        assert_eq!(rx.recv().await, Some(RelayCommand::Shutdown));
    }

    #[test]
    fn test_no_replay_policy() {
        let state = state(ReplayPolicy::None);
        state.publish(
            |s| s.status = Some("Scan".to_string()),
            vec![ServerMessage::Message("Scan".to_string())],
        );
        let (replay, _rx) = state.subscribe();
        assert!(replay.is_empty());
    }

    #[test]
    fn test_client_counter() {
        let state = state(ReplayPolicy::None);
        assert_eq!(state.client_connected(), 1);
        assert_eq!(state.client_connected(), 2);
        assert_eq!(state.client_disconnected(), 1);
        assert_eq!(state.client_count(), 1);
    }

    #[tokio::test]
    async fn test_reset_request_reaches_relay() {
        let (commands, mut rx) = mpsc::channel(1);
        let state = AppState::new(Config::new(), commands);
        assert!(state.request_reset());
        assert!(matches!(rx.recv().await, Some(RelayCommand::Reset)));
    }
}
