//! Lifecycle event relay
//!
//! Turns lifecycle events from the messaging client into broadcast messages.
//! A single task owns the [`PairingSession`] and handles one event at a time,
//! in the order the client emitted them.

use dragonpair_core::{DisconnectPolicy, LifecycleEvent, PairingToken, ServerMessage};
use dragonpair_session::{ClientEvent, PairingSession, SessionError};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::broadcast::{AppState, SessionPhase};
use crate::render::{QrRenderer, RenderError};

pub const STATUS_STARTING: &str = "Starting WhatsApp client...";
pub const STATUS_SCAN: &str = "Scan the QR with WhatsApp on your phone";
pub const STATUS_AUTHENTICATED: &str = "Authenticated, session saved";
pub const STATUS_READY: &str = "Bot is ready, paired";
pub const STATUS_RESET: &str = "Session reset, waiting for a new QR code";

/// Requests sent to the relay task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayCommand {
    /// Destroy the client, wipe its session and pair again
    Reset,
    /// Stop the client and end the relay task
    Shutdown,
}

/// Relay errors
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Event relay
pub struct Relay {
    state: Arc<AppState>,
    session: PairingSession,
    renderer: QrRenderer,
    policy: DisconnectPolicy,
}

impl Relay {
    pub fn new(state: Arc<AppState>, session: PairingSession) -> Self {
        let renderer = QrRenderer::new(state.config.qr_size);
        let policy = state.config.disconnect_policy;
        Self {
            state,
            session,
            renderer,
            policy,
        }
    }

    /// Start the client and relay its events until shut down
    pub async fn run(mut self, mut commands: mpsc::Receiver<RelayCommand>) {
        self.start().await;

        loop {
            tokio::select! {
                Some(event) = self.session.next_event() => match event {
                    ClientEvent::Lifecycle(event) => {
                        let name = event.name();
                        if let Err(e) = self.handle_event(event).await {
                            error!("Failed to handle {} event: {}", name, e);
                        }
                    }
                    ClientEvent::Exited(reason) => self.fail(&SessionError::Exited(reason)),
                },
                command = commands.recv() => match command {
                    Some(RelayCommand::Reset) => {
                        info!("Session reset requested");
                        self.restart_session().await;
                    }
                    Some(RelayCommand::Shutdown) | None => break,
                }
            }
        }

        if let Err(e) = self.session.shutdown().await {
            warn!("Failed to stop messaging client: {}", e);
        }
        info!("Relay stopped");
    }

    /// Initialize the client. A failure leaves the relay running but idle.
    async fn start(&mut self) {
        self.status(SessionPhase::Starting, STATUS_STARTING);
        if let Err(e) = self.session.start().await {
            self.fail(&e);
        }
    }

    /// Handle one lifecycle event
    pub async fn handle_event(&mut self, event: LifecycleEvent) -> Result<(), RelayError> {
        match event {
            LifecycleEvent::Qr(token) => self.on_pairing_token(token).await?,
            LifecycleEvent::Authenticated => self.on_authenticated(),
            LifecycleEvent::Ready => self.on_ready(),
            LifecycleEvent::AuthFailure(reason) => self.on_auth_failure(&reason),
            LifecycleEvent::Disconnected(reason) => self.on_disconnected(&reason).await,
        }
        Ok(())
    }

    async fn on_pairing_token(&mut self, token: PairingToken) -> Result<(), RelayError> {
        if self.state.phase() == SessionPhase::Ready {
            debug!("Ignoring pairing token while paired");
            return Ok(());
        }

        let renderer = self.renderer;
        let rendered = tokio::task::spawn_blocking(move || renderer.render(&token))
            .await
            .map_err(|e| RenderError::Task(e.to_string()))??;

        let data_url = rendered.data_url.clone();
        let receivers = self.state.publish(
            |s| {
                s.phase = SessionPhase::AwaitingScan;
                s.qr = Some(rendered);
                s.status = Some(STATUS_SCAN.to_string());
            },
            vec![
                ServerMessage::Qr(data_url),
                ServerMessage::Message(STATUS_SCAN.to_string()),
            ],
        );
        info!("QR code received, sent to {} browser(s)", receivers);
        Ok(())
    }

    fn on_authenticated(&mut self) {
        info!("Client authenticated");
        self.status(SessionPhase::Authenticated, STATUS_AUTHENTICATED);
    }

    fn on_ready(&mut self) {
        info!("Client is ready");
        self.state.publish(
            |s| {
                s.phase = SessionPhase::Ready;
                s.qr = None;
                s.status = Some(STATUS_READY.to_string());
            },
            vec![
                ServerMessage::Ready(true),
                ServerMessage::Message(STATUS_READY.to_string()),
            ],
        );
    }

    fn on_auth_failure(&mut self, reason: &str) {
        warn!("Authentication failure: {}", reason);
        let text = format!("Authentication failure: {}", reason);
        self.state.publish(
            |s| {
                s.phase = SessionPhase::AuthFailed;
                s.status = Some(text.clone());
            },
            vec![ServerMessage::Message(text.clone())],
        );
    }

    async fn on_disconnected(&mut self, reason: &str) {
        warn!("Client disconnected: {}", reason);
        let text = format!("Disconnected: {}", reason);
        self.state.publish(
            |s| {
                s.phase = SessionPhase::Disconnected;
                s.qr = None;
                s.status = Some(text.clone());
            },
            vec![ServerMessage::Ready(false), ServerMessage::Message(text.clone())],
        );

        if self.policy == DisconnectPolicy::Reset {
            self.restart_session().await;
        }
    }

    async fn restart_session(&mut self) {
        self.state.publish(
            |s| {
                s.phase = SessionPhase::Starting;
                s.qr = None;
                s.status = Some(STATUS_RESET.to_string());
            },
            vec![
                ServerMessage::Ready(false),
                ServerMessage::Message(STATUS_RESET.to_string()),
            ],
        );

        if let Err(e) = self.session.restart(true).await {
            self.fail(&e);
        }
    }

    /// The client is gone: any image on screen can no longer be scanned
    fn fail(&mut self, e: &SessionError) {
        error!("Messaging client failed: {}", e);
        let text = format!("WhatsApp client failed: {}", e);
        self.state.publish(
            |s| {
                s.phase = SessionPhase::Failed;
                s.qr = None;
                s.status = Some(text.clone());
            },
            vec![ServerMessage::Ready(false), ServerMessage::Message(text.clone())],
        );
    }

    fn status(&self, phase: SessionPhase, text: &str) {
        self.state.publish(
            |s| {
                s.phase = phase;
                s.status = Some(text.to_string());
            },
            vec![ServerMessage::Message(text.to_string())],
        );
    }
}
