//! Shared harness: relay + router with a hand-driven messaging client

#![allow(dead_code)]

use async_trait::async_trait;
use dragonpair_core::{Config, LifecycleEvent, PairingToken, ReplayPolicy, ServerMessage};
use dragonpair_server::{create_router, AppState, Relay};
use dragonpair_session::{EventSink, MessagingClient, PairingSession, SessionDir, SessionResult};
use futures::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

pub type Browser = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Hands the event sink of its first initialization to the test
struct ManualClient {
    sink: Option<oneshot::Sender<EventSink>>,
}

#[async_trait]
impl MessagingClient for ManualClient {
    async fn initialize(&mut self, events: EventSink) -> SessionResult<()> {
        if let Some(tx) = self.sink.take() {
            let _ = tx.send(events);
        }
        Ok(())
    }

    async fn destroy(&mut self) -> SessionResult<()> {
        Ok(())
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: Arc<AppState>,
    pub events: EventSink,
    relay: JoinHandle<()>,
    _dir: TempDir,
}

impl TestServer {
    pub async fn start(replay: ReplayPolicy) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new()
            .with_session_root(dir.path())
            .with_qr_size(100)
            .with_replay_policy(replay);

        let (commands_tx, commands_rx) = mpsc::channel(8);
        let state = Arc::new(AppState::new(config.clone(), commands_tx));

        let (sink_tx, sink_rx) = oneshot::channel();
        let client = ManualClient { sink: Some(sink_tx) };
        let session = PairingSession::new(Box::new(client), SessionDir::from_config(&config));
        let relay = tokio::spawn(Relay::new(state.clone(), session).run(commands_rx));
        let events = sink_rx.await.unwrap();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = create_router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            addr,
            state,
            events,
            relay,
            _dir: dir,
        }
    }

    pub async fn emit(&self, event: LifecycleEvent) {
        self.events.send(event).await.unwrap();
    }

    pub async fn emit_token(&self, token: &str) {
        self.emit(LifecycleEvent::Qr(PairingToken::new(token))).await;
    }

    /// Open a browser connection and wait until the server has subscribed it
    pub async fn connect(&self) -> Browser {
        let expected = self.state.client_count() + 1;
        let (ws, _) = connect_async(format!("ws://{}/ws", self.addr)).await.unwrap();
        let state = self.state.clone();
        wait_until(move || state.client_count() >= expected).await;
        ws
    }

    pub async fn stop(self) {
        self.state.shutdown_relay().await;
        self.relay.await.unwrap();
    }
}

pub async fn wait_until(mut check: impl FnMut() -> bool) {
    timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Next server message on a browser connection
pub async fn next_message(ws: &mut Browser) -> ServerMessage {
    loop {
        let frame = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for message")
            .expect("socket closed")
            .expect("socket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Assert nothing else arrives for a short while
pub async fn assert_quiet(ws: &mut Browser) {
    let result = timeout(Duration::from_millis(200), ws.next()).await;
    assert!(result.is_err(), "unexpected message: {:?}", result);
}
