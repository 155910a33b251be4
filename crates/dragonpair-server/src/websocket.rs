//! WebSocket handler for pairing page clients
//!
//! Every browser gets the same stream of messages. There is no per-client
//! state beyond a connection id used in logs.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use dragonpair_core::{ClientMessage, ServerMessage};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::broadcast::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle one browser connection until either side closes it
pub async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();

    let (replay, mut rx) = state.subscribe();
    let open = state.client_connected();
    info!("Socket connected: {} ({} open)", id, open);

    let mut open_for_send = true;
    for message in &replay {
        if !send_message(&mut sender, message).await {
            open_for_send = false;
            break;
        }
    }
    if open_for_send && !replay.is_empty() {
        debug!("Replayed {} message(s) to {}", replay.len(), id);
    }

    // Spawn receiver task to handle client messages
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => match ClientMessage::parse(&text) {
                    Ok(ClientMessage::RequestQr) => {
                        // QR codes are pushed as soon as the client issues them
                        debug!("{} requested a QR code", id);
                    }
                    Err(e) => debug!("Ignoring message from {}: {}", id, e),
                },
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    debug!("WebSocket receive error from {}: {}", id, e);
                    break;
                }
                _ => {}
            }
        }
    });

    if open_for_send {
        loop {
            tokio::select! {
                result = rx.recv() => match result {
                    Ok(message) => {
                        if !send_message(&mut sender, &message).await {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!("Socket {} lagged, {} message(s) dropped", id, n);
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = &mut recv_task => break,
            }
        }
    }

    recv_task.abort();
    let open = state.client_disconnected();
    info!("Socket disconnected: {} ({} open)", id, open);
}

/// Send one message; false once the socket is gone
async fn send_message(sender: &mut SplitSink<WebSocket, Message>, message: &ServerMessage) -> bool {
    match message.to_json() {
        Ok(json) => sender.send(Message::Text(json)).await.is_ok(),
        Err(e) => {
            warn!("Failed to encode message: {}", e);
            true
        }
    }
}
