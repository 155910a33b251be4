//! End-to-end relay behaviour over real WebSocket connections

mod common;

use common::{assert_quiet, next_message, TestServer};
use dragonpair_core::{LifecycleEvent, ReplayPolicy, ServerMessage};
use dragonpair_server::relay::{STATUS_AUTHENTICATED, STATUS_READY, STATUS_SCAN};
use dragonpair_server::SessionPhase;
use futures::SinkExt;
use tokio_tungstenite::tungstenite::Message;

fn is_image(message: &ServerMessage) -> bool {
    matches!(message, ServerMessage::Qr(url) if url.starts_with("data:image/png;base64,"))
}

#[tokio::test]
async fn clients_receive_broadcasts_after_connecting_in_order() {
    let server = TestServer::start(ReplayPolicy::None).await;

    let mut first = server.connect().await;
    server.emit_token("1@ABC==,xyz").await;
    assert!(is_image(&next_message(&mut first).await));
    assert_eq!(
        next_message(&mut first).await,
        ServerMessage::Message(STATUS_SCAN.to_string())
    );

    let mut second = server.connect().await;
    server
        .emit(LifecycleEvent::AuthFailure("conflict".to_string()))
        .await;
    server.emit(LifecycleEvent::Ready).await;

    let expected = vec![
        ServerMessage::Message("Authentication failure: conflict".to_string()),
        ServerMessage::Ready(true),
        ServerMessage::Message(STATUS_READY.to_string()),
    ];
    for browser in [&mut first, &mut second] {
        for message in &expected {
            assert_eq!(&next_message(browser).await, message);
        }
    }

    // The second browser never saw the QR code sent before it connected
    assert_quiet(&mut second).await;
    server.stop().await;
}

#[tokio::test]
async fn late_joiners_see_paired_state() {
    let server = TestServer::start(ReplayPolicy::LastKnown).await;

    server.emit_token("1@ABC==,xyz").await;
    server.emit(LifecycleEvent::Authenticated).await;
    server.emit(LifecycleEvent::Ready).await;
    let state = server.state.clone();
    common::wait_until(move || state.phase() == SessionPhase::Ready).await;

    let mut early = server.connect().await;
    assert_eq!(next_message(&mut early).await, ServerMessage::Ready(true));
    assert_eq!(
        next_message(&mut early).await,
        ServerMessage::Message(STATUS_READY.to_string())
    );

    let mut late = server.connect().await;
    assert_eq!(next_message(&mut late).await, ServerMessage::Ready(true));
    assert_eq!(
        next_message(&mut late).await,
        ServerMessage::Message(STATUS_READY.to_string())
    );
    assert_quiet(&mut late).await;

    server.stop().await;
}

#[tokio::test]
async fn late_joiner_gets_current_qr_code() {
    let server = TestServer::start(ReplayPolicy::LastKnown).await;

    server.emit_token("first").await;
    server.emit_token("second").await;
    let state = server.state.clone();
    let expected = dragonpair_server::QrRenderer::new(100)
        .render(&dragonpair_core::PairingToken::new("second"))
        .unwrap()
        .data_url;
    let wanted = expected.clone();
    common::wait_until(move || {
        state.snapshot().qr.map(|qr| qr.data_url) == Some(wanted.clone())
    })
    .await;

    let mut browser = server.connect().await;
    assert_eq!(next_message(&mut browser).await, ServerMessage::Qr(expected));
    assert_eq!(
        next_message(&mut browser).await,
        ServerMessage::Message(STATUS_SCAN.to_string())
    );

    server.stop().await;
}

#[tokio::test]
async fn request_qr_keeps_connection_open() {
    let server = TestServer::start(ReplayPolicy::None).await;
    let mut browser = server.connect().await;

    browser
        .send(Message::text(r#"{"type":"request-qr"}"#.to_string()))
        .await
        .unwrap();
    browser.send(Message::text("not json".to_string())).await.unwrap();

    server.emit(LifecycleEvent::Authenticated).await;
    assert_eq!(
        next_message(&mut browser).await,
        ServerMessage::Message(STATUS_AUTHENTICATED.to_string())
    );

    server.stop().await;
}

#[tokio::test]
async fn closed_clients_leave_the_broadcast_set() {
    let server = TestServer::start(ReplayPolicy::None).await;
    let mut browser = server.connect().await;
    browser.close(None).await.unwrap();

    let state = server.state.clone();
    common::wait_until(move || state.client_count() == 0).await;

    // Broadcasting with nobody listening is fine
    server.emit(LifecycleEvent::Authenticated).await;
    let state = server.state.clone();
    common::wait_until(move || state.phase() == SessionPhase::Authenticated).await;

    server.stop().await;
}

#[tokio::test]
async fn disconnect_withdraws_image_from_open_browsers() {
    let server = TestServer::start(ReplayPolicy::LastKnown).await;
    let mut browser = server.connect().await;

    server.emit_token("1@ABC==,xyz").await;
    assert!(is_image(&next_message(&mut browser).await));
    next_message(&mut browser).await;

    server
        .emit(LifecycleEvent::Disconnected("NAVIGATION".to_string()))
        .await;
    assert_eq!(next_message(&mut browser).await, ServerMessage::Ready(false));
    assert_eq!(
        next_message(&mut browser).await,
        ServerMessage::Message("Disconnected: NAVIGATION".to_string())
    );

    // A browser joining now sees the same page: status only, no image
    let mut late = server.connect().await;
    assert_eq!(
        next_message(&mut late).await,
        ServerMessage::Message("Disconnected: NAVIGATION".to_string())
    );
    assert_quiet(&mut late).await;

    server.stop().await;
}
