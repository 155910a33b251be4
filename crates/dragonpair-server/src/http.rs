//! HTTP request handlers
//!
//! Serves the embedded pairing page plus a small status API.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use dragonpair_web::Assets;
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::broadcast::{AppState, SessionPhase};

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Static files
        .route("/", get(index_handler))
        .route("/assets/*path", get(asset_handler))
        .route("/*path", get(static_handler))
        // WebSocket endpoint
        .route("/ws", get(crate::websocket::ws_handler))
        // Status API
        .route("/api/status", get(status_handler))
        .route("/api/qr.png", get(qr_png_handler))
        .route("/api/session/reset", post(reset_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the pairing page
async fn index_handler() -> impl IntoResponse {
    match Assets::get("index.html") {
        Some(content) => Html(content.data.to_vec()).into_response(),
        None => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

/// Serve static assets with proper content types
async fn static_handler(
    axum::extract::Path(path): axum::extract::Path<String>,
) -> impl IntoResponse {
    serve_asset(&path)
}

/// Serve assets from /assets/ path
async fn asset_handler(
    axum::extract::Path(path): axum::extract::Path<String>,
) -> impl IntoResponse {
    serve_asset(&path)
}

fn serve_asset(path: &str) -> Response {
    let path = path.trim_start_matches('/');

    debug!("Serving asset: {}", path);

    match Assets::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path)
                .first_or_octet_stream()
                .to_string();

            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, mime)],
                content.data.to_vec(),
            )
                .into_response()
        }
        None => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

// ============================================================================
// Status API
// ============================================================================

/// Pairing status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Current session phase
    pub phase: SessionPhase,
    /// Last status text shown to browsers
    pub status: Option<String>,
    /// Whether a QR code is waiting to be scanned
    pub has_qr: bool,
    /// When the state last changed
    pub updated_at: Option<DateTime<Utc>>,
    /// Open browser connections
    pub clients: usize,
}

/// Get the current pairing status
async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let snapshot = state.snapshot();

    Json(StatusResponse {
        phase: snapshot.phase,
        status: snapshot.status,
        has_qr: snapshot.qr.is_some(),
        updated_at: snapshot.updated_at,
        clients: state.client_count(),
    })
}

/// Current QR code as a PNG image
async fn qr_png_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.snapshot().qr {
        Some(qr) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "image/png"),
                (header::CACHE_CONTROL, "no-store"),
            ],
            qr.png,
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "No QR code available").into_response(),
    }
}

/// Queue a session reset: the client is destroyed and paired from scratch
async fn reset_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    if state.request_reset() {
        StatusCode::ACCEPTED
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
