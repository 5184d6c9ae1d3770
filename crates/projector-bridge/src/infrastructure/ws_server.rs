//! WebSocket server: accept loop and per-connection handoff.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Accepting incoming TCP connections from browsers.
//! 3. Refusing the upgrade with HTTP 400 and a JSON error body when no
//!    session is running or the session is full.
//! 4. Capping inbound WebSocket messages at the framing layer, a fixed
//!    multiple of the session's read limit.  Frames between the read limit
//!    and the cap get an error reply; larger ones end the connection.
//! 5. Reading the owner credential from the `X-Owner-UUID` header or the
//!    `ownerUUID` cookie.
//! 6. Handing the upgraded connection to [`SessionManager::admit_subscriber`]
//!    in its own Tokio task.
//! 7. Stopping when the `running` flag is cleared.
//!
//! # Scalability
//!
//! The accept loop never blocks on a connection: it accepts and immediately
//! spawns a task for it before accepting the next one.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::accept_hdr_async_with_config;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::http::header::{CONTENT_TYPE, COOKIE};
use tokio_tungstenite::tungstenite::http::{HeaderMap, HeaderValue, StatusCode};
use tracing::{debug, error, info, warn};

use crate::application::errors::SessionError;
use crate::domain::messages::OutboundFrame;
use crate::infrastructure::session_manager::SessionManager;

/// Header carrying the owner credential.
pub const OWNER_HEADER: &str = "x-owner-uuid";
/// Cookie carrying the owner credential when the header is absent.
pub const OWNER_COOKIE: &str = "ownerUUID";

const ACCEPT_POLL: Duration = Duration::from_millis(200);

/// Framing-layer message cap: a multiple of the read limit, with a floor.
const FRAME_CAP_FACTOR: usize = 16;
const MIN_FRAME_CAP: usize = 64 * 1024;

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds `bind_addr` and serves subscribers until `running` is cleared.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot be bound (e.g., the port is
/// already in use or the process lacks permission to bind).
pub async fn run_server(bind_addr: SocketAddr, manager: Arc<SessionManager>, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind WebSocket listener on {bind_addr}"))?;

    info!("WebSocket server listening on {bind_addr}");
    serve(listener, manager, running).await;
    Ok(())
}

/// Runs the accept loop on an already bound listener.
pub async fn serve(listener: TcpListener, manager: Arc<SessionManager>, running: Arc<AtomicBool>) {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // Short timeout so the loop notices the flag without a new connection.
        match timeout(ACCEPT_POLL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                debug!("new connection from {peer_addr}");
                let manager = Arc::clone(&manager);
                tokio::spawn(async move {
                    handle_connection(stream, peer_addr, manager).await;
                });
            }
            Ok(Err(e)) => error!("accept error: {e}"),
            Err(_) => {}
        }
    }
}

// ── Per-connection handler ────────────────────────────────────────────────────

async fn handle_connection(stream: TcpStream, peer_addr: SocketAddr, manager: Arc<SessionManager>) {
    let ws_config = websocket_config(manager.read_limit());
    let mut credential = None;

    let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        if let Err(e) = manager.check_admission() {
            info!("refusing {peer_addr}: {e}");
            return Err(refusal(&e));
        }
        credential = owner_credential(request.headers());
        Ok(response)
    };

    let ws = match accept_hdr_async_with_config(stream, callback, Some(ws_config)).await {
        Ok(ws) => ws,
        Err(e) => {
            debug!("WebSocket handshake with {peer_addr} ended: {e}");
            return;
        }
    };

    info!("WebSocket connection established: {peer_addr}");
    match manager.admit_subscriber(ws, credential.as_deref()).await {
        Ok(()) => info!("connection {peer_addr} closed"),
        Err(e) => warn!("connection {peer_addr} closed: {e}"),
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Extracts the owner credential from the upgrade request headers.
///
/// The `X-Owner-UUID` header wins over the `ownerUUID` cookie.
pub fn owner_credential(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(OWNER_HEADER).and_then(|v| v.to_str().ok()) {
        return Some(value.trim().to_string());
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == OWNER_COOKIE)
        .map(|(_, value)| value.to_string())
}

/// Framing limits for a subscriber connection with the given read limit.
pub fn websocket_config(read_limit: usize) -> WebSocketConfig {
    let cap = read_limit.saturating_mul(FRAME_CAP_FACTOR).max(MIN_FRAME_CAP);
    WebSocketConfig {
        max_message_size: Some(cap),
        max_frame_size: Some(cap),
        ..WebSocketConfig::default()
    }
}

/// The HTTP 400 response sent instead of the upgrade.
fn refusal(error: &SessionError) -> ErrorResponse {
    let message = error.to_string();
    let body = OutboundFrame::error(message.clone())
        .to_json()
        .unwrap_or_else(|_| format!(r#"{{"error":"{message}"}}"#));

    let mut response = ErrorResponse::new(Some(body));
    *response.status_mut() = StatusCode::BAD_REQUEST;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_from_header() {
        let mut headers = HeaderMap::new();
        headers.insert(OWNER_HEADER, HeaderValue::from_static("abc123"));

        assert_eq!(owner_credential(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn test_credential_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; ownerUUID=f00d; lang=en"));

        assert_eq!(owner_credential(&headers), Some("f00d".to_string()));
    }

    #[test]
    fn test_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(OWNER_HEADER, HeaderValue::from_static("from-header"));
        headers.insert(COOKIE, HeaderValue::from_static("ownerUUID=from-cookie"));

        assert_eq!(owner_credential(&headers), Some("from-header".to_string()));
    }

    #[test]
    fn test_no_credential() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark"));

        assert_eq!(owner_credential(&headers), None);
    }

    #[test]
    fn test_websocket_config_caps_messages() {
        let default_limit = websocket_config(1024);
        assert_eq!(default_limit.max_message_size, Some(64 * 1024));
        assert_eq!(default_limit.max_frame_size, Some(64 * 1024));

        let large_limit = websocket_config(1024 * 1024);
        assert_eq!(large_limit.max_message_size, Some(16 * 1024 * 1024));

        assert_eq!(websocket_config(usize::MAX).max_message_size, Some(usize::MAX));
    }

    #[test]
    fn test_refusal_is_400_with_json_body() {
        // Act
        let response = refusal(&SessionError::CapacityExceeded);

        // Assert
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            HeaderValue::from_static("application/json")
        );
        assert_eq!(
            response.body().as_deref(),
            Some(r#"{"error":"Slideshow has reached the maximum number of controllers"}"#)
        );
    }
}
