//! End-to-end tests: a fake presentation remote on one side, real WebSocket
//! clients on the other, and the whole bridge in between.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use projector_bridge::application::{PresentationProcess, SessionError};
use projector_bridge::domain::config::{ConnectPolicy, SessionConfig};
use projector_bridge::infrastructure::remote_link::GroupReader;
use projector_bridge::infrastructure::ws_server::OWNER_HEADER;
use projector_bridge::infrastructure::{serve, PresentationLauncher, SessionManager};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const STEP: Duration = Duration::from_secs(5);

// ── Test doubles ──────────────────────────────────────────────────────────────

#[derive(Default)]
struct CountingLauncher {
    stops: Arc<AtomicUsize>,
}

struct CountingProcess {
    stops: Arc<AtomicUsize>,
}

#[async_trait]
impl PresentationProcess for CountingProcess {
    async fn stop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PresentationLauncher for CountingLauncher {
    async fn launch(&self, _presentation: &Path) -> Result<Box<dyn PresentationProcess>, SessionError> {
        Ok(Box::new(CountingProcess {
            stops: Arc::clone(&self.stops),
        }))
    }
}

/// The presentation side: pairs, reports every command tag it receives and
/// writes whatever raw groups the test pushes.
struct FakeRemote {
    addr: String,
    commands: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<&'static [u8]>,
}

impl FakeRemote {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (events, mut event_rx) = mpsc::unbounded_channel::<&'static [u8]>();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut reader = GroupReader::new(read_half);
            reader.next_group().await.unwrap();
            write_half.write_all(b"LO_SERVER_SERVER_PAIRED\n\n").await.unwrap();

            tokio::spawn(async move {
                while let Ok(group) = reader.next_group().await {
                    let _ = command_tx.send(group.tag().to_string());
                }
            });
            while let Some(bytes) = event_rx.recv().await {
                if write_half.write_all(bytes).await.is_err() {
                    break;
                }
            }
        });

        Self { addr, commands, events }
    }

    async fn next_command(&mut self) -> String {
        timeout(STEP, self.commands.recv()).await.unwrap().unwrap()
    }
}

struct Bridge {
    ws_url: String,
    owner_token: String,
    manager: Arc<SessionManager>,
    stops: Arc<AtomicUsize>,
    running: Arc<AtomicBool>,
}

async fn start_bridge(remote: &FakeRemote, max_subscribers: usize) -> Bridge {
    let launcher = Arc::new(CountingLauncher::default());
    let stops = Arc::clone(&launcher.stops);
    let manager = Arc::new(SessionManager::new(launcher));

    let config = SessionConfig {
        remote_addr: remote.addr.clone(),
        max_subscribers,
        connect: ConnectPolicy {
            attempts: 1,
            backoff: Duration::ZERO,
            settle_delay: Duration::ZERO,
        },
        ..SessionConfig::default()
    };
    let owner_token = manager.start_session(Path::new("deck.odp"), config).await.unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let ws_url = format!("ws://{}", listener.local_addr().unwrap());
    let running = Arc::new(AtomicBool::new(true));
    tokio::spawn(serve(listener, Arc::clone(&manager), Arc::clone(&running)));

    Bridge {
        ws_url,
        owner_token,
        manager,
        stops,
        running,
    }
}

async fn connect_viewer(bridge: &Bridge) -> Client {
    let (ws, _) = connect_async(bridge.ws_url.as_str()).await.unwrap();
    ws
}

async fn connect_owner(bridge: &Bridge) -> Client {
    let mut request = bridge.ws_url.as_str().into_client_request().unwrap();
    request
        .headers_mut()
        .insert(OWNER_HEADER, HeaderValue::from_str(&bridge.owner_token).unwrap());
    let (ws, _) = connect_async(request).await.unwrap();
    ws
}

/// Next text frame as JSON, skipping control frames.
async fn next_json(ws: &mut Client) -> Value {
    loop {
        let message = timeout(STEP, ws.next()).await.unwrap().unwrap().unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn send_json(ws: &mut Client, value: Value) {
    ws.send(Message::Text(value.to_string())).await.unwrap();
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_new_subscriber_gets_snapshot_then_live_events() {
    // Arrange
    let remote = FakeRemote::start().await;
    let bridge = start_bridge(&remote, 10).await;
    let mut viewer = connect_viewer(&bridge).await;

    // Act + Assert: snapshot first
    assert_eq!(next_json(&mut viewer).await, json!({"command": "slideshow_idle"}));

    remote.events.send(b"slideshow_started\n5\n0\n\n").unwrap();
    assert_eq!(
        next_json(&mut viewer).await,
        json!({"command": "slideshow_started", "totalSlides": 5, "currentSlide": 0})
    );

    // A late joiner's snapshot reflects the running show.
    let mut late = connect_viewer(&bridge).await;
    assert_eq!(
        next_json(&mut late).await,
        json!({"command": "slideshow_started", "totalSlides": 5, "currentSlide": 0})
    );
    bridge.running.store(false, Ordering::Relaxed);
}

#[tokio::test]
async fn test_commands_reach_the_remote_and_bad_frames_get_errors() {
    // Arrange
    let mut remote = FakeRemote::start().await;
    let bridge = start_bridge(&remote, 10).await;
    let mut viewer = connect_viewer(&bridge).await;
    next_json(&mut viewer).await;

    // Act + Assert: invalid index is answered, connection stays usable
    send_json(&mut viewer, json!({"command": "goto_slide", "index": "-1"})).await;
    assert_eq!(
        next_json(&mut viewer).await,
        json!({"error": "index value not a number or less than 0"})
    );

    send_json(&mut viewer, json!({"command": "presentation_stop"})).await;
    assert_eq!(
        next_json(&mut viewer).await,
        json!({"error": "Only the owner can terminate the session"})
    );

    send_json(&mut viewer, json!({"command": "goto_slide", "index": "2"})).await;
    assert_eq!(remote.next_command().await, "goto_slide");

    assert!(bridge.manager.is_running());
    assert_eq!(bridge.stops.load(Ordering::SeqCst), 0);
    bridge.running.store(false, Ordering::Relaxed);
}

#[tokio::test]
async fn test_owner_stop_terminates_the_session() {
    // Arrange
    let mut remote = FakeRemote::start().await;
    let bridge = start_bridge(&remote, 10).await;
    let mut viewer = connect_viewer(&bridge).await;
    next_json(&mut viewer).await;
    let mut owner = connect_owner(&bridge).await;
    next_json(&mut owner).await;

    // Act
    send_json(&mut owner, json!({"command": "presentation_stop"})).await;

    // Assert
    assert_eq!(remote.next_command().await, "presentation_stop");
    timeout(STEP, bridge.manager.wait_terminated()).await.unwrap();
    assert_eq!(next_json(&mut viewer).await, json!({"command": "slideshow_finished"}));
    assert_eq!(bridge.stops.load(Ordering::SeqCst), 1);
    assert!(bridge.manager.stats().unwrap().terminated);
    bridge.running.store(false, Ordering::Relaxed);
}

#[tokio::test]
async fn test_full_session_refuses_upgrade_with_400() {
    // Arrange
    let remote = FakeRemote::start().await;
    let bridge = start_bridge(&remote, 1).await;
    let mut first = connect_viewer(&bridge).await;
    next_json(&mut first).await;

    // Act
    let result = connect_async(bridge.ws_url.as_str()).await;

    // Assert
    match result {
        Err(WsError::Http(response)) => assert_eq!(response.status(), StatusCode::BAD_REQUEST),
        Err(e) => panic!("expected an HTTP refusal, got {e}"),
        Ok(_) => panic!("upgrade was accepted"),
    }
    bridge.running.store(false, Ordering::Relaxed);
}

#[tokio::test]
async fn test_terminated_session_refuses_new_subscribers() {
    // Arrange
    let remote = FakeRemote::start().await;
    let bridge = start_bridge(&remote, 10).await;
    bridge.manager.terminate().await;

    // Act
    let result = connect_async(bridge.ws_url.as_str()).await;

    // Assert
    match result {
        Err(WsError::Http(response)) => assert_eq!(response.status(), StatusCode::BAD_REQUEST),
        Err(e) => panic!("expected an HTTP refusal, got {e}"),
        Ok(_) => panic!("upgrade was accepted"),
    }
    bridge.running.store(false, Ordering::Relaxed);
}

#[tokio::test]
async fn test_oversized_messages_are_answered_or_refused_by_size() {
    // Arrange
    let remote = FakeRemote::start().await;
    let bridge = start_bridge(&remote, 10).await;
    let mut viewer = connect_viewer(&bridge).await;
    next_json(&mut viewer).await;

    // Act + Assert: just over the read limit gets an error reply
    let padding = "x".repeat(2 * 1024);
    send_json(&mut viewer, json!({"command": "transition_next", "pad": padding})).await;
    assert_eq!(next_json(&mut viewer).await, json!({"error": "Message exceeds 1024 bytes"}));

    // Far beyond it, the framing layer ends the connection.
    let huge = "x".repeat(256 * 1024);
    let _ = viewer.send(Message::Text(huge)).await;
    let reply = timeout(STEP, async {
        loop {
            match viewer.next().await {
                Some(Ok(Message::Text(text))) => return Some(text),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
                Some(Ok(_)) => {}
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(reply, None);
    bridge.running.store(false, Ordering::Relaxed);
}
