//! Per-connection pump between one WebSocket subscriber and the session.
//!
//! Each admitted connection runs two halves:
//!
//! ```text
//!             ┌──────────── write pump (spawned task) ─────────────┐
//!  session ──▶│ outbound queue ─┐                                  │
//!             │ error frames ───┼─▶ WebSocket sink (≤ write_timeout)│──▶ browser
//!             │ ping ticker ────┘                                  │
//!             └────────────────────────────────────────────────────┘
//!  browser ──▶ read loop: decode, authorize ──▶ SessionHandle::request
//! ```
//!
//! The session actor is the only holder of the outbound queue's sender.
//! Rejected frames produce error frames on a second, connection-local channel.
//! When the actor drops the queue (unregister, eviction, termination) the
//! write pump sends a Close frame and exits, which in turn ends the read loop.

use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

use crate::application::errors::{CommandError, SessionError};
use crate::application::owner_timer::deadline_after;
use crate::application::session::{OutboundText, SessionHandle, SubscriberHandle, SubscriberId};
use crate::application::translate::{authorize, decode_subscriber_frame};
use crate::domain::config::SessionConfig;
use crate::domain::messages::OutboundFrame;

/// Pending error frames per connection.
const ERROR_QUEUE_CAPACITY: usize = 8;

#[derive(Debug, Clone, Copy)]
struct PumpTiming {
    heartbeat_interval: Duration,
    write_timeout: Duration,
}

/// Registers `ws` with the session and pumps frames until either side ends.
///
/// Returns once the connection is closed and the subscriber has been
/// unregistered.
///
/// # Errors
///
/// - [`SessionError::CapacityExceeded`] when the session refused the
///   registration.  The connection still received the status snapshot and a
///   Close frame.
/// - [`SessionError::SessionTerminated`] when the session was already gone.
pub async fn run_subscriber<S>(
    ws: WebSocketStream<S>,
    session: SessionHandle,
    wants_owner: bool,
    config: &SessionConfig,
) -> Result<(), SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let id = session.next_subscriber_id();
    let (sink, stream) = ws.split();
    let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_queue_capacity.max(1));
    let (error_tx, error_rx) = mpsc::channel(ERROR_QUEUE_CAPACITY);

    let timing = PumpTiming {
        heartbeat_interval: config.heartbeat_interval,
        write_timeout: config.write_timeout,
    };
    let mut writer = tokio::spawn(write_pump(sink, outbound_rx, error_rx, timing, id));

    let registration = session
        .register(SubscriberHandle {
            id,
            wants_owner,
            outbound: outbound_tx,
        })
        .await;

    let admission = match registration {
        Ok(admission) if admission.admitted => admission,
        Ok(_) => {
            drop(error_tx);
            let _ = writer.await;
            return Err(SessionError::CapacityExceeded);
        }
        Err(e) => {
            drop(error_tx);
            let _ = writer.await;
            return Err(e);
        }
    };

    let role = if admission.is_owner { "owner" } else { "viewer" };
    info!("subscriber {id}: connected as {role}");

    let writer_finished = read_loop(stream, &mut writer, &session, id, admission.is_owner, &error_tx, config).await;

    session.unregister(id).await;
    drop(error_tx);
    if !writer_finished {
        let _ = writer.await;
    }
    info!("subscriber {id}: disconnected");
    Ok(())
}

// ── Inbound half ──────────────────────────────────────────────────────────────

/// Returns true when the loop ended because the write pump finished.
async fn read_loop<S>(
    mut stream: SplitStream<WebSocketStream<S>>,
    writer: &mut JoinHandle<()>,
    session: &SessionHandle,
    id: SubscriberId,
    is_owner: bool,
    errors: &mpsc::Sender<String>,
    config: &SessionConfig,
) -> bool
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut deadline = deadline_after(config.heartbeat_timeout);

    loop {
        let next = tokio::select! {
            next = stream.next() => next,
            _ = &mut *writer => {
                debug!("subscriber {id}: write pump finished");
                return true;
            }
            () = sleep_until(deadline) => {
                warn!("subscriber {id}: no heartbeat response within {:?}", config.heartbeat_timeout);
                return false;
            }
        };

        let message = match next {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                debug!("subscriber {id}: read failed: {e}");
                return false;
            }
            None => return false,
        };

        match message {
            Message::Text(text) => {
                match decode_subscriber_frame(&text, config.read_limit).and_then(|c| authorize(c, is_owner)) {
                    Ok(command) => {
                        debug!("subscriber {id} → session: {}", command.tag());
                        if session.request(command, id).await.is_err() {
                            return false;
                        }
                    }
                    Err(e) => reject(errors, id, &e).await,
                }
            }
            Message::Binary(_) => reject(errors, id, &CommandError::UnsupportedFrame).await,
            Message::Pong(_) => deadline = deadline_after(config.heartbeat_timeout),
            Message::Ping(_) => debug!("subscriber {id}: ping"),
            Message::Close(_) => {
                debug!("subscriber {id}: Close frame received");
                return false;
            }
            Message::Frame(_) => {}
        }
    }
}

async fn reject(errors: &mpsc::Sender<String>, id: SubscriberId, error: &CommandError) {
    debug!("subscriber {id}: rejected frame: {error}");
    match OutboundFrame::error(error.to_string()).to_json() {
        Ok(text) => {
            // A closed channel means the write pump is already gone.
            let _ = errors.send(text).await;
        }
        Err(e) => warn!("subscriber {id}: failed to serialize error frame: {e}"),
    }
}

// ── Outbound half ─────────────────────────────────────────────────────────────

async fn write_pump<S>(
    mut sink: SplitSink<WebSocketStream<S>, Message>,
    mut outbound: mpsc::Receiver<OutboundText>,
    mut errors: mpsc::Receiver<String>,
    timing: PumpTiming,
    id: SubscriberId,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // A zero period would panic inside `interval_at`.
    let period = timing.heartbeat_interval.max(Duration::from_millis(1));
    let mut ticker = interval_at(deadline_after(period), period);
    let mut errors_open = true;

    loop {
        let message = tokio::select! {
            biased;

            next = outbound.recv() => match next {
                Some(text) => Message::Text(text.to_string()),
                None => {
                    debug!("subscriber {id}: outbound queue closed");
                    let _ = timeout(timing.write_timeout, sink.send(Message::Close(None))).await;
                    return;
                }
            },
            next = errors.recv(), if errors_open => match next {
                Some(text) => Message::Text(text),
                None => {
                    errors_open = false;
                    continue;
                }
            },
            _ = ticker.tick() => Message::Ping(Vec::new()),
        };

        match timeout(timing.write_timeout, sink.send(message)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!("subscriber {id}: write failed: {e}");
                return;
            }
            Err(_) => {
                warn!("subscriber {id}: write did not complete within {:?}", timing.write_timeout);
                return;
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
