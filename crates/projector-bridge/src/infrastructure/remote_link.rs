//! TCP link to the presentation application's remote-control port.
//!
//! The session holds exactly one link.  It is opened before the session
//! starts, paired once, then split in two:
//!
//! - a [`RemoteWriter`] the session actor uses (through the
//!   [`RemoteSink`] trait) to send commands;
//! - a [`RemoteReader`] whose task decodes token groups and posts each one to
//!   the session mailbox as [`SessionMessage::RemoteEvent`].  When the stream
//!   ends or fails it posts one [`SessionMessage::RemoteClosed`] and exits.
//!
//! # Streaming protocol
//!
//! TCP is a *stream* protocol: a single `read()` call may return half a
//! group, or several groups at once.  [`GroupReader`] buffers incoming bytes
//! and uses [`projector_core::decode_group`] to extract complete groups one
//! at a time.

use std::io;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use projector_core::{decode_group, MessageGroup, ProtocolError, RemoteCommand, RemoteEvent};

use crate::application::errors::LinkError;
use crate::application::session::{RemoteSink, SessionMessage};
use crate::domain::config::{ConnectPolicy, SessionConfig};

const READ_CHUNK: usize = 4096;

// ── Dialing ───────────────────────────────────────────────────────────────────

/// Dials `addr`, retrying with a fixed pause as `policy` describes.
///
/// The office suite needs a moment to open its remote port after launch, so
/// a refused connection is normal for the first few attempts.
///
/// # Errors
///
/// [`LinkError::Connect`] carrying the last I/O error once every attempt
/// has failed.
pub async fn connect(addr: &str, policy: &ConnectPolicy) -> Result<TcpStream, LinkError> {
    let attempts = policy.attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                info!("connected to remote at {addr} (attempt {attempt}/{attempts})");
                if !policy.settle_delay.is_zero() {
                    debug!("waiting {:?} for the remote server to settle", policy.settle_delay);
                    sleep(policy.settle_delay).await;
                }
                return Ok(stream);
            }
            Err(e) => {
                warn!("remote at {addr} not reachable (attempt {attempt}/{attempts}): {e}");
                last_error = Some(e);
                if attempt < attempts {
                    sleep(policy.backoff).await;
                }
            }
        }
    }

    Err(LinkError::Connect {
        addr: addr.to_string(),
        attempts,
        source: last_error.unwrap_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no attempt made")),
    })
}

// ── Reading ───────────────────────────────────────────────────────────────────

/// Buffers a byte stream and yields complete token groups.
pub struct GroupReader<R> {
    inner: R,
    buffer: Vec<u8>,
    chunk: Vec<u8>,
}

impl<R: AsyncRead + Unpin> GroupReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: Vec::with_capacity(READ_CHUNK),
            chunk: vec![0; READ_CHUNK],
        }
    }

    /// Returns the next complete group.
    ///
    /// Cancel-safe: bytes already read stay buffered for the next call.
    ///
    /// # Errors
    ///
    /// - [`LinkError::Closed`] on a clean end of stream between groups.
    /// - [`LinkError::Protocol`] when the stream ends inside a group or a
    ///   token is not UTF-8.
    /// - [`LinkError::Read`] on an I/O error.
    pub async fn next_group(&mut self) -> Result<MessageGroup, LinkError> {
        loop {
            match decode_group(&self.buffer) {
                Ok((group, consumed)) => {
                    self.buffer.drain(..consumed);
                    return Ok(group);
                }
                Err(ProtocolError::InsufficientData { .. }) => {}
                Err(e) => return Err(e.into()),
            }

            let n = self.inner.read(&mut self.chunk).await.map_err(LinkError::Read)?;
            if n == 0 {
                if self.buffer.iter().all(|b| matches!(b, b'\n' | b'\r')) {
                    return Err(LinkError::Closed);
                }
                return Err(ProtocolError::MalformedFrame(format!(
                    "stream ended inside a group ({} byte(s) buffered)",
                    self.buffer.len()
                ))
                .into());
            }
            self.buffer.extend_from_slice(&self.chunk[..n]);
        }
    }
}

// ── Pairing ───────────────────────────────────────────────────────────────────

/// Sends the pairing request and checks the first reply.
///
/// # Errors
///
/// - [`LinkError::AuthRejected`] when the remote answers that it is still
///   validating the PIN.
/// - [`LinkError::UnexpectedReply`] for any other reply.
pub async fn pair<R, W>(reader: &mut GroupReader<R>, writer: &mut W, name: &str, pin: &str) -> Result<(), LinkError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let request = RemoteCommand::Pair {
        name: name.to_string(),
        pin: pin.to_string(),
    }
    .encode()?;
    writer.write_all(&request).await.map_err(LinkError::Write)?;
    writer.flush().await.map_err(LinkError::Write)?;

    match RemoteEvent::from_group(reader.next_group().await?) {
        RemoteEvent::Paired => Ok(()),
        RemoteEvent::Validating => Err(LinkError::AuthRejected),
        other => Err(LinkError::UnexpectedReply(other.tag().to_string())),
    }
}

// ── Link ──────────────────────────────────────────────────────────────────────

/// An open connection to the remote, not yet attached to a session.
pub struct RemoteLink<R, W> {
    reader: GroupReader<R>,
    writer: W,
}

impl RemoteLink<OwnedReadHalf, OwnedWriteHalf> {
    /// Dials and pairs using the session's remote settings.
    ///
    /// # Errors
    ///
    /// See [`connect`] and [`pair`].
    pub async fn open(config: &SessionConfig) -> Result<Self, LinkError> {
        let stream = connect(&config.remote_addr, &config.connect).await?;
        let (read_half, write_half) = stream.into_split();
        let mut link = Self::new(read_half, write_half);
        link.pair(&config.remote_name, &config.remote_pin).await?;
        Ok(link)
    }
}

impl<R, W> RemoteLink<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: GroupReader::new(reader),
            writer,
        }
    }

    /// # Errors
    ///
    /// See [`pair`].
    pub async fn pair(&mut self, name: &str, pin: &str) -> Result<(), LinkError> {
        pair(&mut self.reader, &mut self.writer, name, pin).await?;
        info!("paired with remote as {name:?}");
        Ok(())
    }

    /// Splits the paired link into its write side and a not yet running
    /// read side.
    ///
    /// [`RemoteSink::close`] on the writer also stops the reader's task.
    pub fn split(self) -> (Arc<RemoteWriter<W>>, RemoteReader<R>) {
        let (close_tx, close_rx) = oneshot::channel();
        let writer = Arc::new(RemoteWriter {
            writer: Mutex::new(Some(self.writer)),
            close_signal: StdMutex::new(Some(close_tx)),
        });
        let reader = RemoteReader {
            reader: self.reader,
            close: close_rx,
        };
        (writer, reader)
    }
}

/// Read side of a paired link.
pub struct RemoteReader<R> {
    reader: GroupReader<R>,
    close: oneshot::Receiver<()>,
}

impl<R> RemoteReader<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    /// Spawns the read task.
    ///
    /// Every decoded group goes to `mailbox`.  The task exits after posting
    /// [`SessionMessage::RemoteClosed`], when the mailbox is gone, or when the
    /// link is closed through its writer.
    pub fn spawn(self, mailbox: mpsc::Sender<SessionMessage>) -> JoinHandle<()> {
        tokio::spawn(read_remote_events(self.reader, mailbox, self.close))
    }
}

async fn read_remote_events<R: AsyncRead + Unpin>(
    mut reader: GroupReader<R>,
    mailbox: mpsc::Sender<SessionMessage>,
    mut close: oneshot::Receiver<()>,
) {
    loop {
        let next = tokio::select! {
            _ = &mut close => {
                debug!("remote link closed locally; reader exiting");
                return;
            }
            next = reader.next_group() => next,
        };

        let (message, last) = match next {
            Ok(group) => {
                debug!("remote → session: {}", group.tag());
                (SessionMessage::RemoteEvent(RemoteEvent::from_group(group)), false)
            }
            Err(e) => (SessionMessage::RemoteClosed(e.to_string()), true),
        };

        if mailbox.send(message).await.is_err() {
            debug!("session mailbox closed; remote reader exiting");
            return;
        }
        if last {
            return;
        }
    }
}

/// Write side of a started link.
pub struct RemoteWriter<W> {
    writer: Mutex<Option<W>>,
    close_signal: StdMutex<Option<oneshot::Sender<()>>>,
}

#[async_trait]
impl<W> RemoteSink for RemoteWriter<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn send(&self, command: &RemoteCommand) -> Result<(), LinkError> {
        let bytes = command.encode()?;
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(LinkError::Closed)?;
        writer.write_all(&bytes).await.map_err(LinkError::Write)?;
        writer.flush().await.map_err(LinkError::Write)
    }

    async fn close(&self) {
        let signal = self.close_signal.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(signal) = signal {
            let _ = signal.send(());
        }

        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            if let Err(e) = writer.shutdown().await {
                debug!("remote write half did not shut down cleanly: {e}");
            }
            info!("remote link closed");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
