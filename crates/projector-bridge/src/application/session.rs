//! The session actor: single owner of all mutable session state.
//!
//! # How the pieces talk (for beginners)
//!
//! ```text
//!   RemoteLink reader ──RemoteEvent / RemoteClosed──┐
//!   Subscriber pumps ──Register / Unregister /      ├──▶ mailbox ──▶ SessionActor
//!                      SubscriberRequest ───────────┤                 │  │  │
//!   SessionHandle ─────Shutdown ────────────────────┘                 │  │  └─▶ RemoteSink (commands)
//!                                                                     │  └────▶ per-subscriber queues
//!                                                                     └───────▶ stats snapshot (Mutex)
//! ```
//!
//! Every change to the subscriber registry, the slideshow status, the owner
//! timer and the terminated flag happens inside [`SessionActor::run`], one
//! mailbox message at a time.  Nothing else holds a reference to that state,
//! so no locks are needed around it.  The one exception is the
//! [`SessionStats`] snapshot, which the actor republishes behind a
//! `std::sync::Mutex` so callers can poll it without a mailbox round trip.
//!
//! # Termination
//!
//! Whatever triggers it (owner timeout, the owner's stop command, a lost
//! remote link, an explicit [`SessionHandle::terminate`]), termination runs
//! the same cascade exactly once: disarm the timer, send `slideshow_finished`
//! to every subscriber and close their queues, close the remote link, stop
//! the presentation process, release the presentation file.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use projector_core::{PresentationStatus, RemoteCommand, RemoteEvent, StatusChange};

use crate::application::errors::{LinkError, SessionError};
use crate::application::owner_timer::OwnerTimer;
use crate::application::translate::{event_frame, snapshot_frame};
use crate::domain::config::SessionConfig;
use crate::domain::messages::{OutboundFrame, SubscriberEvent};
use crate::domain::stats::SessionStats;

/// Identifies one subscriber connection within a session.
pub type SubscriberId = u64;

/// One serialized JSON frame, shared between all queues it is broadcast to.
pub type OutboundText = Arc<str>;

// ── Seams ─────────────────────────────────────────────────────────────────────

/// Where validated commands go: the write side of the remote link.
#[async_trait]
pub trait RemoteSink: Send + Sync {
    /// Encodes and writes one command.  Not retried.
    async fn send(&self, command: &RemoteCommand) -> Result<(), LinkError>;

    /// Closes the link.  Also ends the link's read task.
    async fn close(&self);
}

/// The presentation subprocess.
#[async_trait]
pub trait PresentationProcess: Send {
    async fn stop(&mut self);
}

// ── Mailbox protocol ──────────────────────────────────────────────────────────

/// A subscriber asking to join, with the sender half of its outbound queue.
#[derive(Debug)]
pub struct SubscriberHandle {
    pub id: SubscriberId,
    /// The connection presented the owner credential.
    pub wants_owner: bool,
    pub outbound: mpsc::Sender<OutboundText>,
}

/// The session's answer to a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub admitted: bool,
    /// Effective role.  False for a second owner-credential connection while
    /// the owner is already present.
    pub is_owner: bool,
}

#[derive(Debug)]
pub enum SessionMessage {
    Register {
        handle: SubscriberHandle,
        reply: oneshot::Sender<Admission>,
    },
    Unregister(SubscriberId),
    RemoteEvent(RemoteEvent),
    /// An already validated command from a registered subscriber.
    SubscriberRequest {
        command: RemoteCommand,
        from: SubscriberId,
    },
    /// The remote link failed after pairing.
    RemoteClosed(String),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TerminationCause {
    OwnerTimeout,
    OwnerStopped,
    RemoteClosed,
    RemoteStalled,
    Requested,
    HandlesDropped,
}

impl fmt::Display for TerminationCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TerminationCause::OwnerTimeout => "owner did not show up in time",
            TerminationCause::OwnerStopped => "owner stopped the presentation",
            TerminationCause::RemoteClosed => "remote link lost",
            TerminationCause::RemoteStalled => "remote stopped accepting commands",
            TerminationCause::Requested => "shutdown requested",
            TerminationCause::HandlesDropped => "all session handles dropped",
        })
    }
}

// ── Handle ────────────────────────────────────────────────────────────────────

/// Cheap, cloneable access to a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    mailbox: mpsc::Sender<SessionMessage>,
    stats: Arc<Mutex<SessionStats>>,
    terminated: watch::Receiver<bool>,
    next_id: Arc<AtomicU64>,
}

impl SessionHandle {
    pub fn next_subscriber_id(&self) -> SubscriberId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Registers a subscriber and waits for the session's decision.
    ///
    /// The subscriber's queue receives the current status snapshot first,
    /// whether it is admitted or not.
    ///
    /// # Errors
    ///
    /// [`SessionError::SessionTerminated`] if the session is gone.
    pub async fn register(&self, handle: SubscriberHandle) -> Result<Admission, SessionError> {
        let (reply, admission) = oneshot::channel();
        self.mailbox
            .send(SessionMessage::Register { handle, reply })
            .await
            .map_err(|_| SessionError::SessionTerminated)?;
        admission.await.map_err(|_| SessionError::SessionTerminated)
    }

    pub async fn unregister(&self, id: SubscriberId) {
        // A terminated session has already dropped every subscriber.
        let _ = self.mailbox.send(SessionMessage::Unregister(id)).await;
    }

    /// Queues a validated command for the remote.
    ///
    /// # Errors
    ///
    /// [`SessionError::SessionTerminated`] if the session is gone.
    pub async fn request(&self, command: RemoteCommand, from: SubscriberId) -> Result<(), SessionError> {
        self.mailbox
            .send(SessionMessage::SubscriberRequest { command, from })
            .await
            .map_err(|_| SessionError::SessionTerminated)
    }

    /// A sender into the session mailbox, for the remote link's read task.
    pub fn mailbox(&self) -> mpsc::Sender<SessionMessage> {
        self.mailbox.clone()
    }

    /// Requests termination and waits until the cascade has completed.
    ///
    /// Safe to call any number of times from any number of tasks.
    pub async fn terminate(&self) {
        let _ = self.mailbox.send(SessionMessage::Shutdown).await;
        self.wait_terminated().await;
    }

    pub async fn wait_terminated(&self) {
        let mut terminated = self.terminated.clone();
        // Err means the actor is gone, which is just as final.
        let _ = terminated.wait_for(|done| *done).await;
    }

    /// True once the cascade has run, or if the actor is gone without
    /// running it.
    pub fn is_terminated(&self) -> bool {
        *self.terminated.borrow() || self.terminated.has_changed().is_err()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn has_capacity(&self) -> bool {
        !self.is_terminated() && self.stats().has_capacity()
    }
}

// ── Actor ─────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Subscriber {
    id: SubscriberId,
    is_owner: bool,
    outbound: mpsc::Sender<OutboundText>,
}

enum Step {
    Message(Option<SessionMessage>),
    OwnerTimeout,
}

pub struct SessionActor {
    label: String,
    config: SessionConfig,
    mailbox: mpsc::Receiver<SessionMessage>,
    remote: Arc<dyn RemoteSink>,
    process: Box<dyn PresentationProcess>,
    presentation: Option<PathBuf>,
    subscribers: Vec<Subscriber>,
    status: PresentationStatus,
    name: String,
    /// Raw base64 image of the current slide, replayed to late joiners.
    preview: Option<String>,
    owner_present: bool,
    owner_timer: OwnerTimer,
    terminated: bool,
    stats: Arc<Mutex<SessionStats>>,
    terminated_tx: watch::Sender<bool>,
}

impl SessionActor {
    /// Builds an actor and the handle used to reach it.
    ///
    /// `label` only appears in log lines.  `presentation` is the file removed
    /// on termination when `config.remove_presentation_on_exit` is set.
    pub fn new(
        label: impl Into<String>,
        config: SessionConfig,
        remote: Arc<dyn RemoteSink>,
        process: Box<dyn PresentationProcess>,
        presentation: Option<PathBuf>,
    ) -> (Self, SessionHandle) {
        let (mailbox_tx, mailbox_rx) = mpsc::channel(config.mailbox_capacity.max(1));
        let (terminated_tx, terminated_rx) = watch::channel(false);
        let stats = Arc::new(Mutex::new(SessionStats::new(
            config.max_subscribers,
            config.owner_timeout.as_secs(),
        )));

        let handle = SessionHandle {
            mailbox: mailbox_tx,
            stats: Arc::clone(&stats),
            terminated: terminated_rx,
            next_id: Arc::new(AtomicU64::new(1)),
        };

        let actor = Self {
            label: label.into(),
            owner_timer: OwnerTimer::new(config.owner_timeout),
            config,
            mailbox: mailbox_rx,
            remote,
            process,
            presentation,
            subscribers: Vec::new(),
            status: PresentationStatus::Idle,
            name: String::new(),
            preview: None,
            owner_present: false,
            terminated: false,
            stats,
            terminated_tx,
        };
        (actor, handle)
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Drains the mailbox until the session terminates.
    pub async fn run(mut self) {
        info!(
            "session {}: started; waiting {}s for the owner to join",
            self.label,
            self.owner_timer.timeout().as_secs()
        );
        self.owner_timer.arm();
        self.publish_stats();

        while !self.terminated {
            let step = tokio::select! {
                message = self.mailbox.recv() => Step::Message(message),
                () = self.owner_timer.expired() => Step::OwnerTimeout,
            };

            match step {
                Step::Message(Some(message)) => self.handle(message).await,
                Step::Message(None) => self.terminate(TerminationCause::HandlesDropped).await,
                Step::OwnerTimeout => {
                    warn!(
                        "session {}: owner absent for {}s",
                        self.label,
                        self.owner_timer.timeout().as_secs()
                    );
                    self.terminate(TerminationCause::OwnerTimeout).await;
                }
            }
        }

        debug!("session {}: actor stopped", self.label);
    }

    async fn handle(&mut self, message: SessionMessage) {
        match message {
            SessionMessage::Register { handle, reply } => self.register(handle, reply),
            SessionMessage::Unregister(id) => self.unregister(id),
            SessionMessage::RemoteEvent(event) => self.on_remote_event(event).await,
            SessionMessage::SubscriberRequest { command, from } => {
                self.on_subscriber_request(command, from).await;
            }
            SessionMessage::RemoteClosed(reason) => {
                error!("session {}: remote link failed: {reason}", self.label);
                self.terminate(TerminationCause::RemoteClosed).await;
            }
            SessionMessage::Shutdown => self.terminate(TerminationCause::Requested).await,
        }

        if !self.terminated {
            self.publish_stats();
        }
    }

    // ── Registry ──────────────────────────────────────────────────────────────

    fn register(&mut self, handle: SubscriberHandle, reply: oneshot::Sender<Admission>) {
        let id = handle.id;
        let admitted = self.subscribers.len() < self.config.max_subscribers;
        let is_owner = admitted && handle.wants_owner && !self.owner_present;

        // The snapshot goes first in every case so a joiner can render state.
        if let Some(snapshot) = encode(&snapshot_frame(&self.status, self.preview.as_deref())) {
            if let Err(e) = handle.outbound.try_send(snapshot) {
                debug!("session {}: could not queue snapshot for subscriber {id}: {e}", self.label);
            }
        }

        if admitted {
            if handle.wants_owner && !is_owner {
                warn!(
                    "session {}: subscriber {id} presented the owner credential while the owner is connected; joining as viewer",
                    self.label
                );
            }
            if is_owner {
                self.owner_present = true;
                self.owner_timer.disarm();
                info!("session {}: owner joined as subscriber {id}", self.label);
            }
            self.subscribers.push(Subscriber {
                id,
                is_owner,
                outbound: handle.outbound,
            });
            info!(
                "session {}: subscriber {id} registered ({}/{})",
                self.label,
                self.subscribers.len(),
                self.config.max_subscribers
            );
        } else {
            warn!(
                "session {}: subscriber {id} refused, maximum of {} reached",
                self.label, self.config.max_subscribers
            );
        }

        if reply.send(Admission { admitted, is_owner }).is_err() && admitted {
            debug!("session {}: subscriber {id} went away before admission", self.label);
            self.unregister(id);
        }
    }

    fn unregister(&mut self, id: SubscriberId) {
        match self.subscribers.iter().position(|s| s.id == id) {
            Some(pos) => {
                let subscriber = self.subscribers.remove(pos);
                self.release_subscriber(subscriber, "left");
            }
            None => debug!("session {}: subscriber {id} already removed", self.label),
        }
    }

    /// Drops a subscriber that is no longer in the registry, closing its queue.
    fn release_subscriber(&mut self, subscriber: Subscriber, reason: &str) {
        if subscriber.is_owner {
            self.owner_present = false;
            self.owner_timer.arm();
            info!(
                "session {}: owner {reason}; waiting {}s for them to come back",
                self.label,
                self.owner_timer.timeout().as_secs()
            );
        }
        info!(
            "session {}: subscriber {} {reason} ({} remaining)",
            self.label,
            subscriber.id,
            self.subscribers.len()
        );
    }

    // ── Remote events ─────────────────────────────────────────────────────────

    async fn on_remote_event(&mut self, event: RemoteEvent) {
        match &event {
            RemoteEvent::SlideShowInfo { name } => {
                info!("session {}: presentation name is {name:?}", self.label);
                self.name.clone_from(name);
            }
            RemoteEvent::Unrecognized(group) => {
                debug!("session {}: forwarding unrecognized remote group {:?}", self.label, group.tag());
            }
            RemoteEvent::Paired | RemoteEvent::Validating => {
                warn!("session {}: unexpected {} after pairing", self.label, event.tag());
            }
            _ => {}
        }

        match self.status.apply(&event) {
            StatusChange::Started | StatusChange::SlideChanged => {
                self.preview = event.preview().map(str::to_owned);
                debug!("session {}: status is now {}", self.label, self.status);
            }
            StatusChange::Finished => {
                self.preview = None;
                info!("session {}: slideshow finished", self.label);
            }
            StatusChange::Unchanged => {}
        }

        self.broadcast(&event_frame(&event)).await;
    }

    /// Delivers one frame to every subscriber queue in registry order.
    ///
    /// A queue that stays full for `delivery_timeout`, or that is already
    /// closed, gets its subscriber evicted.
    async fn broadcast(&mut self, frame: &OutboundFrame) {
        let Some(text) = encode(frame) else {
            return;
        };

        let mut evicted = Vec::new();
        for subscriber in &self.subscribers {
            match subscriber
                .outbound
                .send_timeout(Arc::clone(&text), self.config.delivery_timeout)
                .await
            {
                Ok(()) => {}
                Err(SendTimeoutError::Timeout(_)) => {
                    warn!(
                        "session {}: subscriber {} did not drain its queue within {:?}",
                        self.label, subscriber.id, self.config.delivery_timeout
                    );
                    evicted.push(subscriber.id);
                }
                Err(SendTimeoutError::Closed(_)) => evicted.push(subscriber.id),
            }
        }

        for id in evicted {
            if let Some(pos) = self.subscribers.iter().position(|s| s.id == id) {
                let subscriber = self.subscribers.remove(pos);
                self.release_subscriber(subscriber, "was evicted");
            }
        }
    }

    // ── Subscriber requests ───────────────────────────────────────────────────

    async fn on_subscriber_request(&mut self, command: RemoteCommand, from: SubscriberId) {
        let Some(sender) = self.subscribers.iter().find(|s| s.id == from) else {
            debug!("session {}: dropping request from unregistered subscriber {from}", self.label);
            return;
        };
        if command.is_privileged() && !sender.is_owner {
            warn!(
                "session {}: subscriber {from} is not the owner; dropping {}",
                self.label,
                command.tag()
            );
            return;
        }

        debug!("session {}: subscriber {from} → remote: {}", self.label, command.tag());
        match timeout(self.config.write_timeout, self.remote.send(&command)).await {
            Ok(Ok(())) => {}
            // The read task notices a dead link on its own.
            Ok(Err(e)) => warn!("session {}: failed to forward {}: {e}", self.label, command.tag()),
            Err(_) => {
                error!(
                    "session {}: remote did not accept {} within {}s",
                    self.label,
                    command.tag(),
                    self.config.write_timeout.as_secs()
                );
                self.terminate(TerminationCause::RemoteStalled).await;
                return;
            }
        }

        if command == RemoteCommand::StopPresentation {
            self.terminate(TerminationCause::OwnerStopped).await;
        }
    }

    // ── Termination ───────────────────────────────────────────────────────────

    async fn terminate(&mut self, cause: TerminationCause) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        info!("session {}: terminating ({cause})", self.label);

        self.owner_timer.disarm();

        let subscribers = std::mem::take(&mut self.subscribers);
        if let Some(finished) = encode(&SubscriberEvent::Finished.into()) {
            for subscriber in &subscribers {
                if let Err(e) = subscriber
                    .outbound
                    .send_timeout(Arc::clone(&finished), self.config.delivery_timeout)
                    .await
                {
                    debug!(
                        "session {}: could not deliver final event to subscriber {}: {e}",
                        self.label, subscriber.id
                    );
                }
            }
        }
        // Dropping the senders closes every outbound queue.
        drop(subscribers);
        self.owner_present = false;

        self.remote.close().await;
        self.process.stop().await;
        self.release_presentation().await;

        self.publish_stats();
        self.terminated_tx.send_replace(true);
        info!("session {}: terminated", self.label);
    }

    async fn release_presentation(&mut self) {
        if !self.config.remove_presentation_on_exit {
            return;
        }
        if let Some(path) = self.presentation.take() {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => info!("session {}: removed {}", self.label, path.display()),
                Err(e) => warn!("session {}: failed to remove {}: {e}", self.label, path.display()),
            }
        }
    }

    fn publish_stats(&self) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        stats.name.clone_from(&self.name);
        stats.status = self.status;
        stats.subscriber_count = self.subscribers.len();
        stats.owner_present = self.owner_present;
        stats.terminated = self.terminated;
    }
}

fn encode(frame: &OutboundFrame) -> Option<OutboundText> {
    match frame.to_json() {
        Ok(text) => Some(Arc::from(text)),
        Err(e) => {
            error!("failed to serialize subscriber frame: {e}");
            None
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
