//! The one place that owns "the current session".
//!
//! [`SessionManager`] is the collaborator contract offered to whatever serves
//! the outside world (the WebSocket accept loop in this crate): start a
//! session, poll its stats, admit subscribers, terminate it.  It wires the
//! pieces together on start:
//!
//! ```text
//!   launch presentation ──▶ dial + pair remote ──▶ SessionActor::new
//!            │                      │                      │
//!            │ (stopped again       └─ reader.spawn(mailbox)┘
//!            │  if pairing fails)
//! ```
//!
//! At most one session runs at a time.  A terminated session stays visible
//! through [`SessionManager::stats`] until the next one starts.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use tracing::{error, info};
use uuid::Uuid;

use crate::application::errors::SessionError;
use crate::application::session::{SessionActor, SessionHandle};
use crate::domain::config::SessionConfig;
use crate::domain::stats::SessionStats;
use crate::infrastructure::presentation::PresentationLauncher;
use crate::infrastructure::remote_link::RemoteLink;
use crate::infrastructure::subscriber::run_subscriber;

#[derive(Debug, Clone)]
struct ActiveSession {
    owner_token: String,
    handle: SessionHandle,
    config: SessionConfig,
}

pub struct SessionManager {
    launcher: Arc<dyn PresentationLauncher>,
    /// Serializes `start_session` so two callers cannot both launch.
    start_lock: tokio::sync::Mutex<()>,
    current: Mutex<Option<ActiveSession>>,
}

impl SessionManager {
    pub fn new(launcher: Arc<dyn PresentationLauncher>) -> Self {
        Self {
            launcher,
            start_lock: tokio::sync::Mutex::new(()),
            current: Mutex::new(None),
        }
    }

    /// Launches the presentation, pairs with it and starts the session actor.
    ///
    /// Returns the owner token: the credential a subscriber presents to be
    /// admitted as owner.
    ///
    /// # Errors
    ///
    /// - [`SessionError::AlreadyRunning`] while another session is live.
    /// - [`SessionError::Launch`] when the office binary cannot be started.
    /// - [`SessionError::Link`] when dialing or pairing fails; the launched
    ///   process is stopped again before returning.
    pub async fn start_session(&self, presentation: &Path, config: SessionConfig) -> Result<String, SessionError> {
        let _starting = self.start_lock.lock().await;
        if self.is_running() {
            return Err(SessionError::AlreadyRunning);
        }

        let mut process = self.launcher.launch(presentation).await?;

        let link = match RemoteLink::open(&config).await {
            Ok(link) => link,
            Err(e) => {
                error!("could not pair with the presentation at {}: {e}", config.remote_addr);
                process.stop().await;
                return Err(e.into());
            }
        };

        let label = presentation
            .file_name()
            .map_or_else(|| presentation.display().to_string(), |name| name.to_string_lossy().into_owned());
        let (writer, reader) = link.split();
        let (actor, handle) = SessionActor::new(label, config.clone(), writer, process, Some(presentation.to_path_buf()));
        reader.spawn(handle.mailbox());
        actor.spawn();

        let owner_token = Uuid::new_v4().simple().to_string();
        *self.lock_current() = Some(ActiveSession {
            owner_token: owner_token.clone(),
            handle,
            config,
        });

        info!("session started for {}", presentation.display());
        Ok(owner_token)
    }

    /// Snapshot of the current (or last) session, without touching its mailbox.
    pub fn stats(&self) -> Option<SessionStats> {
        self.active().map(|session| session.handle.stats())
    }

    pub fn is_running(&self) -> bool {
        self.active().is_some_and(|session| !session.handle.is_terminated())
    }

    pub fn has_capacity(&self) -> bool {
        self.running().is_some_and(|session| session.handle.has_capacity())
    }

    /// Cheap pre-check for a connection that wants to subscribe.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotRunning`] or [`SessionError::CapacityExceeded`].
    pub fn check_admission(&self) -> Result<(), SessionError> {
        let session = self.running().ok_or(SessionError::NotRunning)?;
        if !session.handle.has_capacity() {
            return Err(SessionError::CapacityExceeded);
        }
        Ok(())
    }

    /// Serves one upgraded WebSocket connection until it closes.
    ///
    /// `credential` is compared against the owner token; a match asks for
    /// the owner role.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotRunning`], plus everything
    /// [`run_subscriber`] returns.
    pub async fn admit_subscriber<S>(&self, ws: WebSocketStream<S>, credential: Option<&str>) -> Result<(), SessionError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let session = self.running().ok_or(SessionError::NotRunning)?;
        let wants_owner = credential == Some(session.owner_token.as_str());
        run_subscriber(ws, session.handle, wants_owner, &session.config).await
    }

    /// Largest subscriber frame the current session accepts, or the default
    /// when nothing is running.
    pub fn read_limit(&self) -> usize {
        self.active()
            .map_or_else(|| SessionConfig::default().read_limit, |session| session.config.read_limit)
    }

    /// Terminates the current session and waits for the cascade to finish.
    /// A no-op when nothing is running.
    pub async fn terminate(&self) {
        if let Some(session) = self.active() {
            session.handle.terminate().await;
        }
    }

    /// Resolves once the current session has terminated, immediately when
    /// there is none.
    pub async fn wait_terminated(&self) {
        if let Some(session) = self.active() {
            session.handle.wait_terminated().await;
        }
    }

    fn running(&self) -> Option<ActiveSession> {
        self.active().filter(|session| !session.handle.is_terminated())
    }

    fn active(&self) -> Option<ActiveSession> {
        self.lock_current().clone()
    }

    fn lock_current(&self) -> std::sync::MutexGuard<'_, Option<ActiveSession>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
