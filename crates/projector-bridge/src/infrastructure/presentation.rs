//! Launching and stopping the office suite that shows the presentation.
//!
//! The bridge starts one `soffice --invisible --norestore --show <file>`
//! process per session.  The session actor stops it as part of termination;
//! `kill_on_drop` makes sure it never outlives the bridge either.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::application::errors::SessionError;
use crate::application::session::PresentationProcess;

/// How long a killed process gets to be reaped before we give up waiting.
const REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// Starts presentation processes.  The seam lets tests swap the office suite
/// for a fake.
#[async_trait]
pub trait PresentationLauncher: Send + Sync {
    /// # Errors
    ///
    /// [`SessionError::Launch`] when the process cannot be spawned.
    async fn launch(&self, presentation: &Path) -> Result<Box<dyn PresentationProcess>, SessionError>;
}

/// Launches LibreOffice Impress in show mode.
#[derive(Debug, Clone)]
pub struct SofficeLauncher {
    office_path: PathBuf,
}

impl SofficeLauncher {
    pub fn new(office_path: impl Into<PathBuf>) -> Self {
        Self {
            office_path: office_path.into(),
        }
    }

    /// The argument list passed to the office binary.
    pub fn arguments(presentation: &Path) -> Vec<std::ffi::OsString> {
        vec![
            "--invisible".into(),
            "--norestore".into(),
            "--show".into(),
            presentation.as_os_str().to_owned(),
        ]
    }
}

#[async_trait]
impl PresentationLauncher for SofficeLauncher {
    async fn launch(&self, presentation: &Path) -> Result<Box<dyn PresentationProcess>, SessionError> {
        let child = Command::new(&self.office_path)
            .args(Self::arguments(presentation))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SessionError::Launch {
                program: self.office_path.clone(),
                source,
            })?;

        info!(
            "launched {} (pid {}) for {}",
            self.office_path.display(),
            child.id().map_or_else(|| "?".to_string(), |pid| pid.to_string()),
            presentation.display()
        );
        Ok(Box::new(SofficeProcess { child }))
    }
}

/// A running office process.
#[derive(Debug)]
pub struct SofficeProcess {
    child: Child,
}

#[async_trait]
impl PresentationProcess for SofficeProcess {
    /// Kills the process if it is still running and reaps it.
    async fn stop(&mut self) {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                debug!("presentation process already exited with {status}");
                return;
            }
            Ok(None) => {}
            Err(e) => warn!("could not query presentation process: {e}"),
        }

        if let Err(e) = self.child.start_kill() {
            warn!("failed to kill presentation process: {e}");
            return;
        }

        match tokio::time::timeout(REAP_TIMEOUT, self.child.wait()).await {
            Ok(Ok(status)) => info!("presentation process stopped ({status})"),
            Ok(Err(e)) => warn!("failed to reap presentation process: {e}"),
            Err(_) => warn!("presentation process did not exit within {REAP_TIMEOUT:?}"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
