//! Presentation remote-control bridge: entry point.
//!
//! This binary opens one presentation in LibreOffice Impress, pairs with the
//! office suite's remote-control port, and lets web browsers follow and
//! drive the slideshow over WebSocket.
//!
//! # Usage
//!
//! ```text
//! projector-bridge --presentation <FILE> [OPTIONS]
//!
//! Options:
//!   --config <FILE>          TOML config file
//!   --ws-bind <IP>           WebSocket bind address [default: 0.0.0.0]
//!   --ws-port <PORT>         WebSocket port [default: 8080]
//!   --remote-host <HOST>     Office remote-control host [default: 127.0.0.1]
//!   --remote-port <PORT>     Office remote-control port [default: 1599]
//!   --remote-name <NAME>     Name sent when pairing [default: Remote]
//!   --remote-pin <PIN>       PIN sent when pairing [default: 12345]
//!   --office-path <PATH>     Office binary [default: soffice]
//!   --max-subscribers <N>    Simultaneous subscribers [default: 10]
//!   --owner-timeout <SECS>   Owner absence allowed [default: 60]
//!   --remove-on-exit         Delete the presentation file afterwards
//! ```
//!
//! # Configuration precedence
//!
//! CLI flags and their `PROJECTOR_*` environment variables win over the
//! config file, which wins over the built-in defaults.
//!
//! | Variable                    | Flag                |
//! |-----------------------------|---------------------|
//! | `PROJECTOR_PRESENTATION`    | `--presentation`    |
//! | `PROJECTOR_CONFIG`          | `--config`          |
//! | `PROJECTOR_WS_BIND`         | `--ws-bind`         |
//! | `PROJECTOR_WS_PORT`         | `--ws-port`         |
//! | `PROJECTOR_REMOTE_HOST`     | `--remote-host`     |
//! | `PROJECTOR_REMOTE_PORT`     | `--remote-port`     |
//! | `PROJECTOR_REMOTE_NAME`     | `--remote-name`     |
//! | `PROJECTOR_REMOTE_PIN`      | `--remote-pin`      |
//! | `PROJECTOR_OFFICE_PATH`     | `--office-path`     |
//! | `PROJECTOR_MAX_SUBSCRIBERS` | `--max-subscribers` |
//! | `PROJECTOR_OWNER_TIMEOUT`   | `--owner-timeout`   |
//! | `PROJECTOR_REMOVE_ON_EXIT`  | `--remove-on-exit`  |
//!
//! # Lifecycle
//!
//! The bridge serves subscribers until Ctrl+C or until the session ends on
//! its own (owner timeout, owner stop, lost remote link).  Either way the
//! session's termination cascade runs before the accept loop stops.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use projector_bridge::domain::BridgeConfig;
use projector_bridge::infrastructure::{
    load_config, run_server, FileConfig, PresentationLauncher, SessionManager, SofficeLauncher,
};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Presentation remote-control bridge.
///
/// Shows a presentation in LibreOffice Impress and relays its remote-control
/// protocol to WebSocket subscribers.
#[derive(Debug, Parser)]
#[command(
    name = "projector-bridge",
    about = "Presentation remote-control bridge for WebSocket subscribers",
    version
)]
struct Cli {
    /// Presentation file to show.
    #[arg(long, short, env = "PROJECTOR_PRESENTATION")]
    presentation: PathBuf,

    /// Optional TOML configuration file.
    #[arg(long, env = "PROJECTOR_CONFIG")]
    config: Option<PathBuf>,

    /// IP address to bind the WebSocket server to.
    ///
    /// Use `0.0.0.0` to accept connections from any network interface, or
    /// `127.0.0.1` to accept only local connections.
    #[arg(long, env = "PROJECTOR_WS_BIND")]
    ws_bind: Option<String>,

    /// TCP port for the WebSocket server.
    #[arg(long, env = "PROJECTOR_WS_PORT")]
    ws_port: Option<u16>,

    /// Host of the office suite's remote-control port.
    #[arg(long, env = "PROJECTOR_REMOTE_HOST")]
    remote_host: Option<String>,

    #[arg(long, env = "PROJECTOR_REMOTE_PORT")]
    remote_port: Option<u16>,

    /// Name the bridge pairs under.
    #[arg(long, env = "PROJECTOR_REMOTE_NAME")]
    remote_name: Option<String>,

    #[arg(long, env = "PROJECTOR_REMOTE_PIN")]
    remote_pin: Option<String>,

    /// Path or name of the LibreOffice binary.
    #[arg(long, env = "PROJECTOR_OFFICE_PATH")]
    office_path: Option<PathBuf>,

    #[arg(long, env = "PROJECTOR_MAX_SUBSCRIBERS")]
    max_subscribers: Option<usize>,

    /// Seconds the session survives without its owner.
    #[arg(long, env = "PROJECTOR_OWNER_TIMEOUT")]
    owner_timeout: Option<u64>,

    /// Delete the presentation file when the session ends.
    #[arg(long, env = "PROJECTOR_REMOVE_ON_EXIT")]
    remove_on_exit: bool,
}

impl Cli {
    /// Layers the CLI overrides on top of the file configuration.
    fn apply_overrides(&self, mut file: FileConfig) -> FileConfig {
        if let Some(bind) = &self.ws_bind {
            file.server.bind_address.clone_from(bind);
        }
        if let Some(port) = self.ws_port {
            file.server.port = port;
        }
        if let Some(path) = &self.office_path {
            file.server.office_path.clone_from(path);
        }
        if let Some(host) = &self.remote_host {
            file.remote.host.clone_from(host);
        }
        if let Some(port) = self.remote_port {
            file.remote.port = port;
        }
        if let Some(name) = &self.remote_name {
            file.remote.name.clone_from(name);
        }
        if let Some(pin) = &self.remote_pin {
            file.remote.pin.clone_from(pin);
        }
        if let Some(max) = self.max_subscribers {
            file.session.max_subscribers = max;
        }
        if let Some(secs) = self.owner_timeout {
            file.session.owner_timeout_secs = secs;
        }
        if self.remove_on_exit {
            file.session.remove_presentation_on_exit = true;
        }
        file
    }

    /// Resolves defaults, the config file and the CLI into a [`BridgeConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, if the
    /// WebSocket bind address is not a valid IP address, or if a timeout is
    /// out of range.
    fn resolve_config(&self) -> anyhow::Result<BridgeConfig> {
        let file = match &self.config {
            Some(path) => load_config(path).with_context(|| format!("failed to load {}", path.display()))?,
            None => FileConfig::default(),
        };
        self.apply_overrides(file)
            .into_bridge_config()
            .context("invalid configuration")
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    // `RUST_LOG` wins; otherwise the configured level applies.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .init();

    anyhow::ensure!(
        cli.presentation.is_file(),
        "presentation {} is not a readable file",
        cli.presentation.display()
    );

    info!(
        "projector bridge starting: ws={}, remote={}",
        config.ws_bind_addr, config.session.remote_addr
    );

    // ── Session ───────────────────────────────────────────────────────────────
    let launcher: Arc<dyn PresentationLauncher> = Arc::new(SofficeLauncher::new(config.office_path.clone()));
    let manager = Arc::new(SessionManager::new(launcher));
    let owner_token = manager
        .start_session(&cli.presentation, config.session.clone())
        .await
        .context("failed to start the presentation session")?;
    info!("owner token: {owner_token}");

    // ── WebSocket server ──────────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let mut server = tokio::spawn(run_server(
        config.ws_bind_addr,
        Arc::clone(&manager),
        Arc::clone(&running),
    ));

    let finished_server = tokio::select! {
        result = &mut server => Some(result),
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("received Ctrl+C; shutting down"),
                Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
            }
            None
        }
        () = manager.wait_terminated() => {
            info!("session ended; shutting down");
            None
        }
    };

    manager.terminate().await;
    running.store(false, Ordering::Relaxed);

    let result = match finished_server {
        Some(result) => result,
        None => server.await,
    };
    result.context("WebSocket server task failed")??;

    info!("projector bridge stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_presentation_is_required() {
        let result = Cli::try_parse_from(["projector-bridge"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_defaults_without_overrides() {
        // Arrange
        let cli = Cli::parse_from(["projector-bridge", "--presentation", "deck.odp"]);

        // Act
        let config = cli.resolve_config().unwrap();

        // Assert
        assert_eq!(cli.presentation, PathBuf::from("deck.odp"));
        assert_eq!(config.ws_bind_addr.port(), 8080);
        assert_eq!(config.session.remote_addr, "127.0.0.1:1599");
        assert_eq!(config.session.max_subscribers, 10);
        assert!(!config.session.remove_presentation_on_exit);
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "projector-bridge",
            "-p",
            "deck.odp",
            "--ws-port",
            "9000",
            "--remote-host",
            "10.0.0.5",
            "--remote-port",
            "2000",
            "--remote-pin",
            "0000",
            "--max-subscribers",
            "3",
            "--owner-timeout",
            "15",
            "--remove-on-exit",
        ]);

        let config = cli.resolve_config().unwrap();

        assert_eq!(config.ws_bind_addr.port(), 9000);
        assert_eq!(config.session.remote_addr, "10.0.0.5:2000");
        assert_eq!(config.session.remote_pin, "0000");
        assert_eq!(config.session.max_subscribers, 3);
        assert_eq!(config.session.owner_timeout, Duration::from_secs(15));
        assert!(config.session.remove_presentation_on_exit);
    }

    #[test]
    fn test_cli_wins_over_config_file() {
        // Arrange
        let path = std::env::temp_dir().join(format!("projector-main-{}.toml", std::process::id()));
        std::fs::write(&path, "[server]\nport = 7000\n\n[session]\nmax_subscribers = 4\n").unwrap();
        let config_arg = path.to_string_lossy().into_owned();
        let cli = Cli::parse_from([
            "projector-bridge",
            "-p",
            "deck.odp",
            "--config",
            config_arg.as_str(),
            "--max-subscribers",
            "6",
        ]);

        // Act
        let config = cli.resolve_config().unwrap();
        std::fs::remove_file(&path).unwrap();

        // Assert: file value kept where the CLI is silent
        assert_eq!(config.ws_bind_addr.port(), 7000);
        assert_eq!(config.session.max_subscribers, 6);
    }

    #[test]
    fn test_invalid_ws_bind_returns_error() {
        let cli = Cli::parse_from(["projector-bridge", "-p", "deck.odp", "--ws-bind", "not.an.ip"]);
        assert!(cli.resolve_config().is_err());
    }

    #[test]
    fn test_out_of_range_owner_timeout_returns_error() {
        let cli = Cli::parse_from([
            "projector-bridge",
            "-p",
            "deck.odp",
            "--owner-timeout",
            "18446744073709551615",
        ]);
        assert!(cli.resolve_config().is_err());
    }

    #[test]
    fn test_missing_config_file_returns_error() {
        let cli = Cli::parse_from([
            "projector-bridge",
            "-p",
            "deck.odp",
            "--config",
            "/nonexistent/projector/bridge.toml",
        ]);
        assert!(cli.resolve_config().is_err());
    }
}
