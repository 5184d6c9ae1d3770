//! Optional TOML configuration file for the bridge.
//!
//! Every key is optional; missing keys fall back to the same defaults as
//! [`BridgeConfig::default`].  Example:
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0"
//! port = 8080
//! office_path = "/usr/bin/soffice"
//!
//! [session]
//! max_subscribers = 10
//! owner_timeout_secs = 60
//!
//! [remote]
//! host = "127.0.0.1"
//! port = 1599
//! name = "Remote"
//! pin = "12345"
//!
//! [subscriber]
//! heartbeat_timeout_secs = 60
//! read_limit = 1024
//! ```
//!
//! # Serde default values (for beginners)
//!
//! `#[serde(default = "some_fn")]` makes serde call `some_fn()` when the key
//! is absent, so a file only needs the keys it wants to change.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::config::{
    heartbeat_interval_for, BridgeConfig, ConnectPolicy, SessionConfig, DEFAULT_CONNECT_ATTEMPTS,
    DEFAULT_REMOTE_PORT,
};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("{key} = {value} is out of range ({min}..={max} seconds)")]
    OutOfRange {
        key: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
}

/// Upper bound for every timeout and delay: one week.
pub const MAX_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;

// ── Schema ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub remote: RemoteSection,
    #[serde(default)]
    pub subscriber: SubscriberSection,
}

/// Where the WebSocket server listens and what it launches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_ws_port")]
    pub port: u16,
    #[serde(default = "default_office_path")]
    pub office_path: PathBuf,
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SessionSection {
    #[serde(default = "default_max_subscribers")]
    pub max_subscribers: usize,
    #[serde(default = "default_owner_timeout_secs")]
    pub owner_timeout_secs: u64,
    #[serde(default)]
    pub remove_presentation_on_exit: bool,
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,
    #[serde(default = "default_delivery_timeout_secs")]
    pub delivery_timeout_secs: u64,
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,
}

/// The presentation application's remote-control endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RemoteSection {
    #[serde(default = "default_remote_host")]
    pub host: String,
    #[serde(default = "default_remote_port")]
    pub port: u16,
    #[serde(default = "default_remote_name")]
    pub name: String,
    #[serde(default = "default_remote_pin")]
    pub pin: String,
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
    #[serde(default = "default_connect_backoff_secs")]
    pub connect_backoff_secs: u64,
    /// Absent means the platform default (5 s on macOS, none elsewhere).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settle_delay_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SubscriberSection {
    #[serde(default = "default_heartbeat_timeout_secs")]
    pub heartbeat_timeout_secs: u64,
    /// Absent means 9/10 of the timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heartbeat_interval_secs: Option<u64>,
    #[serde(default = "default_write_timeout_secs")]
    pub write_timeout_secs: u64,
    #[serde(default = "default_read_limit")]
    pub read_limit: usize,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_ws_port() -> u16 {
    8080
}
fn default_office_path() -> PathBuf {
    PathBuf::from("soffice")
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_subscribers() -> usize {
    10
}
fn default_owner_timeout_secs() -> u64 {
    60
}
fn default_outbound_queue_capacity() -> usize {
    32
}
fn default_delivery_timeout_secs() -> u64 {
    5
}
fn default_mailbox_capacity() -> usize {
    64
}
fn default_remote_host() -> String {
    "127.0.0.1".to_string()
}
fn default_remote_port() -> u16 {
    DEFAULT_REMOTE_PORT
}
fn default_remote_name() -> String {
    "Remote".to_string()
}
fn default_remote_pin() -> String {
    "12345".to_string()
}
fn default_connect_attempts() -> u32 {
    DEFAULT_CONNECT_ATTEMPTS
}
fn default_connect_backoff_secs() -> u64 {
    3
}
fn default_heartbeat_timeout_secs() -> u64 {
    60
}
fn default_write_timeout_secs() -> u64 {
    10
}
fn default_read_limit() -> usize {
    1024
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_ws_port(),
            office_path: default_office_path(),
            log_level: default_log_level(),
        }
    }
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            max_subscribers: default_max_subscribers(),
            owner_timeout_secs: default_owner_timeout_secs(),
            remove_presentation_on_exit: false,
            outbound_queue_capacity: default_outbound_queue_capacity(),
            delivery_timeout_secs: default_delivery_timeout_secs(),
            mailbox_capacity: default_mailbox_capacity(),
        }
    }
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            host: default_remote_host(),
            port: default_remote_port(),
            name: default_remote_name(),
            pin: default_remote_pin(),
            connect_attempts: default_connect_attempts(),
            connect_backoff_secs: default_connect_backoff_secs(),
            settle_delay_secs: None,
        }
    }
}

impl Default for SubscriberSection {
    fn default() -> Self {
        Self {
            heartbeat_timeout_secs: default_heartbeat_timeout_secs(),
            heartbeat_interval_secs: None,
            write_timeout_secs: default_write_timeout_secs(),
            read_limit: default_read_limit(),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Reads and parses the file at `path`.
///
/// # Errors
///
/// [`ConfigError::Io`] when the file cannot be read, [`ConfigError::Parse`]
/// for malformed TOML or unknown keys.
pub fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Joins a host and port, bracketing bare IPv6 hosts.
pub fn host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

impl FileConfig {
    /// Resolves the file into runtime configuration.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidAddress`] when `server.bind_address` is not an
    ///   IP address.
    /// - [`ConfigError::OutOfRange`] when a timeout or delay exceeds
    ///   [`MAX_TIMEOUT_SECS`], or is zero where zero would stall the session.
    pub fn into_bridge_config(self) -> Result<BridgeConfig, ConfigError> {
        let bind = host_port(&self.server.bind_address, self.server.port);
        let ws_bind_addr: SocketAddr = bind.parse().map_err(|_| ConfigError::InvalidAddress(bind))?;

        let default_connect = ConnectPolicy::default();
        let connect = ConnectPolicy {
            attempts: self.remote.connect_attempts,
            backoff: bounded_secs("remote.connect_backoff_secs", self.remote.connect_backoff_secs, 0)?,
            settle_delay: match self.remote.settle_delay_secs {
                Some(secs) => bounded_secs("remote.settle_delay_secs", secs, 0)?,
                None => default_connect.settle_delay,
            },
        };

        let heartbeat_timeout = bounded_secs(
            "subscriber.heartbeat_timeout_secs",
            self.subscriber.heartbeat_timeout_secs,
            1,
        )?;
        let heartbeat_interval = match self.subscriber.heartbeat_interval_secs {
            Some(secs) => bounded_secs("subscriber.heartbeat_interval_secs", secs, 1)?,
            None => heartbeat_interval_for(heartbeat_timeout),
        };
        let owner_timeout = bounded_secs("session.owner_timeout_secs", self.session.owner_timeout_secs, 1)?;
        let write_timeout = bounded_secs("subscriber.write_timeout_secs", self.subscriber.write_timeout_secs, 1)?;
        let delivery_timeout = bounded_secs(
            "session.delivery_timeout_secs",
            self.session.delivery_timeout_secs,
            1,
        )?;

        Ok(BridgeConfig {
            ws_bind_addr,
            office_path: self.server.office_path,
            log_level: self.server.log_level,
            session: SessionConfig {
                max_subscribers: self.session.max_subscribers,
                owner_timeout,
                remote_addr: host_port(&self.remote.host, self.remote.port),
                remote_name: self.remote.name,
                remote_pin: self.remote.pin,
                connect,
                heartbeat_interval,
                heartbeat_timeout,
                write_timeout,
                read_limit: self.subscriber.read_limit,
                outbound_queue_capacity: self.session.outbound_queue_capacity,
                delivery_timeout,
                mailbox_capacity: self.session.mailbox_capacity,
                remove_presentation_on_exit: self.session.remove_presentation_on_exit,
            },
        })
    }
}

fn bounded_secs(key: &'static str, value: u64, min: u64) -> Result<Duration, ConfigError> {
    if (min..=MAX_TIMEOUT_SECS).contains(&value) {
        Ok(Duration::from_secs(value))
    } else {
        Err(ConfigError::OutOfRange {
            key,
            value,
            min,
            max: MAX_TIMEOUT_SECS,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
