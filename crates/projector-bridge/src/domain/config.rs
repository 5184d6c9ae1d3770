//! Bridge and session configuration types.
//!
//! [`BridgeConfig`] is the single source of truth for all runtime settings.
//! It is built once at startup from defaults, an optional TOML file and the
//! command line (see `main.rs`), then handed to the layers that need it.
//!
//! [`SessionConfig`] is the part that travels with one presentation session:
//! capacity and owner policy, how to reach the presentation application's
//! remote port, and the per-subscriber heartbeat and queue limits.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Number of dial attempts before the remote is declared unreachable.
pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 5;
/// Pause between two dial attempts.
pub const DEFAULT_CONNECT_BACKOFF: Duration = Duration::from_secs(3);
/// Remote-control port LibreOffice Impress listens on.
pub const DEFAULT_REMOTE_PORT: u16 = 1599;
/// How long a subscriber may stay silent (no pong) before it is dropped.
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(60);

/// How the bridge dials the presentation application's remote port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectPolicy {
    /// Total dial attempts, including the first one.
    pub attempts: u32,
    /// Pause between failed attempts.
    pub backoff: Duration,
    /// Extra pause after a successful dial before pairing.
    ///
    /// On macOS the office suite accepts the TCP connection before its remote
    /// server is ready to pair, so the default there is 5 seconds.
    pub settle_delay: Duration,
}

impl Default for ConnectPolicy {
    fn default() -> Self {
        let settle_delay = if cfg!(target_os = "macos") {
            Duration::from_secs(5)
        } else {
            Duration::ZERO
        };
        Self {
            attempts: DEFAULT_CONNECT_ATTEMPTS,
            backoff: DEFAULT_CONNECT_BACKOFF,
            settle_delay,
        }
    }
}

/// Settings for one presentation session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Maximum number of simultaneously registered subscribers.
    pub max_subscribers: usize,
    /// How long the session survives without its owner before terminating.
    pub owner_timeout: Duration,
    /// `host:port` of the presentation application's remote port.
    pub remote_addr: String,
    /// Display name sent when pairing.
    pub remote_name: String,
    /// PIN sent when pairing.
    pub remote_pin: String,
    pub connect: ConnectPolicy,
    /// Interval between WebSocket pings sent to each subscriber.
    pub heartbeat_interval: Duration,
    /// A subscriber that does not answer a ping within this window is dropped.
    pub heartbeat_timeout: Duration,
    /// Upper bound for a single WebSocket write.
    pub write_timeout: Duration,
    /// Largest inbound subscriber frame, in bytes.
    pub read_limit: usize,
    /// Capacity of each subscriber's outbound queue.
    pub outbound_queue_capacity: usize,
    /// How long the session waits on a full subscriber queue before evicting it.
    pub delivery_timeout: Duration,
    /// Capacity of the session mailbox.
    pub mailbox_capacity: usize,
    /// Delete the presentation file once the session terminates.
    pub remove_presentation_on_exit: bool,
}

impl Default for SessionConfig {
    /// | Field                       | Default           |
    /// |-----------------------------|-------------------|
    /// | max_subscribers             | 10                |
    /// | owner_timeout               | 60 seconds        |
    /// | remote_addr                 | `127.0.0.1:1599`  |
    /// | remote_name / remote_pin    | `Remote` / `12345`|
    /// | heartbeat_interval          | 54 seconds        |
    /// | heartbeat_timeout           | 60 seconds        |
    /// | write_timeout               | 10 seconds        |
    /// | read_limit                  | 1024 bytes        |
    /// | outbound_queue_capacity     | 32                |
    /// | delivery_timeout            | 5 seconds         |
    fn default() -> Self {
        Self {
            max_subscribers: 10,
            owner_timeout: Duration::from_secs(60),
            remote_addr: format!("{}:{}", Ipv4Addr::LOCALHOST, DEFAULT_REMOTE_PORT),
            remote_name: "Remote".to_string(),
            remote_pin: "12345".to_string(),
            connect: ConnectPolicy::default(),
            heartbeat_interval: heartbeat_interval_for(DEFAULT_HEARTBEAT_TIMEOUT),
            heartbeat_timeout: DEFAULT_HEARTBEAT_TIMEOUT,
            write_timeout: Duration::from_secs(10),
            read_limit: 1024,
            outbound_queue_capacity: 32,
            delivery_timeout: Duration::from_secs(5),
            mailbox_capacity: 64,
            remove_presentation_on_exit: false,
        }
    }
}

/// Pings go out at 9/10 of the timeout so a healthy peer always answers in time.
pub fn heartbeat_interval_for(timeout: Duration) -> Duration {
    timeout / 10 * 9
}

/// All runtime configuration for the bridge process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// The address and port the WebSocket server binds to.
    pub ws_bind_addr: SocketAddr,
    /// Path or name of the LibreOffice binary.
    pub office_path: PathBuf,
    /// Fallback `tracing` filter when `RUST_LOG` is unset.
    pub log_level: String,
    pub session: SessionConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            ws_bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080)),
            office_path: PathBuf::from("soffice"),
            log_level: "info".to_string(),
            session: SessionConfig::default(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_session_limits() {
        // Arrange / Act
        let cfg = SessionConfig::default();

        // Assert
        assert_eq!(cfg.max_subscribers, 10);
        assert_eq!(cfg.owner_timeout, Duration::from_secs(60));
        assert_eq!(cfg.read_limit, 1024);
        assert_eq!(cfg.outbound_queue_capacity, 32);
    }

    #[test]
    fn test_default_remote_endpoint_and_pairing() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.remote_addr, "127.0.0.1:1599");
        assert_eq!(cfg.remote_name, "Remote");
        assert_eq!(cfg.remote_pin, "12345");
    }

    #[test]
    fn test_heartbeat_interval_is_nine_tenths_of_timeout() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.heartbeat_interval, Duration::from_secs(54));
        assert_eq!(heartbeat_interval_for(Duration::from_secs(10)), Duration::from_secs(9));
    }

    #[test]
    fn test_heartbeat_interval_for_huge_timeout_does_not_overflow() {
        let interval = heartbeat_interval_for(Duration::from_secs(u64::MAX));
        assert!(interval < Duration::from_secs(u64::MAX));
        assert!(interval > Duration::from_secs(u64::MAX / 2));
    }

    #[test]
    fn test_default_connect_policy() {
        let policy = ConnectPolicy::default();
        assert_eq!(policy.attempts, 5);
        assert_eq!(policy.backoff, Duration::from_secs(3));
    }

    #[test]
    fn test_default_bridge_binds_all_interfaces_on_8080() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.ws_bind_addr.port(), 8080);
        assert!(cfg.ws_bind_addr.ip().is_unspecified());
        assert_eq!(cfg.office_path, PathBuf::from("soffice"));
    }
}
