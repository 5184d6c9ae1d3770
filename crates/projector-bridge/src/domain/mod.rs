//! Domain layer for projector-bridge.
//!
//! The domain layer contains pure types that have no dependencies on I/O,
//! networking, or async runtimes.
//!
//! # What belongs in the domain layer?
//!
//! - The JSON "language" between subscribers and the bridge
//! - Configuration structures
//! - The session stats snapshot
//!
//! # What does NOT belong here?
//!
//! - Any `tokio`, `TcpStream`, or `WebSocket` types
//! - File I/O or environment variable reading

pub mod config;
pub mod messages;
pub mod stats;

pub use config::{BridgeConfig, ConnectPolicy, SessionConfig};
pub use messages::{ErrorFrame, InboundFrame, OutboundFrame, SubscriberEvent};
pub use stats::SessionStats;
