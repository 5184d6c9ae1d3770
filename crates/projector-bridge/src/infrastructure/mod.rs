//! Infrastructure layer for projector-bridge.
//!
//! The infrastructure layer handles all I/O: the office subprocess, the TCP
//! link to its remote-control port, and the WebSocket connections from
//! subscribers.
//!
//! # Responsibilities
//!
//! - Launching and stopping the presentation process
//! - Dialing, pairing with and reading from the remote-control port
//! - Binding the WebSocket listener and performing the upgrade handshake
//! - Running the per-subscriber read/write pumps
//! - Owning "the current session" for the rest of the program
//! - Reading the optional TOML configuration file
//!
//! # What does NOT belong here?
//!
//! - Session state and the rules that change it (that is the application layer)
//! - Message type definitions (that is the domain layer)

pub mod config_file;
pub mod presentation;
pub mod remote_link;
pub mod session_manager;
pub mod subscriber;
pub mod ws_server;

// Re-export the primary entry points so `main.rs` can call them concisely.
pub use config_file::{load_config, ConfigError, FileConfig};
pub use presentation::{PresentationLauncher, SofficeLauncher};
pub use session_manager::SessionManager;
pub use ws_server::{run_server, serve};
