//! projector-bridge library crate.
//!
//! Runs one presentation in LibreOffice Impress and lets many WebSocket
//! subscribers follow and control it.  One subscriber, the owner, may also
//! stop it.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Browsers (JSON over WebSocket)
//!         ↕
//! [projector-bridge]
//!   ├── domain/           Pure types: subscriber JSON, config, stats
//!   ├── application/      Session actor, owner timer, JSON ↔ remote translation
//!   └── infrastructure/
//!         ├── ws_server/       WebSocket accept loop (tokio-tungstenite)
//!         ├── subscriber/      Per-connection read/write pumps
//!         ├── session_manager/ Start / stats / admit / terminate
//!         ├── remote_link/     TCP link to the office remote port
//!         ├── presentation/    soffice subprocess
//!         └── config_file/     Optional TOML config
//!         ↕
//! LibreOffice Impress (line-based remote protocol over TCP)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and `projector-core`; it reaches I/O
//!   only through the `RemoteSink` and `PresentationProcess` traits.
//! - `infrastructure` depends on all other layers plus `tokio` and `tungstenite`.
//!
//! # For beginners: why this structure?
//!
//! The session rules (who may stop the show, when the owner has been gone
//! too long, what a late joiner sees first) live in a single actor that never
//! touches a socket.  That makes them testable with paused time and a few
//! recording fakes, without LibreOffice or a browser.

/// Domain layer: pure types (no I/O).
pub mod domain;

/// Application layer: session actor and message translation.
pub mod application;

/// Infrastructure layer: processes, sockets and configuration files.
pub mod infrastructure;
