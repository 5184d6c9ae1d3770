//! # projector-core
//!
//! Shared library for the presentation remote bridge containing the line-based
//! remote protocol codec, the typed protocol messages, and the slideshow status
//! automaton.
//!
//! It has zero dependencies on OS APIs, async runtimes, or network sockets.
//!
//! # Architecture overview (for beginners)
//!
//! A presentation application (LibreOffice Impress) runs as a local subprocess
//! and exposes a "remote control" port.  A remote speaks to it with small text
//! messages: every message is a handful of lines, one token per line, closed
//! by an empty line.  The bridge crate connects to that port once and shares
//! the slideshow with many browser viewers.
//!
//! This crate (`projector-core`) is the shared foundation.  It defines:
//!
//! - **`protocol`** – How bytes travel over the remote link.  Token groups are
//!   framed with line breaks and decoded into typed [`RemoteEvent`]s on the way
//!   in; typed [`RemoteCommand`]s are encoded on the way out.
//!
//! - **`domain`** – Pure business logic with no I/O.  The most important piece
//!   is [`PresentationStatus`]: the finite automaton that tracks where the
//!   slideshow is (idle, started on slide N of M, finished).

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `projector_core::RemoteEvent` instead of the full module path.
pub use domain::status::{PresentationStatus, StatusChange};
pub use protocol::codec::{decode_group, encode_group, ProtocolError};
pub use protocol::messages::{MessageGroup, RemoteCommand, RemoteEvent};
