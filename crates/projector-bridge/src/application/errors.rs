//! Error types for the bridge's application layer.
//!
//! - [`CommandError`] – a subscriber frame was rejected.  Recovered locally:
//!   its `Display` text is sent back on that connection as `{"error": ...}`.
//! - [`LinkError`] – the remote link could not be opened, paired, read or
//!   written.
//! - [`SessionError`] – a session-level operation failed.  This is what the
//!   collaborator contract (`SessionManager`) returns to its callers.

use std::path::PathBuf;

use thiserror::Error;

use projector_core::ProtocolError;

/// Why a subscriber frame was not forwarded.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Malformed JSON syntax")]
    MalformedJson,

    #[error("command key not found")]
    MissingCommand,

    #[error("command not recognized")]
    UnknownCommand,

    #[error("index key required")]
    MissingIndex,

    #[error("index value not a number or less than 0")]
    InvalidIndex,

    #[error("Only the owner can terminate the session")]
    NotOwner,

    #[error("Message exceeds {limit} bytes")]
    FrameTooLarge { limit: usize },

    #[error("Only text frames are accepted")]
    UnsupportedFrame,
}

/// Failures of the connection to the presentation application.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("could not reach remote at {addr} after {attempts} attempt(s): {source}")]
    Connect {
        addr: String,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    /// The application is still waiting for the PIN to be confirmed.
    #[error("remote server not authorised: pairing PIN was not accepted")]
    AuthRejected,

    #[error("failed connection handshake: unexpected reply {0:?}")]
    UnexpectedReply(String),

    #[error("remote protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("read from remote failed: {0}")]
    Read(#[source] std::io::Error),

    #[error("write to remote failed: {0}")]
    Write(#[source] std::io::Error),

    #[error("remote link closed")]
    Closed,
}

/// Errors surfaced by session-level operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Slideshow already running")]
    AlreadyRunning,

    #[error("Slideshow not running")]
    NotRunning,

    #[error("Slideshow has reached the maximum number of controllers")]
    CapacityExceeded,

    /// The session terminated while the request was in flight.
    #[error("session terminated")]
    SessionTerminated,

    #[error("failed to launch presentation with {program}: {source}")]
    Launch {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Link(#[from] LinkError),
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_messages_are_frame_texts() {
        assert_eq!(CommandError::MalformedJson.to_string(), "Malformed JSON syntax");
        assert_eq!(CommandError::MissingCommand.to_string(), "command key not found");
        assert_eq!(
            CommandError::InvalidIndex.to_string(),
            "index value not a number or less than 0"
        );
        assert_eq!(
            CommandError::FrameTooLarge { limit: 1024 }.to_string(),
            "Message exceeds 1024 bytes"
        );
    }

    #[test]
    fn test_session_error_messages() {
        assert_eq!(SessionError::NotRunning.to_string(), "Slideshow not running");
        assert_eq!(
            SessionError::CapacityExceeded.to_string(),
            "Slideshow has reached the maximum number of controllers"
        );
    }

    #[test]
    fn test_link_error_converts_into_session_error() {
        let err: SessionError = LinkError::AuthRejected.into();
        assert!(matches!(err, SessionError::Link(LinkError::AuthRejected)));
        assert!(err.to_string().contains("not authorised"));
    }
}
