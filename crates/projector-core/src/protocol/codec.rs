//! Line codec for encoding and decoding remote protocol token groups.
//!
//! Wire format:
//! ```text
//! token_1\n
//! token_2\n
//! ...
//! token_n\n
//! \n            <- the blank line closes the group
//! ```
//! Tokens are UTF-8.  A `\r` immediately before a `\n` is tolerated on input
//! and stripped, because the remote side may use CRLF line endings.

use thiserror::Error;

use crate::protocol::messages::MessageGroup;

/// Separator between tokens; two in a row terminate a group.
pub const LINE_SEPARATOR: u8 = b'\n';

/// Errors that can occur during group encoding or decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// No group terminator has been received yet.
    ///
    /// This is not a failure of the stream: the caller should read more bytes
    /// and try again.
    #[error("insufficient data: {buffered} byte(s) buffered without a group terminator")]
    InsufficientData { buffered: usize },

    /// The stream ended or failed before a terminator, or a line was not UTF-8.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// A token cannot be framed (it is empty or contains a line break).
    #[error("invalid token {0:?}: tokens must be non-empty and free of line breaks")]
    InvalidToken(String),

    /// A group must carry at least its tag.
    #[error("cannot encode an empty group")]
    EmptyGroup,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes one token group: tokens joined by line breaks plus a closing blank line.
///
/// # Errors
///
/// Returns [`ProtocolError::EmptyGroup`] for an empty slice and
/// [`ProtocolError::InvalidToken`] for a token that would break framing.
///
/// # Examples
///
/// ```rust
/// use projector_core::protocol::encode_group;
///
/// let bytes = encode_group(&["goto_slide", "4"]).unwrap();
/// assert_eq!(bytes, b"goto_slide\n4\n\n");
/// ```
pub fn encode_group<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<u8>, ProtocolError> {
    if tokens.is_empty() {
        return Err(ProtocolError::EmptyGroup);
    }

    let capacity = tokens.iter().map(|t| t.as_ref().len() + 1).sum::<usize>() + 1;
    let mut buf = Vec::with_capacity(capacity);

    for token in tokens {
        let token = token.as_ref();
        if token.is_empty() || token.contains(|c: char| c == '\n' || c == '\r') {
            return Err(ProtocolError::InvalidToken(token.to_string()));
        }
        buf.extend_from_slice(token.as_bytes());
        buf.push(LINE_SEPARATOR);
    }
    buf.push(LINE_SEPARATOR);
    Ok(buf)
}

/// Decodes one [`MessageGroup`] from the beginning of `bytes`.
///
/// Returns the decoded group and the number of bytes consumed (tokens, line
/// breaks and the terminating blank line), so the caller can drain them from
/// its receive buffer.  Blank lines in front of the first token are consumed
/// as part of the group; they never produce an empty group.
///
/// # Errors
///
/// - [`ProtocolError::InsufficientData`] when the terminator has not arrived.
/// - [`ProtocolError::MalformedFrame`] when a line is not valid UTF-8.
///
/// # Examples
///
/// ```rust
/// use projector_core::protocol::decode_group;
///
/// let (group, used) = decode_group(b"slide_updated\n3\n\nrest").unwrap();
/// assert_eq!(group.tag(), "slide_updated");
/// assert_eq!(group.payload(), ["3".to_string()]);
/// assert_eq!(used, 17);
/// ```
pub fn decode_group(bytes: &[u8]) -> Result<(MessageGroup, usize), ProtocolError> {
    let mut tokens = Vec::new();
    let mut cursor = 0;

    loop {
        let Some(offset) = bytes[cursor..].iter().position(|b| *b == LINE_SEPARATOR) else {
            return Err(ProtocolError::InsufficientData {
                buffered: bytes.len(),
            });
        };

        let mut line = &bytes[cursor..cursor + offset];
        cursor += offset + 1;

        if let [head @ .., b'\r'] = line {
            line = head;
        }

        if line.is_empty() {
            if tokens.is_empty() {
                continue;
            }
            return Ok((MessageGroup::new(tokens), cursor));
        }

        let token = std::str::from_utf8(line)
            .map_err(|e| ProtocolError::MalformedFrame(format!("token is not UTF-8: {e}")))?;
        tokens.push(token.to_string());
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
