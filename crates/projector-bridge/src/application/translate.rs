//! Translation between subscriber JSON and the typed remote protocol.
//!
//! Pure functions only: no I/O, no async.
//!
//! ```text
//! Subscriber → Remote:  &str → InboundFrame → RemoteCommand
//!                       call: decode_subscriber_frame() then authorize()
//!
//! Remote → Subscriber:  RemoteEvent → OutboundFrame
//!                       call: event_frame(), or snapshot_frame() for joiners
//! ```

use projector_core::protocol::messages::tags;
use projector_core::{PresentationStatus, RemoteCommand, RemoteEvent};

use crate::application::errors::CommandError;
use crate::domain::messages::{InboundFrame, OutboundFrame, SubscriberEvent, PREVIEW_DATA_URL_PREFIX};

// ── Subscriber → Remote ───────────────────────────────────────────────────────

/// Parses and validates one subscriber text frame.
///
/// Frames longer than `read_limit` bytes are rejected before parsing.
///
/// # Errors
///
/// Returns the [`CommandError`] whose message is sent back to the subscriber.
///
/// # Example
///
/// ```rust
/// use projector_bridge::application::translate::decode_subscriber_frame;
/// use projector_core::RemoteCommand;
///
/// let cmd = decode_subscriber_frame(r#"{"command":"goto_slide","index":"2"}"#, 1024).unwrap();
/// assert_eq!(cmd, RemoteCommand::GoToSlide(2));
/// ```
pub fn decode_subscriber_frame(text: &str, read_limit: usize) -> Result<RemoteCommand, CommandError> {
    if text.len() > read_limit {
        return Err(CommandError::FrameTooLarge { limit: read_limit });
    }
    let frame: InboundFrame = serde_json::from_str(text).map_err(|_| CommandError::MalformedJson)?;
    validate_frame(frame)
}

/// Checks a parsed frame against the allow-list of subscriber commands.
///
/// Pairing is never accepted from subscribers; it is the bridge's own
/// handshake request.
///
/// # Errors
///
/// See [`CommandError`].
pub fn validate_frame(frame: InboundFrame) -> Result<RemoteCommand, CommandError> {
    let command = frame.command.ok_or(CommandError::MissingCommand)?;

    match command.as_str() {
        tags::TRANSITION_NEXT => Ok(RemoteCommand::TransitionNext),
        tags::TRANSITION_PREVIOUS => Ok(RemoteCommand::TransitionPrevious),
        tags::PRESENTATION_BLANK_SCREEN => Ok(RemoteCommand::BlankScreen),
        tags::PRESENTATION_RESUME => Ok(RemoteCommand::Resume),
        tags::PRESENTATION_START => Ok(RemoteCommand::StartPresentation),
        tags::PRESENTATION_STOP => Ok(RemoteCommand::StopPresentation),
        tags::GO_TO_SLIDE => {
            let index = frame.index.ok_or(CommandError::MissingIndex)?;
            // Any signed decimal integer parses; "-0" is zero.
            let index: i64 = index.parse().map_err(|_| CommandError::InvalidIndex)?;
            let index = u64::try_from(index).map_err(|_| CommandError::InvalidIndex)?;
            Ok(RemoteCommand::GoToSlide(index))
        }
        _ => Err(CommandError::UnknownCommand),
    }
}

/// Rejects privileged commands from subscribers that are not the owner.
///
/// # Errors
///
/// Returns [`CommandError::NotOwner`] for a privileged command from a
/// non-owner.
pub fn authorize(command: RemoteCommand, is_owner: bool) -> Result<RemoteCommand, CommandError> {
    if command.is_privileged() && !is_owner {
        return Err(CommandError::NotOwner);
    }
    Ok(command)
}

// ── Remote → Subscriber ───────────────────────────────────────────────────────

/// Builds the frame broadcast to subscribers for one remote event.
pub fn event_frame(event: &RemoteEvent) -> OutboundFrame {
    match event {
        RemoteEvent::SlideShowInfo { name } => SubscriberEvent::Info { name: name.clone() }.into(),
        RemoteEvent::SlideShowStarted {
            total_slides,
            current_slide,
            preview,
        } => SubscriberEvent::Started {
            total_slides: *total_slides,
            current_slide: *current_slide,
            preview: preview.as_deref().map(preview_url),
        }
        .into(),
        RemoteEvent::SlideUpdated { current_slide, preview } => SubscriberEvent::Updated {
            current_slide: *current_slide,
            preview: preview.as_deref().map(preview_url),
        }
        .into(),
        RemoteEvent::SlideShowFinished => SubscriberEvent::Finished.into(),
        RemoteEvent::Unrecognized(group) => OutboundFrame::Forwarded {
            command: group.tag().to_string(),
            payload: group.payload().to_vec(),
        },
        RemoteEvent::Paired | RemoteEvent::Validating => OutboundFrame::Forwarded {
            command: event.tag().to_string(),
            payload: Vec::new(),
        },
    }
}

/// Builds the status snapshot a newly registered subscriber receives first.
///
/// `preview` is the raw base64 image of the current slide, if known.
pub fn snapshot_frame(status: &PresentationStatus, preview: Option<&str>) -> OutboundFrame {
    SubscriberEvent::from_status(status, preview.map(preview_url)).into()
}

fn preview_url(raw: &str) -> String {
    format!("{PREVIEW_DATA_URL_PREFIX}{raw}")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
