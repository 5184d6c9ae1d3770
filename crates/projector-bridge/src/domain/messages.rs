//! JSON message types for the subscriber-facing WebSocket protocol.
//!
//! The presentation application speaks a line-based token protocol.  Web
//! clients speak JSON.  The bridge exposes a JSON shadow of the remote
//! protocol: subscribers send [`InboundFrame`]s and receive
//! [`OutboundFrame`]s.
//!
//! # Message flow
//!
//! ```text
//! Subscriber → Bridge:  JSON text frame  →  InboundFrame  →  RemoteCommand
//! Bridge → Subscriber:  RemoteEvent      →  OutboundFrame →  JSON text frame
//! ```
//!
//! # JSON discriminant
//!
//! Every event is a JSON object with a `"command"` field naming it, and the
//! remaining fields flattened into the same object:
//!
//! ```json
//! {"command":"slide_updated","currentSlide":3,"preview":"data:image/png;base64,..."}
//! ```
//!
//! Errors are the odd one out and carry only an `"error"` field.

use serde::{Deserialize, Serialize};

use projector_core::PresentationStatus;

/// Prefix turning the remote's raw base64 preview into a data URL.
pub const PREVIEW_DATA_URL_PREFIX: &str = "data:image/png;base64,";

// ── Subscriber → Bridge ───────────────────────────────────────────────────────

/// A raw request frame as sent by a subscriber.
///
/// Both fields are optional at this stage so that a missing key produces its
/// own error message instead of a generic parse failure.  Unknown keys are
/// rejected.
///
/// ```json
/// {"command":"goto_slide","index":"4"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InboundFrame {
    pub command: Option<String>,
    /// Slide index for `goto_slide`, as a decimal string.
    pub index: Option<String>,
}

// ── Bridge → Subscriber ───────────────────────────────────────────────────────

/// A slideshow event as presented to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "command")]
pub enum SubscriberEvent {
    /// The show has not started yet.  Only ever sent as a status snapshot.
    #[serde(rename = "slideshow_idle")]
    Idle,

    #[serde(rename = "slideshow_info")]
    Info { name: String },

    #[serde(rename = "slideshow_started", rename_all = "camelCase")]
    Started {
        total_slides: u32,
        current_slide: u32,
        /// `data:` URL of the current slide image.
        #[serde(skip_serializing_if = "Option::is_none")]
        preview: Option<String>,
    },

    #[serde(rename = "slide_updated", rename_all = "camelCase")]
    Updated {
        current_slide: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        preview: Option<String>,
    },

    #[serde(rename = "slideshow_finished")]
    Finished,
}

impl SubscriberEvent {
    /// The event a subscriber would need to reach `status` from scratch.
    pub fn from_status(status: &PresentationStatus, preview: Option<String>) -> Self {
        match *status {
            PresentationStatus::Idle => SubscriberEvent::Idle,
            PresentationStatus::Started {
                total_slides,
                current_slide,
            } => SubscriberEvent::Started {
                total_slides,
                current_slide,
                preview,
            },
            PresentationStatus::Finished => SubscriberEvent::Finished,
        }
    }
}

/// `{"error": "..."}` sent back to a single subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorFrame {
    pub error: String,
}

/// Everything the bridge writes to a subscriber connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OutboundFrame {
    Event(SubscriberEvent),
    Error(ErrorFrame),
    /// A remote group the bridge has no dedicated shape for, passed through
    /// as its tag plus raw payload tokens.
    Forwarded { command: String, payload: Vec<String> },
}

impl OutboundFrame {
    pub fn error(message: impl Into<String>) -> Self {
        OutboundFrame::Error(ErrorFrame {
            error: message.into(),
        })
    }

    /// Serializes the frame to the JSON text sent over the WebSocket.
    ///
    /// # Errors
    ///
    /// Propagates `serde_json` failures; none are expected for these shapes.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<SubscriberEvent> for OutboundFrame {
    fn from(event: SubscriberEvent) -> Self {
        OutboundFrame::Event(event)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
