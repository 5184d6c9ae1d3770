//! All remote presentation protocol message types.
//!
//! Every unit on the wire is a [`MessageGroup`]: an ordered list of string
//! tokens whose first token is a tag.  The bridge never passes raw groups
//! around past the link boundary; inbound groups are decoded once into
//! [`RemoteEvent`] and outbound requests are built from [`RemoteCommand`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::protocol::codec::{encode_group, ProtocolError};

// ── Wire tags ─────────────────────────────────────────────────────────────────

/// Tag tokens used on the remote link.
pub mod tags {
    /// Pairing request sent by the remote (us) right after connecting.
    pub const PAIR_WITH_SERVER: &str = "LO_SERVER_CLIENT_PAIR";
    /// Pairing accepted.
    pub const PAIRED: &str = "LO_SERVER_SERVER_PAIRED";
    /// The presentation application is still asking the user for the PIN.
    pub const VALIDATING: &str = "LO_SERVER_VALIDATING_PIN";

    pub const TRANSITION_NEXT: &str = "transition_next";
    pub const TRANSITION_PREVIOUS: &str = "transition_previous";
    pub const GO_TO_SLIDE: &str = "goto_slide";
    pub const PRESENTATION_BLANK_SCREEN: &str = "presentation_blank_screen";
    pub const PRESENTATION_RESUME: &str = "presentation_resume";
    pub const PRESENTATION_START: &str = "presentation_start";
    pub const PRESENTATION_STOP: &str = "presentation_stop";

    pub const SLIDE_SHOW_INFO: &str = "slideshow_info";
    pub const SLIDE_SHOW_STARTED: &str = "slideshow_started";
    pub const SLIDE_SHOW_FINISHED: &str = "slideshow_finished";
    pub const SLIDE_UPDATED: &str = "slide_updated";
}

// ── Message group ─────────────────────────────────────────────────────────────

/// One protocol unit: a tag followed by tag-dependent payload tokens.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessageGroup(Vec<String>);

impl MessageGroup {
    pub fn new(tokens: Vec<String>) -> Self {
        Self(tokens)
    }

    /// The first token, or `""` for an empty group.
    pub fn tag(&self) -> &str {
        self.0.first().map(String::as_str).unwrap_or("")
    }

    /// Every token after the tag.
    pub fn payload(&self) -> &[String] {
        self.0.get(1..).unwrap_or(&[])
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    pub fn into_tokens(self) -> Vec<String> {
        self.0
    }

    /// Encodes the group for the wire.
    ///
    /// # Errors
    ///
    /// See [`encode_group`].
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        encode_group(&self.0)
    }
}

impl<S: Into<String>> FromIterator<S> for MessageGroup {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

// ── Requests sent to the presentation application ─────────────────────────────

/// A request sent downstream to the presentation application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCommand {
    /// Pairing request carrying the remote's display name and PIN.
    Pair { name: String, pin: String },
    TransitionNext,
    TransitionPrevious,
    /// Jump to a slide by its index.
    GoToSlide(u64),
    BlankScreen,
    Resume,
    StartPresentation,
    /// Stops the slideshow.  Only the session owner may issue it, and the
    /// session terminates right after it is forwarded.
    StopPresentation,
}

impl RemoteCommand {
    /// The wire tag of this command.
    pub fn tag(&self) -> &'static str {
        match self {
            RemoteCommand::Pair { .. } => tags::PAIR_WITH_SERVER,
            RemoteCommand::TransitionNext => tags::TRANSITION_NEXT,
            RemoteCommand::TransitionPrevious => tags::TRANSITION_PREVIOUS,
            RemoteCommand::GoToSlide(_) => tags::GO_TO_SLIDE,
            RemoteCommand::BlankScreen => tags::PRESENTATION_BLANK_SCREEN,
            RemoteCommand::Resume => tags::PRESENTATION_RESUME,
            RemoteCommand::StartPresentation => tags::PRESENTATION_START,
            RemoteCommand::StopPresentation => tags::PRESENTATION_STOP,
        }
    }

    /// Whether the command is reserved to the session owner.
    pub fn is_privileged(&self) -> bool {
        matches!(self, RemoteCommand::StopPresentation)
    }

    /// Builds the token group for this command.
    pub fn to_group(&self) -> MessageGroup {
        let tag = self.tag().to_string();
        match self {
            RemoteCommand::Pair { name, pin } => MessageGroup::new(vec![tag, name.clone(), pin.clone()]),
            RemoteCommand::GoToSlide(index) => MessageGroup::new(vec![tag, index.to_string()]),
            _ => MessageGroup::new(vec![tag]),
        }
    }

    /// Encodes the command for the wire.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidToken`] if a pairing name or PIN
    /// contains a line break or is empty.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        self.to_group().encode()
    }
}

// ── Events received from the presentation application ─────────────────────────

/// An event received from the presentation application.
///
/// Decoded once from a [`MessageGroup`] at the link boundary.  Groups with an
/// unknown tag, or a known tag whose payload does not parse, are kept verbatim
/// as [`RemoteEvent::Unrecognized`] so they can still be forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteEvent {
    Paired,
    Validating,
    /// Display name of the loaded presentation.
    SlideShowInfo { name: String },
    SlideShowStarted {
        total_slides: u32,
        current_slide: u32,
        /// Base64-encoded PNG of the current slide, when supplied.
        preview: Option<String>,
    },
    SlideUpdated {
        current_slide: u32,
        preview: Option<String>,
    },
    SlideShowFinished,
    Unrecognized(MessageGroup),
}

impl RemoteEvent {
    /// Decodes a token group into a typed event.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use projector_core::protocol::messages::{MessageGroup, RemoteEvent};
    ///
    /// let group: MessageGroup = ["slide_updated", "3"].into_iter().collect();
    /// assert_eq!(
    ///     RemoteEvent::from_group(group),
    ///     RemoteEvent::SlideUpdated { current_slide: 3, preview: None }
    /// );
    /// ```
    pub fn from_group(group: MessageGroup) -> Self {
        let parsed = {
            let payload = group.payload();
            match group.tag() {
                tags::PAIRED => Some(RemoteEvent::Paired),
                tags::VALIDATING => Some(RemoteEvent::Validating),
                tags::SLIDE_SHOW_FINISHED => Some(RemoteEvent::SlideShowFinished),
                tags::SLIDE_SHOW_INFO => match payload {
                    [name] => Some(RemoteEvent::SlideShowInfo { name: name.clone() }),
                    _ => None,
                },
                tags::SLIDE_SHOW_STARTED => match payload {
                    [total, current, rest @ ..] if rest.len() <= 1 => {
                        match (total.parse(), current.parse()) {
                            (Ok(total_slides), Ok(current_slide)) => {
                                Some(RemoteEvent::SlideShowStarted {
                                    total_slides,
                                    current_slide,
                                    preview: rest.first().cloned(),
                                })
                            }
                            _ => None,
                        }
                    }
                    _ => None,
                },
                tags::SLIDE_UPDATED => match payload {
                    [current, rest @ ..] if rest.len() <= 1 => {
                        current.parse().ok().map(|current_slide| RemoteEvent::SlideUpdated {
                            current_slide,
                            preview: rest.first().cloned(),
                        })
                    }
                    _ => None,
                },
                _ => None,
            }
        };

        parsed.unwrap_or_else(|| {
            debug!(tag = group.tag(), tokens = group.tokens().len(), "unrecognized remote group");
            RemoteEvent::Unrecognized(group)
        })
    }

    /// The wire tag this event was decoded from.
    pub fn tag(&self) -> &str {
        match self {
            RemoteEvent::Paired => tags::PAIRED,
            RemoteEvent::Validating => tags::VALIDATING,
            RemoteEvent::SlideShowInfo { .. } => tags::SLIDE_SHOW_INFO,
            RemoteEvent::SlideShowStarted { .. } => tags::SLIDE_SHOW_STARTED,
            RemoteEvent::SlideUpdated { .. } => tags::SLIDE_UPDATED,
            RemoteEvent::SlideShowFinished => tags::SLIDE_SHOW_FINISHED,
            RemoteEvent::Unrecognized(group) => group.tag(),
        }
    }

    /// The preview image carried by this event, if any.
    pub fn preview(&self) -> Option<&str> {
        match self {
            RemoteEvent::SlideShowStarted { preview, .. } | RemoteEvent::SlideUpdated { preview, .. } => {
                preview.as_deref()
            }
            _ => None,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
