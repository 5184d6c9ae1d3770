//! Slideshow status automaton.
//!
//! ```text
//!            SLIDE_SHOW_STARTED            SLIDE_SHOW_FINISHED
//!   Idle ─────────────────────▶ Started ──────────────────────▶ Finished
//!     │                          │    ▲                            ▲
//!     │                          └────┘ SLIDE_UPDATED              │
//!     └────────────────────────────────────────────────────────────┘
//! ```
//!
//! `Finished` is terminal.  Events that carry no status information
//! (pairing, info, unrecognized groups) leave the status untouched.

use crate::protocol::messages::RemoteEvent;

/// Where the slideshow currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresentationStatus {
    /// The presentation is loaded but the show has not started.
    #[default]
    Idle,
    /// The show is running.
    Started { total_slides: u32, current_slide: u32 },
    /// The show ended.  No further transitions happen.
    Finished,
}

/// The outcome of feeding one event to [`PresentationStatus::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    Unchanged,
    Started,
    SlideChanged,
    Finished,
}

impl PresentationStatus {
    /// Advances the automaton by one remote event.
    ///
    /// A `SLIDE_SHOW_STARTED` received while already started restarts the
    /// show with the new counts.  A `SLIDE_UPDATED` received while not started
    /// carries no slide total and is ignored.
    pub fn apply(&mut self, event: &RemoteEvent) -> StatusChange {
        if self.is_finished() {
            return StatusChange::Unchanged;
        }

        match (*self, event) {
            (
                _,
                RemoteEvent::SlideShowStarted {
                    total_slides,
                    current_slide,
                    ..
                },
            ) => {
                *self = PresentationStatus::Started {
                    total_slides: *total_slides,
                    current_slide: *current_slide,
                };
                StatusChange::Started
            }
            (PresentationStatus::Started { total_slides, .. }, RemoteEvent::SlideUpdated { current_slide, .. }) => {
                *self = PresentationStatus::Started {
                    total_slides,
                    current_slide: *current_slide,
                };
                StatusChange::SlideChanged
            }
            (_, RemoteEvent::SlideShowFinished) => {
                *self = PresentationStatus::Finished;
                StatusChange::Finished
            }
            _ => StatusChange::Unchanged,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, PresentationStatus::Finished)
    }

    /// Short lowercase name used in logs and stats.
    pub fn as_str(&self) -> &'static str {
        match self {
            PresentationStatus::Idle => "idle",
            PresentationStatus::Started { .. } => "started",
            PresentationStatus::Finished => "finished",
        }
    }
}

impl std::fmt::Display for PresentationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PresentationStatus::Started {
                total_slides,
                current_slide,
            } => write!(f, "started ({current_slide}/{total_slides})"),
            other => f.write_str(other.as_str()),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::MessageGroup;

    fn started(total_slides: u32, current_slide: u32) -> RemoteEvent {
        RemoteEvent::SlideShowStarted {
            total_slides,
            current_slide,
            preview: None,
        }
    }

    fn updated(current_slide: u32) -> RemoteEvent {
        RemoteEvent::SlideUpdated {
            current_slide,
            preview: None,
        }
    }

    #[test]
    fn test_started_then_updated_keeps_total() {
        // Arrange
        let mut status = PresentationStatus::default();

        // Act
        let first = status.apply(&started(5, 1));
        let second = status.apply(&updated(3));

        // Assert
        assert_eq!(first, StatusChange::Started);
        assert_eq!(second, StatusChange::SlideChanged);
        assert_eq!(
            status,
            PresentationStatus::Started {
                total_slides: 5,
                current_slide: 3
            }
        );
    }

    #[test]
    fn test_updated_while_idle_is_ignored() {
        let mut status = PresentationStatus::Idle;
        assert_eq!(status.apply(&updated(2)), StatusChange::Unchanged);
        assert_eq!(status, PresentationStatus::Idle);
    }

    #[test]
    fn test_finished_reachable_from_idle() {
        let mut status = PresentationStatus::Idle;
        assert_eq!(status.apply(&RemoteEvent::SlideShowFinished), StatusChange::Finished);
        assert!(status.is_finished());
    }

    #[test]
    fn test_finished_is_terminal() {
        // Arrange
        let mut status = PresentationStatus::Idle;
        status.apply(&started(4, 0));
        status.apply(&RemoteEvent::SlideShowFinished);

        // Act
        let changes = [
            status.apply(&started(9, 1)),
            status.apply(&updated(2)),
            status.apply(&RemoteEvent::SlideShowFinished),
        ];

        // Assert
        assert!(changes.iter().all(|c| *c == StatusChange::Unchanged));
        assert_eq!(status, PresentationStatus::Finished);
    }

    #[test]
    fn test_info_and_unrecognized_do_not_change_status() {
        let mut status = PresentationStatus::Idle;
        status.apply(&started(3, 1));

        let info = RemoteEvent::SlideShowInfo {
            name: "deck.odp".to_string(),
        };
        let unknown = RemoteEvent::Unrecognized(["slide_notes", "1"].into_iter().collect::<MessageGroup>());

        assert_eq!(status.apply(&info), StatusChange::Unchanged);
        assert_eq!(status.apply(&unknown), StatusChange::Unchanged);
        assert_eq!(status.as_str(), "started");
    }

    #[test]
    fn test_restart_replaces_counts() {
        let mut status = PresentationStatus::Idle;
        status.apply(&started(3, 2));
        status.apply(&started(7, 0));
        assert_eq!(status.to_string(), "started (0/7)");
    }
}
