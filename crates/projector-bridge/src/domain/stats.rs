//! Read-only session snapshot for external pollers.

use serde::{Serialize, Serializer};

use projector_core::PresentationStatus;

use crate::domain::messages::SubscriberEvent;

/// A point-in-time view of one session.
///
/// The session actor republishes this after every mutation; callers read it
/// without going through the session mailbox.
///
/// ```json
/// {"name":"deck.odp","status":{"command":"slideshow_started","totalSlides":5,"currentSlide":2},
///  "subscriberCount":3,"maxSubscribers":10,"ownerPresent":true,
///  "ownerTimeoutSeconds":60,"terminated":false}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    /// Presentation display name, empty until the remote announces it.
    pub name: String,
    /// Serialized in the same shape subscribers see, without the preview.
    #[serde(serialize_with = "serialize_status")]
    pub status: PresentationStatus,
    pub subscriber_count: usize,
    pub max_subscribers: usize,
    pub owner_present: bool,
    pub owner_timeout_seconds: u64,
    pub terminated: bool,
}

impl SessionStats {
    pub fn new(max_subscribers: usize, owner_timeout_seconds: u64) -> Self {
        Self {
            name: String::new(),
            status: PresentationStatus::Idle,
            subscriber_count: 0,
            max_subscribers,
            owner_present: false,
            owner_timeout_seconds,
            terminated: false,
        }
    }

    /// Whether one more subscriber could register right now.
    pub fn has_capacity(&self) -> bool {
        !self.terminated && self.subscriber_count < self.max_subscribers
    }
}

fn serialize_status<S: Serializer>(status: &PresentationStatus, serializer: S) -> Result<S::Ok, S::Error> {
    SubscriberEvent::from_status(status, None).serialize(serializer)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stats_serialize_camel_case() {
        // Arrange
        let mut stats = SessionStats::new(10, 60);
        stats.name = "deck.odp".to_string();
        stats.status = PresentationStatus::Started {
            total_slides: 5,
            current_slide: 2,
        };
        stats.subscriber_count = 3;
        stats.owner_present = true;

        // Act
        let value = serde_json::to_value(&stats).unwrap();

        // Assert
        assert_eq!(
            value,
            json!({
                "name": "deck.odp",
                "status": {"command": "slideshow_started", "totalSlides": 5, "currentSlide": 2},
                "subscriberCount": 3,
                "maxSubscribers": 10,
                "ownerPresent": true,
                "ownerTimeoutSeconds": 60,
                "terminated": false
            })
        );
    }

    #[test]
    fn test_idle_and_finished_status_use_subscriber_event_shape() {
        let mut stats = SessionStats::new(10, 60);
        assert_eq!(
            serde_json::to_value(&stats).unwrap()["status"],
            json!({"command": "slideshow_idle"})
        );

        stats.status = PresentationStatus::Finished;
        assert_eq!(
            serde_json::to_value(&stats).unwrap()["status"],
            json!({"command": "slideshow_finished"})
        );
    }

    #[test]
    fn test_has_capacity_respects_limit_and_termination() {
        let mut stats = SessionStats::new(2, 60);
        assert!(stats.has_capacity());

        stats.subscriber_count = 2;
        assert!(!stats.has_capacity());

        stats.subscriber_count = 0;
        stats.terminated = true;
        assert!(!stats.has_capacity());
    }
}
