//! Single-shot, re-armable owner-absence timer.
//!
//! The session actor owns one [`OwnerTimer`] and polls [`OwnerTimer::expired`]
//! inside its `select!` loop.  There is no background task: disarming the
//! timer just clears the deadline, so a stale expiry can never fire.

use std::time::Duration;

use tokio::time::{sleep_until, Instant};

/// Stand-in for "never" when a timeout does not fit in an [`Instant`].
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `now + timeout`, saturating at a far-future deadline instead of panicking.
pub fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

#[derive(Debug)]
pub struct OwnerTimer {
    timeout: Duration,
    deadline: Option<Instant>,
}

impl OwnerTimer {
    /// Creates a disarmed timer.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: None,
        }
    }

    /// Starts a fresh countdown of the full timeout, replacing any running one.
    pub fn arm(&mut self) {
        self.deadline = Some(deadline_after(self.timeout));
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolves when the armed deadline passes; never resolves while disarmed.
    ///
    /// Cancel-safe.  The deadline is not cleared by this future; the caller
    /// decides what firing means.
    pub async fn expired(&self) {
        match self.deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[tokio::test(start_paused = true)]
    async fn test_armed_timer_fires_after_timeout() {
        // Arrange
        let mut timer = OwnerTimer::new(Duration::from_secs(60));
        let start = Instant::now();

        // Act
        timer.arm();
        timer.expired().await;

        // Assert
        assert!(Instant::now() - start >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarmed_timer_never_fires() {
        let timer = OwnerTimer::new(Duration::from_secs(1));
        let result = timeout(Duration::from_secs(3600), timer.expired()).await;
        assert!(result.is_err(), "disarmed timer must stay pending");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearming_restarts_the_full_countdown() {
        // Arrange
        let mut timer = OwnerTimer::new(Duration::from_secs(10));
        timer.arm();
        tokio::time::advance(Duration::from_secs(8)).await;

        // Act: owner joined and left again
        timer.disarm();
        timer.arm();

        // Assert: 8s later the fresh countdown has not elapsed yet
        assert!(timeout(Duration::from_secs(8), timer.expired()).await.is_err());
        assert!(timeout(Duration::from_secs(3), timer.expired()).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_timeout_arms_without_overflow() {
        // Arrange
        let mut timer = OwnerTimer::new(Duration::from_secs(u64::MAX));

        // Act
        timer.arm();

        // Assert: armed, and effectively never fires
        assert!(timer.is_armed());
        assert!(timeout(Duration::from_secs(86_400), timer.expired()).await.is_err());
    }

    #[test]
    fn test_deadline_after_saturates() {
        let before = Instant::now();
        assert!(deadline_after(Duration::MAX) > before + Duration::from_secs(86_400 * 365));
    }

    #[test]
    fn test_arm_and_disarm_flags() {
        let mut timer = OwnerTimer::new(Duration::from_secs(5));
        assert!(!timer.is_armed());
        timer.arm();
        assert!(timer.is_armed());
        timer.disarm();
        assert!(!timer.is_armed());
        assert_eq!(timer.timeout(), Duration::from_secs(5));
    }
}
