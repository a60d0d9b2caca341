//! Single-shot debounce timer
//!
//! Wraps an owned `tokio::time::Sleep` slot so the engine can hold at most
//! one pending timer: arming supersedes any pending timer, cancelling is a
//! no-op when unarmed, and `expired()` resolves at most once per arm.

use std::future;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{sleep, Sleep};

/// Cancellable single-shot timer for silence and restart debouncing
pub struct DebounceTimer {
    pending: Option<Pin<Box<Sleep>>>,
}

impl DebounceTimer {
    /// Create an unarmed timer
    pub fn new() -> Self {
        Self { pending: None }
    }

    /// Schedule expiry after `duration`, cancelling any pending timer
    pub fn arm(&mut self, duration: Duration) {
        self.pending = Some(Box::pin(sleep(duration)));
    }

    /// Cancel a pending timer; no-op when unarmed
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Whether a timer is currently pending
    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Resolve when the armed timer expires; pending forever while unarmed.
    /// Safe to drop and re-await: the deadline lives in the timer itself.
    pub async fn expired(&mut self) {
        match self.pending.as_mut() {
            Some(timer) => {
                timer.as_mut().await;
                self.pending = None;
            }
            None => future::pending::<()>().await,
        }
    }
}

impl Default for DebounceTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{advance, Instant};
    use tokio_test::{assert_pending, task};

    #[test]
    fn test_unarmed_never_resolves() {
        let mut timer = DebounceTimer::new();
        assert!(!timer.is_armed());

        let mut fut = task::spawn(timer.expired());
        assert_pending!(fut.poll());
    }

    #[tokio::test(start_paused = true)]
    async fn test_arm_then_expire() {
        let mut timer = DebounceTimer::new();
        timer.arm(Duration::from_millis(100));
        assert!(timer.is_armed());

        let start = Instant::now();
        timer.expired().await;

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(110));
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_supersedes_pending() {
        let mut timer = DebounceTimer::new();
        timer.arm(Duration::from_millis(100));

        advance(Duration::from_millis(60)).await;
        timer.arm(Duration::from_millis(100));

        let rearmed_at = Instant::now();
        timer.expired().await;

        // Expiry is measured from the rearm, not the original arm
        let elapsed = rearmed_at.elapsed();
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(110));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_expiry() {
        let mut timer = DebounceTimer::new();
        timer.arm(Duration::from_millis(10));
        timer.cancel();
        assert!(!timer.is_armed());

        tokio::select! {
            _ = timer.expired() => panic!("cancelled timer fired"),
            _ = tokio::time::sleep(Duration::from_millis(50)) => {}
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_at_most_once_per_arm() {
        let mut timer = DebounceTimer::new();
        timer.arm(Duration::from_millis(10));
        timer.expired().await;

        tokio::select! {
            _ = timer.expired() => panic!("timer fired twice for one arm"),
            _ = tokio::time::sleep(Duration::from_millis(50)) => {}
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_unarmed_is_noop() {
        let mut timer = DebounceTimer::new();
        timer.cancel();
        timer.arm(Duration::from_millis(10));
        timer.expired().await;
    }
}
