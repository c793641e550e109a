//! Throttled transfer progress
//!
//! Fragments can arrive at camera frame rate; the UI only needs a fresh
//! `{have, total}` a few times per second. Updates inside the throttle window
//! are dropped, except forced ones (the final update before delivery).

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Progress of the current transfer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressState {
    /// Units received
    pub have: u32,
    /// Units expected (0 while idle)
    pub total: u32,
}

impl ProgressState {
    /// Create a progress value
    pub fn new(have: u32, total: u32) -> Self {
        Self { have, total }
    }

    /// Check if a transfer is under way (the UI shows the bar only then)
    pub fn is_active(&self) -> bool {
        self.total > 0
    }

    /// Get progress percentage
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (f64::from(self.have.min(self.total)) / f64::from(self.total)) * 100.0
    }

    /// Get summary string
    pub fn summary(&self) -> String {
        format!("{} / {}", self.have, self.total)
    }
}

/// Publishes progress on a watch channel, at most once per interval
#[derive(Debug)]
pub struct ProgressReporter {
    tx: watch::Sender<ProgressState>,
    interval: Duration,
    last_update: Option<Instant>,
}

impl ProgressReporter {
    /// Create a reporter with the given throttle interval
    pub fn new(interval: Duration) -> Self {
        let (tx, _rx) = watch::channel(ProgressState::default());
        Self {
            tx,
            interval,
            last_update: None,
        }
    }

    /// Subscribe to progress updates
    pub fn subscribe(&self) -> watch::Receiver<ProgressState> {
        self.tx.subscribe()
    }

    /// Last published value
    pub fn current(&self) -> ProgressState {
        *self.tx.borrow()
    }

    /// Publish unless the previous update was inside the throttle window.
    /// Returns `true` if the value was published.
    pub fn report(&mut self, state: ProgressState, now: Instant) -> bool {
        if let Some(last) = self.last_update {
            if now.saturating_duration_since(last) <= self.interval {
                return false;
            }
        }
        self.publish(state, now);
        true
    }

    /// Publish regardless of the throttle
    pub fn force(&mut self, state: ProgressState, now: Instant) {
        self.publish(state, now);
    }

    fn publish(&mut self, state: ProgressState, now: Instant) {
        self.last_update = Some(now);
        // No receivers is fine; the value is still kept for `current()`
        self.tx.send_replace(state);
    }

    /// Back to idle
    pub fn reset(&mut self) {
        self.last_update = None;
        self.tx.send_replace(ProgressState::default());
    }
}
