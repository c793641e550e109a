//! Session performance counters
//!
//! Owned by the scan session and updated by each stage. A once-per-second
//! window is flushed to the log; the full snapshot is logged on completion.

use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// Counters for one scan session
#[derive(Debug, Clone, Default)]
pub struct SessionMetrics {
    /// Session creation time
    pub started_at: Option<Instant>,
    /// First fragment arrival
    pub first_attempt_at: Option<Instant>,
    /// Payload delivery
    pub first_success_at: Option<Instant>,
    /// Fragments received from the camera or injection path
    pub attempts: u64,
    /// Fragments accepted into the queue
    pub accepted: u64,
    /// Fragments fed to the accumulator
    pub parts_processed: u64,
    /// Fragments the accumulator rejected
    pub malformed: u64,
    /// Highest queue depth
    pub peak_queue: usize,
    /// Fragments evicted by queue overflow
    pub dropped_overflow: u64,
    /// Fragments rejected by the dedup table
    pub dropped_duplicate: u64,
    /// Fragments dropped by the streak cooldown
    pub dropped_same_streak: u64,
    /// Fragments dropped by the duplicate window
    pub dropped_duplicate_window: u64,
    /// Fragments still queued when the transfer completed
    pub abandoned: u64,
    /// Identical frames seen by the streak breaker
    pub repeats_total: u64,
    /// Longest identical-frame streak
    pub max_same_streak: u32,
    /// Distinct frames accepted by the streak breaker
    pub unique_parts: usize,
    window: SecondWindow,
}

/// Counters of the current one-second window
#[derive(Debug, Clone, Copy, Default)]
struct SecondWindow {
    opened_at: Option<Instant>,
    attempts: u64,
    accepted: u64,
    unique: u64,
}

/// Per-second telemetry, as flushed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowSnapshot {
    /// Attempts in the window
    pub attempts: u64,
    /// Accepted fragments in the window
    pub accepted: u64,
    /// Newly seen fragments in the window
    pub unique: u64,
}

/// Serializable view of the session counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Milliseconds from session start to first attempt
    pub ms_to_first_attempt: Option<u64>,
    /// Milliseconds from session start to delivery
    pub ms_to_success: Option<u64>,
    /// Fragments received
    pub attempts: u64,
    /// Fragments accepted into the queue
    pub accepted: u64,
    /// Fragments fed to the accumulator
    pub parts_processed: u64,
    /// Fragments the accumulator rejected
    pub malformed: u64,
    /// Highest queue depth
    pub peak_queue: usize,
    /// Fragments evicted by queue overflow
    pub dropped_overflow: u64,
    /// Fragments rejected by the dedup table
    pub dropped_duplicate: u64,
    /// Fragments dropped by the streak cooldown
    pub dropped_same_streak: u64,
    /// Fragments dropped by the duplicate window
    pub dropped_duplicate_window: u64,
    /// Fragments abandoned at completion
    pub abandoned: u64,
    /// Identical frames seen
    pub repeats_total: u64,
    /// Longest identical-frame streak
    pub max_same_streak: u32,
    /// Distinct frames accepted
    pub unique_parts: usize,
}

fn millis_between(from: Option<Instant>, to: Option<Instant>) -> Option<u64> {
    match (from, to) {
        (Some(from), Some(to)) => Some(to.saturating_duration_since(from).as_millis() as u64),
        _ => None,
    }
}

impl SessionMetrics {
    /// Create counters for a session starting at `now`
    pub fn new(now: Instant) -> Self {
        Self {
            started_at: Some(now),
            ..Default::default()
        }
    }

    /// Record a fragment arrival
    pub fn record_attempt(&mut self, now: Instant) {
        self.attempts += 1;
        self.window.attempts += 1;
        self.first_attempt_at.get_or_insert(now);
        self.window.opened_at.get_or_insert(now);
    }

    /// Record a queue insertion
    pub fn record_accepted(&mut self, queue_depth: usize, newly_seen: bool) {
        self.accepted += 1;
        self.window.accepted += 1;
        if newly_seen {
            self.window.unique += 1;
        }
        self.peak_queue = self.peak_queue.max(queue_depth);
    }

    /// Record delivery
    pub fn record_success(&mut self, now: Instant) {
        self.first_success_at.get_or_insert(now);
    }

    /// Close the current window if it is older than `interval`
    pub fn take_window(&mut self, now: Instant, interval: Duration) -> Option<WindowSnapshot> {
        let opened_at = self.window.opened_at?;
        if now.saturating_duration_since(opened_at) < interval {
            return None;
        }
        let snapshot = WindowSnapshot {
            attempts: self.window.attempts,
            accepted: self.window.accepted,
            unique: self.window.unique,
        };
        self.window = SecondWindow {
            opened_at: Some(now),
            ..Default::default()
        };
        Some(snapshot)
    }

    /// Flush the per-second window to the log when due
    pub fn flush_if_due(&mut self, now: Instant, interval: Duration) {
        if let Some(window) = self.take_window(now, interval) {
            tracing::debug!(
                event = "qr_scan_rate",
                attempts_per_sec = window.attempts,
                accepted = window.accepted,
                unique = window.unique,
                unique_total = self.unique_parts,
                repeats = self.repeats_total,
                max_streak = self.max_same_streak,
                dropped_same_streak = self.dropped_same_streak,
                dropped_duplicate_window = self.dropped_duplicate_window,
                dropped_overflow = self.dropped_overflow,
                "QR scan rate"
            );
        }
    }

    /// Get snapshot of counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ms_to_first_attempt: millis_between(self.started_at, self.first_attempt_at),
            ms_to_success: millis_between(self.started_at, self.first_success_at),
            attempts: self.attempts,
            accepted: self.accepted,
            parts_processed: self.parts_processed,
            malformed: self.malformed,
            peak_queue: self.peak_queue,
            dropped_overflow: self.dropped_overflow,
            dropped_duplicate: self.dropped_duplicate,
            dropped_same_streak: self.dropped_same_streak,
            dropped_duplicate_window: self.dropped_duplicate_window,
            abandoned: self.abandoned,
            repeats_total: self.repeats_total,
            max_same_streak: self.max_same_streak,
            unique_parts: self.unique_parts,
        }
    }
}

impl MetricsSnapshot {
    /// Single-line JSON, as written to the completion log
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
