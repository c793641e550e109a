//! Time-windowed duplicate suppression
//!
//! Keyed by the exact raw fragment. A hit inside the TTL does not refresh the
//! timestamp, so a fragment shown continuously is re-admitted once per TTL.

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Dedup table
#[derive(Debug)]
pub struct DedupFilter {
    seen: HashMap<String, Instant>,
    ttl: Duration,
    sweep_threshold: usize,
}

impl DedupFilter {
    /// Create a filter with the given TTL and sweep threshold
    pub fn new(ttl: Duration, sweep_threshold: usize) -> Self {
        Self {
            seen: HashMap::new(),
            ttl,
            sweep_threshold,
        }
    }

    /// Returns `true` if the fragment was not seen within the TTL
    pub fn should_accept(&mut self, fragment: &str, now: Instant) -> bool {
        if let Some(&last) = self.seen.get(fragment) {
            if now.saturating_duration_since(last) < self.ttl {
                return false;
            }
        }
        self.seen.insert(fragment.to_string(), now);
        if self.seen.len() > self.sweep_threshold {
            self.sweep(now);
        }
        true
    }

    /// Drop every entry older than the TTL
    pub fn sweep(&mut self, now: Instant) {
        let ttl = self.ttl;
        let before = self.seen.len();
        self.seen
            .retain(|_, &mut last| now.saturating_duration_since(last) < ttl);
        tracing::trace!(
            evicted = before - self.seen.len(),
            remaining = self.seen.len(),
            "dedup sweep"
        );
    }

    /// Number of tracked fragments
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.seen.clear();
    }
}
