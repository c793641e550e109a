//! Scan session configuration

use crate::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Maximum number of fragments waiting to be decoded
pub const QUEUE_CAPACITY: usize = 20;

/// Fragments processed per worker iteration before yielding
pub const DRAIN_BATCH_SIZE: usize = 2;

/// How long an identical fragment is suppressed by the dedup table
pub const DEDUP_TTL_MS: u64 = 2_000;

/// Dedup table size above which expired entries are swept
pub const DEDUP_SWEEP_THRESHOLD: usize = 200;

/// Identical frames closer than this to the last acceptance extend the streak
pub const STREAK_WINDOW_MS: u64 = 200;

/// Streak length that opens a cooldown
pub const STREAK_LIMIT: u32 = 3;

/// Cooldown during which the streaking fragment is dropped outright
pub const STREAK_COOLDOWN_MS: u64 = 400;

/// Minimum interval between progress publications
pub const PROGRESS_THROTTLE_MS: u64 = 200;

/// Interval of the per-second telemetry flush
pub const METRICS_FLUSH_MS: u64 = 1_000;

/// Launcher name fragments that imply an animated (multi-part) transfer
pub const ANIMATED_LAUNCHER_HINTS: [&str; 5] = ["send", "multisig", "watch", "psbt", "sign"];

/// Scan session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Caller expects a multi-part transfer; enables the streak breaker
    pub animated: bool,
    /// Ingestion queue capacity
    pub queue_capacity: usize,
    /// Fragments per worker batch
    pub drain_batch_size: usize,
    /// Dedup TTL in milliseconds
    pub dedup_ttl_ms: u64,
    /// Dedup sweep threshold (entries)
    pub dedup_sweep_threshold: usize,
    /// Streak window in milliseconds
    pub streak_window_ms: u64,
    /// Streak length that triggers a cooldown
    pub streak_limit: u32,
    /// Cooldown length in milliseconds
    pub streak_cooldown_ms: u64,
    /// Optional "already seen" window in milliseconds (animated mode only)
    pub duplicate_window_ms: Option<u64>,
    /// Progress throttle in milliseconds
    pub progress_throttle_ms: u64,
    /// Telemetry flush interval in milliseconds
    pub metrics_flush_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            animated: false,
            queue_capacity: QUEUE_CAPACITY,
            drain_batch_size: DRAIN_BATCH_SIZE,
            dedup_ttl_ms: DEDUP_TTL_MS,
            dedup_sweep_threshold: DEDUP_SWEEP_THRESHOLD,
            streak_window_ms: STREAK_WINDOW_MS,
            streak_limit: STREAK_LIMIT,
            streak_cooldown_ms: STREAK_COOLDOWN_MS,
            duplicate_window_ms: None,
            progress_throttle_ms: PROGRESS_THROTTLE_MS,
            metrics_flush_ms: METRICS_FLUSH_MS,
        }
    }
}

impl ScanConfig {
    /// Default config with animated mode enabled
    pub fn animated() -> Self {
        Self {
            animated: true,
            ..Default::default()
        }
    }

    /// Config for a scan launched from the named flow.
    ///
    /// Flows that move PSBTs or account descriptors around start in animated
    /// mode so the streak breaker is active from the first frame.
    pub fn for_launcher(launcher: &str) -> Self {
        let name = launcher.to_ascii_lowercase();
        Self {
            animated: ANIMATED_LAUNCHER_HINTS.iter().any(|hint| name.contains(hint)),
            ..Default::default()
        }
    }

    /// Parse a config from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Dedup TTL
    pub fn dedup_ttl(&self) -> Duration {
        Duration::from_millis(self.dedup_ttl_ms)
    }

    /// Streak window
    pub fn streak_window(&self) -> Duration {
        Duration::from_millis(self.streak_window_ms)
    }

    /// Streak cooldown
    pub fn streak_cooldown(&self) -> Duration {
        Duration::from_millis(self.streak_cooldown_ms)
    }

    /// Duplicate window, if enabled
    pub fn duplicate_window(&self) -> Option<Duration> {
        self.duplicate_window_ms.map(Duration::from_millis)
    }

    /// Progress throttle
    pub fn progress_throttle(&self) -> Duration {
        Duration::from_millis(self.progress_throttle_ms)
    }

    /// Telemetry flush interval
    pub fn metrics_flush(&self) -> Duration {
        Duration::from_millis(self.metrics_flush_ms)
    }
}
