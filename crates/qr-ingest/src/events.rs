//! Structured scan session events
//!
//! Every lifecycle step of a session is logged with an `event` field so
//! scanner behaviour can be followed in the log stream. The most recent
//! events are also kept in memory for export with diagnostics.

#![allow(missing_docs)]

use crate::metrics::MetricsSnapshot;
use std::collections::VecDeque;
use tracing::{debug, info};

/// Events retained per session
pub const MAX_RETAINED_EVENTS: usize = 64;

/// Scan session event
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    /// Session opened
    Started {
        animated: bool,
        timestamp: String,
    },
    /// First fragment of a multi-part transfer, or animated mode switched on
    AnimatedDetected { kind: String },
    /// Throttled progress update
    Progress { have: u32, total: u32 },
    /// Fragment that could not be used
    Rejected { kind: String, reason: String },
    /// Payload handed off
    Completed {
        source: String,
        is_bbqr: bool,
        abandoned: usize,
        metrics: String,
    },
    /// Session torn down
    TornDown { delivered: bool, timestamp: String },
}

/// Event log of one scan session
#[derive(Debug, Default)]
pub struct ScanEventLogger {
    events: VecDeque<ScanEvent>,
}

impl ScanEventLogger {
    /// Create new logger
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, event: ScanEvent) {
        if self.events.len() == MAX_RETAINED_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Log session started
    pub fn log_started(&mut self, animated: bool) {
        let timestamp = chrono::Utc::now().to_rfc3339();
        info!(
            event = "qr_scan_started",
            animated = %animated,
            timestamp = %timestamp,
            "QR scan session started"
        );
        self.push(ScanEvent::Started {
            animated,
            timestamp,
        });
    }

    /// Log switch to animated handling
    pub fn log_animated_detected(&mut self, kind: &str) {
        info!(
            event = "qr_scan_animated",
            kind = %kind,
            "Animated QR detected"
        );
        self.push(ScanEvent::AnimatedDetected {
            kind: kind.to_string(),
        });
    }

    /// Log progress
    pub fn log_progress(&mut self, have: u32, total: u32) {
        debug!(
            event = "qr_scan_progress",
            have = %have,
            total = %total,
            "QR scan progress"
        );
        self.push(ScanEvent::Progress { have, total });
    }

    /// Log an unusable fragment
    pub fn log_rejected(&mut self, kind: &str, reason: &str) {
        debug!(
            event = "qr_scan_rejected",
            kind = %kind,
            reason = %reason,
            "QR fragment rejected"
        );
        self.push(ScanEvent::Rejected {
            kind: kind.to_string(),
            reason: reason.to_string(),
        });
    }

    /// Log delivery, with the session counters as JSON
    pub fn log_completed(
        &mut self,
        source: &str,
        is_bbqr: bool,
        abandoned: usize,
        metrics: &MetricsSnapshot,
    ) {
        let metrics = metrics.to_json();
        if abandoned > 0 {
            debug!(
                event = "qr_scan_abandoned",
                abandoned = %abandoned,
                "Queued fragments discarded at completion"
            );
        }
        info!(
            event = "qr_scan_completed",
            source = %source,
            is_bbqr = %is_bbqr,
            metrics = %metrics,
            "QR scan completed"
        );
        self.push(ScanEvent::Completed {
            source: source.to_string(),
            is_bbqr,
            abandoned,
            metrics,
        });
    }

    /// Log teardown
    pub fn log_torn_down(&mut self, delivered: bool) {
        let timestamp = chrono::Utc::now().to_rfc3339();
        info!(
            event = "qr_scan_torn_down",
            delivered = %delivered,
            timestamp = %timestamp,
            "QR scan session closed"
        );
        self.push(ScanEvent::TornDown {
            delivered,
            timestamp,
        });
    }

    /// Get retained events, oldest first
    pub fn events(&self) -> Vec<ScanEvent> {
        self.events.iter().cloned().collect()
    }

    /// Get events as strings for export
    pub fn export_events(&self) -> Vec<String> {
        self.events.iter().map(|e| format!("{:?}", e)).collect()
    }

    /// Clear all events
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::SessionMetrics;
    use tokio::time::Instant;

    #[test]
    fn test_scan_event_logger() {
        let mut logger = ScanEventLogger::new();
        logger.log_started(true);
        logger.log_progress(10, 100);
        logger.log_completed(
            "multipart",
            false,
            0,
            &SessionMetrics::new(Instant::now()).snapshot(),
        );

        let events = logger.events();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[1], ScanEvent::Progress { have: 10, total: 100 }));
        match &events[2] {
            ScanEvent::Completed { metrics, .. } => assert!(metrics.starts_with('{')),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_retention_cap() {
        let mut logger = ScanEventLogger::new();
        for i in 0..(MAX_RETAINED_EVENTS as u32 + 10) {
            logger.log_progress(i, 1_000);
        }
        let events = logger.events();
        assert_eq!(events.len(), MAX_RETAINED_EVENTS);
        assert_eq!(events[0], ScanEvent::Progress { have: 10, total: 1_000 });
    }

    #[test]
    fn test_logger_export_and_clear() {
        let mut logger = ScanEventLogger::new();
        logger.log_rejected("unrecognized", "empty fragment");
        assert_eq!(logger.export_events().len(), 1);
        logger.clear();
        assert!(logger.events().is_empty());
    }
}
