//! Scan session and worker loop
//!
//! A [`ScanSession`] owns every stage of the pipeline for one scanning
//! screen. Fragment intake is synchronous: each raw string is filtered,
//! classified, and either delivered at once (single payloads) or pushed onto
//! the bounded queue. A drain task then feeds queued fragments to the decode
//! accumulator in small batches, yielding to the runtime between batches so
//! the camera callback is never starved.

use crate::accumulator::{AccumulatorStep, DecodeAccumulator, Decoders};
use crate::classify::{self, Classified, FragmentKind};
use crate::config::ScanConfig;
use crate::dedup::DedupFilter;
use crate::events::{ScanEvent, ScanEventLogger};
use crate::handoff::{self, Handoff, PayloadSource, ScanOutcome};
use crate::lock::LockFlag;
use crate::metrics::{MetricsSnapshot, SessionMetrics};
use crate::progress::{ProgressReporter, ProgressState};
use crate::queue::IngestionQueue;
use crate::streak::{StreakBreaker, StreakVerdict};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No fragment seen yet
    Idle,
    /// Fragments flowing
    Scanning,
    /// Payload produced, handoff under way
    Completing,
    /// Payload handed off; terminal
    Locked,
    /// Torn down without (or after) delivery
    Closed,
}

impl SessionPhase {
    /// Get display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Completing => "completing",
            Self::Locked => "locked",
            Self::Closed => "closed",
        }
    }
}

/// What happened to one incoming fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intake {
    /// Queued for the worker loop
    Enqueued,
    /// Completed the session on its own
    Delivered,
    /// Seen within the dedup TTL
    Duplicate,
    /// Dropped by the streak breaker
    Suppressed(StreakVerdict),
    /// Not a usable fragment
    Unrecognized,
    /// Session already produced its payload
    Locked,
    /// Session torn down
    Closed,
}

#[derive(Debug)]
struct QueuedFragment {
    raw: String,
    classified: Classified,
}

struct SessionState {
    phase: SessionPhase,
    animated: bool,
    is_bbqr: bool,
    queue: IngestionQueue<QueuedFragment>,
    dedup: DedupFilter,
    streak: StreakBreaker,
    accumulator: Option<DecodeAccumulator>,
    progress: ProgressReporter,
    metrics: SessionMetrics,
    events: ScanEventLogger,
}

impl SessionState {
    fn new(config: &ScanConfig, now: Instant) -> Self {
        Self {
            phase: SessionPhase::Idle,
            animated: config.animated,
            is_bbqr: false,
            queue: IngestionQueue::new(config.queue_capacity),
            dedup: DedupFilter::new(config.dedup_ttl(), config.dedup_sweep_threshold),
            streak: StreakBreaker::new(config),
            accumulator: None,
            progress: ProgressReporter::new(config.progress_throttle()),
            metrics: SessionMetrics::new(now),
            events: ScanEventLogger::new(),
        }
    }

    /// Lock-time bookkeeping shared by both completion paths
    fn complete(
        &mut self,
        payload: String,
        source: PayloadSource,
        now: Instant,
    ) -> ScanOutcome {
        self.phase = SessionPhase::Completing;
        self.accumulator = None;
        let abandoned = self.queue.clear();
        self.metrics.abandoned += abandoned as u64;
        self.metrics.record_success(now);
        let snapshot = self.metrics.snapshot();
        self.events
            .log_completed(source_name(source), self.is_bbqr, abandoned, &snapshot);
        ScanOutcome {
            payload,
            is_bbqr: self.is_bbqr,
            source,
        }
    }
}

fn source_name(source: PayloadSource) -> &'static str {
    match source {
        PayloadSource::PlainText => "plain-text",
        PayloadSource::Base43Psbt => "base43-psbt",
        PayloadSource::LegacyUr => "legacy-ur",
        PayloadSource::Multipart => "multipart",
    }
}

enum BatchResult {
    /// More fragments queued
    More,
    /// Queue empty, or another path finished the session
    Idle,
    /// This batch produced the payload
    Completed(ScanOutcome),
}

struct Shared {
    config: ScanConfig,
    decoders: Decoders,
    handoff: Handoff,
    lock: LockFlag,
    closed: AtomicBool,
    draining: AtomicBool,
    state: Mutex<SessionState>,
}

impl Shared {
    fn is_stopped(&self) -> bool {
        self.lock.is_locked() || self.closed.load(Ordering::Acquire)
    }

    fn stopped_intake(&self) -> Option<Intake> {
        if self.closed.load(Ordering::Acquire) {
            Some(Intake::Closed)
        } else if self.lock.is_locked() {
            Some(Intake::Locked)
        } else {
            None
        }
    }

    fn intake(&self, raw: &str) -> Intake {
        let (intake, outcome) = self.admit(raw);
        // Sinks may call back into the session; hand off outside the state lock
        if let Some(outcome) = outcome {
            self.hand_off(outcome);
        }
        intake
    }

    fn admit(&self, raw: &str) -> (Intake, Option<ScanOutcome>) {
        if let Some(stopped) = self.stopped_intake() {
            return (stopped, None);
        }

        let now = Instant::now();
        let mut state = self.state.lock();
        // Re-check under the state lock; a drain may have completed meanwhile
        if let Some(stopped) = self.stopped_intake() {
            return (stopped, None);
        }

        let state = &mut *state;
        state.metrics.record_attempt(now);
        state
            .metrics
            .flush_if_due(now, self.config.metrics_flush());
        if state.phase == SessionPhase::Idle {
            state.phase = SessionPhase::Scanning;
        }

        let unique_before = state.metrics.unique_parts;
        if state.animated {
            let verdict = state.streak.check(raw, now, &mut state.metrics);
            if !verdict.is_accept() {
                return (Intake::Suppressed(verdict), None);
            }
        }

        let classified = classify::classify(raw);
        let kind = classified.kind();
        match classified {
            Classified::Unrecognized { reason } => {
                state.events.log_rejected(kind.name(), &reason);
                (Intake::Unrecognized, None)
            }
            Classified::PlainText => {
                self.complete_single(state, raw.to_string(), PayloadSource::PlainText, now)
            }
            Classified::Base43Psbt { psbt } => self.complete_single(
                state,
                handoff::psbt_to_base64(&psbt),
                PayloadSource::Base43Psbt,
                now,
            ),
            classified => {
                if !state.dedup.should_accept(raw, now) {
                    state.metrics.dropped_duplicate += 1;
                    return (Intake::Duplicate, None);
                }
                if kind == FragmentKind::BbqrPart {
                    state.is_bbqr = true;
                }
                if !state.animated && kind != FragmentKind::UrV1Part {
                    state.animated = true;
                    state.events.log_animated_detected(kind.name());
                }

                let evicted = state.queue.enqueue(QueuedFragment {
                    raw: raw.to_string(),
                    classified,
                });
                if let Some(evicted) = evicted {
                    state.metrics.dropped_overflow += 1;
                    tracing::trace!(fragment = %evicted.raw, "queue overflow, oldest fragment dropped");
                }
                let newly_seen = state.metrics.unique_parts > unique_before;
                state.metrics.record_accepted(state.queue.len(), newly_seen);
                (Intake::Enqueued, None)
            }
        }
    }

    /// Lock on a payload that needs no accumulation
    fn complete_single(
        &self,
        state: &mut SessionState,
        payload: String,
        source: PayloadSource,
        now: Instant,
    ) -> (Intake, Option<ScanOutcome>) {
        if !self.lock.try_lock() {
            return (Intake::Locked, None);
        }
        (Intake::Delivered, Some(state.complete(payload, source, now)))
    }

    /// Invoke the sink, then finish the phase transition
    fn hand_off(&self, outcome: ScanOutcome) {
        self.handoff.deliver(outcome);
        let mut state = self.state.lock();
        if state.phase == SessionPhase::Completing {
            state.phase = SessionPhase::Locked;
        }
    }

    /// Process one batch. Holds the state lock for the duration of the batch
    /// only; delivery happens after it is released.
    fn process_batch(&self) -> BatchResult {
        let mut state = self.state.lock();
        let state = &mut *state;
        for _ in 0..self.config.drain_batch_size.max(1) {
            if self.is_stopped() {
                return BatchResult::Idle;
            }
            let Some(fragment) = state.queue.pop() else {
                return BatchResult::Idle;
            };

            if state.accumulator.is_none() {
                state.accumulator =
                    DecodeAccumulator::for_fragment(&fragment.classified, &self.decoders);
            }
            let Some(accumulator) = state.accumulator.as_mut() else {
                continue;
            };

            state.metrics.parts_processed += 1;
            let now = Instant::now();
            match accumulator.receive(&fragment.raw, &fragment.classified) {
                Ok(AccumulatorStep::Progress { have, total }) => {
                    if state.progress.report(ProgressState::new(have, total), now) {
                        state.events.log_progress(have, total);
                    }
                }
                Ok(AccumulatorStep::Complete {
                    payload,
                    source,
                    total,
                }) => {
                    state.progress.force(ProgressState::new(total, total), now);
                    state.events.log_progress(total, total);
                    if !self.lock.try_lock() {
                        return BatchResult::Idle;
                    }
                    return BatchResult::Completed(state.complete(payload, source, now));
                }
                Err(e) => {
                    if accumulator.is_complete() {
                        // Every part arrived but the payload did not decode;
                        // start over so retransmitted parts can complete it
                        state.accumulator = None;
                        tracing::debug!(
                            event = "qr_transfer_reset",
                            "Complete transfer failed to decode, discarded"
                        );
                    }
                    state.metrics.malformed += 1;
                    tracing::debug!(
                        event = "qr_fragment_malformed",
                        category = %e.category(),
                        error = %e,
                        "Fragment rejected by decoder"
                    );
                    state
                        .events
                        .log_rejected(fragment.classified.kind().name(), &e.to_string());
                }
            }
        }

        if state.queue.is_empty() {
            BatchResult::Idle
        } else {
            BatchResult::More
        }
    }

    fn claim_drain(&self) -> bool {
        self.draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn has_pending(&self) -> bool {
        !self.is_stopped() && !self.state.lock().queue.is_empty()
    }

    /// Worker loop. Only one instance runs at a time; extra calls return
    /// immediately.
    async fn drain(self: Arc<Self>) {
        if !self.claim_drain() {
            return;
        }
        loop {
            let outcome = loop {
                match self.process_batch() {
                    BatchResult::More => tokio::task::yield_now().await,
                    BatchResult::Idle => break None,
                    BatchResult::Completed(outcome) => break Some(outcome),
                }
            };
            self.draining.store(false, Ordering::Release);

            if let Some(outcome) = outcome {
                self.hand_off(outcome);
                return;
            }
            // A fragment enqueued between the last pop and the release above
            // found the flag taken; pick it up here
            if !self.has_pending() || !self.claim_drain() {
                return;
            }
        }
    }
}

/// One scanning screen's worth of fragment ingestion
pub struct ScanSession {
    shared: Arc<Shared>,
}

impl ScanSession {
    /// Open a session
    pub fn new(config: ScanConfig, decoders: Decoders, handoff: Handoff) -> Self {
        let mut state = SessionState::new(&config, Instant::now());
        state.events.log_started(config.animated);
        Self {
            shared: Arc::new(Shared {
                config,
                decoders,
                handoff,
                lock: LockFlag::new(),
                closed: AtomicBool::new(false),
                draining: AtomicBool::new(false),
                state: Mutex::new(state),
            }),
        }
    }

    /// Feed one decoded QR code. Multi-part fragments are drained on the
    /// current tokio runtime, if any; otherwise call [`ScanSession::drain`].
    pub fn on_fragment(&self, raw: &str) -> Intake {
        let intake = self.shared.intake(raw);
        if intake == Intake::Enqueued {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(Shared::drain(Arc::clone(&self.shared)));
            }
        }
        intake
    }

    /// Feed text typed, pasted, read from a file or decoded from an image.
    /// Goes through exactly the same pipeline as camera fragments.
    pub fn inject_text(&self, text: &str) -> Intake {
        tracing::debug!(event = "qr_scan_injected", len = text.len(), "Text injected");
        self.on_fragment(text)
    }

    /// Run the worker loop on the calling task
    pub async fn drain(&self) {
        Shared::drain(Arc::clone(&self.shared)).await;
    }

    /// Wait until every queued fragment has been processed or the session
    /// stopped
    pub async fn settle(&self) {
        loop {
            if self.shared.is_stopped() {
                return;
            }
            let draining = self.shared.draining.load(Ordering::Acquire);
            if !draining && !self.shared.has_pending() {
                return;
            }
            self.drain().await;
            tokio::task::yield_now().await;
        }
    }

    /// Subscribe to progress updates
    pub fn subscribe_progress(&self) -> watch::Receiver<ProgressState> {
        self.shared.state.lock().progress.subscribe()
    }

    /// Last published progress
    pub fn progress(&self) -> ProgressState {
        self.shared.state.lock().progress.current()
    }

    /// Current phase
    pub fn phase(&self) -> SessionPhase {
        self.shared.state.lock().phase
    }

    /// Check if the session has produced its payload
    pub fn is_locked(&self) -> bool {
        self.shared.lock.is_locked()
    }

    /// Await the lock
    pub async fn locked(&self) {
        self.shared.lock.locked().await
    }

    /// Check if a BBQR fragment was seen
    pub fn is_bbqr(&self) -> bool {
        self.shared.state.lock().is_bbqr
    }

    /// Check if animated handling is on
    pub fn is_animated(&self) -> bool {
        self.shared.state.lock().animated
    }

    /// Raw fragments waiting in the queue, oldest first
    pub fn queued_fragments(&self) -> Vec<String> {
        let state = self.shared.state.lock();
        state.queue.iter().map(|f| f.raw.clone()).collect()
    }

    /// Get snapshot of the session counters
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.shared.state.lock().metrics.snapshot()
    }

    /// Recent session events
    pub fn events(&self) -> Vec<ScanEvent> {
        self.shared.state.lock().events.events()
    }

    /// Release all per-session state. Further fragments are ignored.
    pub fn teardown(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut state = self.shared.state.lock();
        let abandoned = state.queue.clear();
        state.dedup.clear();
        state.streak.reset();
        state.accumulator = None;
        state.progress.reset();
        if state.phase != SessionPhase::Locked {
            state.phase = SessionPhase::Closed;
        }
        tracing::debug!(abandoned, "scan session state released");
        let delivered = self.shared.lock.is_locked();
        state.events.log_torn_down(delivered);
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for ScanSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("ScanSession")
            .field("phase", &state.phase)
            .field("animated", &state.animated)
            .field("queued", &state.queue.len())
            .field("lock", &self.shared.lock)
            .finish()
    }
}

/// Holds at most one active session.
///
/// Focusing a screen opens a session and closes the previous one; blurring
/// it closes the current one.
#[derive(Debug, Default)]
pub struct SessionSlot {
    current: Option<ScanSession>,
}

impl SessionSlot {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the active session
    pub fn focus(&mut self, session: ScanSession) -> &ScanSession {
        self.blur();
        self.current.insert(session)
    }

    /// Tear down the active session, if any
    pub fn blur(&mut self) {
        if let Some(session) = self.current.take() {
            session.teardown();
        }
    }

    /// Active session
    pub fn current(&self) -> Option<&ScanSession> {
        self.current.as_ref()
    }
}
