//! Animated QR fragment ingestion
//!
//! Turns the stream of strings coming out of a QR camera into exactly one
//! payload: plain text, a base43 PSBT re-encoded as base64, or a reassembled
//! UR / BBQR multi-part transfer. Fountain decoding itself is supplied by the
//! host through the [`MultipartDecoder`] and [`LegacyUrDecoder`] traits.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod accumulator;
pub mod base43;
pub mod classify;
pub mod config;
pub mod dedup;
pub mod error;
pub mod events;
pub mod handoff;
pub mod lock;
pub mod metrics;
pub mod progress;
pub mod psbt;
pub mod queue;
pub mod session;
pub mod streak;
pub mod workload;

pub use accumulator::{
    AccumulatorStep, DecodeAccumulator, DecoderFactory, Decoders, LegacyUrDecoder,
    MultipartDecoder, FOUNTAIN_PROGRESS_SCALE,
};
pub use classify::{classify, Classified, FragmentKind};
pub use config::{
    ScanConfig, DEDUP_SWEEP_THRESHOLD, DEDUP_TTL_MS, DRAIN_BATCH_SIZE, PROGRESS_THROTTLE_MS,
    QUEUE_CAPACITY, STREAK_COOLDOWN_MS, STREAK_LIMIT, STREAK_WINDOW_MS,
};
pub use dedup::DedupFilter;
pub use error::{DecodeError, Error, ErrorCategory, Result};
pub use events::{ScanEvent, ScanEventLogger};
pub use handoff::{Handoff, PayloadSink, PayloadSource, ScanOutcome};
pub use lock::LockFlag;
pub use metrics::{MetricsSnapshot, SessionMetrics, WindowSnapshot};
pub use progress::{ProgressReporter, ProgressState};
pub use psbt::PsbtShape;
pub use queue::IngestionQueue;
pub use session::{Intake, ScanSession, SessionPhase, SessionSlot};
pub use streak::{StreakBreaker, StreakVerdict};
