//! Completion handoff
//!
//! The session hands exactly one [`ScanOutcome`] to the caller. This module
//! holds the outcome type, the sink callbacks and the payload finishing rules
//! for the paths that do not produce a string directly.

use crate::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::sync::Arc;

/// ASCII `psbt`: decoded legacy payloads starting with this are binary PSBTs
const PSBT_ASCII_PREFIX: &[u8] = b"psbt";

/// Which path produced the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSource {
    /// Scanned text, delivered verbatim
    PlainText,
    /// Base43 PSBT re-encoded as base64
    Base43Psbt,
    /// Reassembled legacy UR v1 transfer
    LegacyUr,
    /// Reassembled UR v2 / BBQR transfer
    Multipart,
}

/// Final payload of a scan session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Payload string handed to the caller
    pub payload: String,
    /// A BBQR fragment was seen during the session
    pub is_bbqr: bool,
    /// Producing path
    pub source: PayloadSource,
}

/// Receives the session's single payload
pub type PayloadSink = Arc<dyn Fn(ScanOutcome) + Send + Sync>;

/// Where a finished payload is sent
#[derive(Clone)]
pub struct Handoff {
    sink: PayloadSink,
    fallback_importer: Option<PayloadSink>,
}

impl Handoff {
    /// Deliver everything to `sink`
    pub fn new(sink: PayloadSink) -> Self {
        Self {
            sink,
            fallback_importer: None,
        }
    }

    /// Route plain-text payloads to a separate importer
    pub fn with_fallback_importer(mut self, importer: PayloadSink) -> Self {
        self.fallback_importer = Some(importer);
        self
    }

    /// Invoke the sink responsible for this outcome
    pub fn deliver(&self, outcome: ScanOutcome) {
        match (&self.fallback_importer, outcome.source) {
            (Some(importer), PayloadSource::PlainText) => importer(outcome),
            _ => (self.sink)(outcome),
        }
    }
}

/// Base64 form of a binary PSBT
pub fn psbt_to_base64(psbt: &[u8]) -> String {
    STANDARD.encode(psbt)
}

/// Turn the hex output of the legacy v1 decoder into the delivered payload.
///
/// PSBTs are expected in base64 by every consumer; anything else is assumed
/// to be text.
pub fn finish_legacy_payload(hex_payload: &str) -> Result<String> {
    let bytes = hex::decode(hex_payload.trim())?;
    if bytes.starts_with(PSBT_ASCII_PREFIX) {
        Ok(STANDARD.encode(&bytes))
    } else {
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
