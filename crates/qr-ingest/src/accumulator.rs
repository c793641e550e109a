//! Decode accumulator
//!
//! Folds queued fragments into one transfer. The UR v2 / BBQR fountain
//! decoding itself is an external capability behind [`MultipartDecoder`];
//! legacy v1 parts are assembled here and handed to a [`LegacyUrDecoder`]
//! once complete.

use crate::classify::Classified;
use crate::error::DecodeError;
use crate::handoff::{self, PayloadSource};
use crate::workload::LegacyAssembly;
use crate::{Error, Result};
use std::sync::Arc;

/// Progress scale used for fountain-coded transfers
pub const FOUNTAIN_PROGRESS_SCALE: u32 = 100;

/// Stateful decoder for UR v2 and BBQR parts
pub trait MultipartDecoder: Send {
    /// Feed one part
    fn receive_part(&mut self, part: &str) -> std::result::Result<(), DecodeError>;

    /// Check if the payload can be extracted
    fn is_complete(&self) -> bool;

    /// Completion estimate in `[0, 1]`
    fn estimated_percent_complete(&self) -> f64;

    /// Decoded payload in its native string form. Only valid once complete.
    fn result(&mut self) -> std::result::Result<String, DecodeError>;
}

/// Decoder for a complete set of legacy UR v1 parts
pub trait LegacyUrDecoder: Send + Sync {
    /// Decode the parts (ordered by index) into a hex payload
    fn decode(&self, parts: &[String]) -> std::result::Result<String, DecodeError>;
}

/// Creates a fresh fountain decoder for each transfer
pub type DecoderFactory = Arc<dyn Fn() -> Box<dyn MultipartDecoder> + Send + Sync>;

/// Decoder capabilities supplied by the host
#[derive(Clone)]
pub struct Decoders {
    /// Fountain decoder factory
    pub fountain: DecoderFactory,
    /// Legacy v1 decoder
    pub legacy: Arc<dyn LegacyUrDecoder>,
}

impl Decoders {
    /// Bundle a fountain decoder factory with a legacy decoder
    pub fn new<F, L>(fountain: F, legacy: L) -> Self
    where
        F: Fn() -> Box<dyn MultipartDecoder> + Send + Sync + 'static,
        L: LegacyUrDecoder + 'static,
    {
        Self {
            fountain: Arc::new(fountain),
            legacy: Arc::new(legacy),
        }
    }
}

/// Result of feeding one fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccumulatorStep {
    /// Transfer still in progress
    Progress {
        /// Units received
        have: u32,
        /// Units expected
        total: u32,
    },
    /// Transfer finished
    Complete {
        /// Final payload
        payload: String,
        /// Producing path
        source: PayloadSource,
        /// Final progress units
        total: u32,
    },
}

enum Transfer {
    Fountain(Box<dyn MultipartDecoder>),
    Legacy {
        assembly: LegacyAssembly,
        decoder: Arc<dyn LegacyUrDecoder>,
    },
}

/// One multi-part transfer in progress
pub struct DecodeAccumulator {
    transfer: Transfer,
    received: u64,
}

impl std::fmt::Debug for DecodeAccumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let family = match self.transfer {
            Transfer::Fountain(_) => "fountain",
            Transfer::Legacy { .. } => "legacy",
        };
        f.debug_struct("DecodeAccumulator")
            .field("transfer", &family)
            .field("received", &self.received)
            .finish()
    }
}

impl DecodeAccumulator {
    /// Create the accumulator matching the first fragment of a transfer
    pub fn for_fragment(fragment: &Classified, decoders: &Decoders) -> Option<Self> {
        let transfer = match fragment {
            Classified::UrV2Part | Classified::BbqrPart => {
                Transfer::Fountain((decoders.fountain)())
            }
            Classified::UrV1Part { .. } => Transfer::Legacy {
                assembly: LegacyAssembly::new(),
                decoder: Arc::clone(&decoders.legacy),
            },
            _ => return None,
        };
        Some(Self {
            transfer,
            received: 0,
        })
    }

    /// Fragments accepted so far
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Completion in `[0, 1]`
    pub fn progress_fraction(&self) -> f64 {
        match &self.transfer {
            Transfer::Fountain(decoder) => decoder.estimated_percent_complete().clamp(0.0, 1.0),
            Transfer::Legacy { assembly, .. } => match assembly.total() {
                0 => 0.0,
                total => f64::from(assembly.have()) / f64::from(total),
            },
        }
    }

    /// Check if every unit has arrived. A complete transfer that still
    /// failed to decode cannot make progress and should be replaced.
    pub fn is_complete(&self) -> bool {
        match &self.transfer {
            Transfer::Fountain(decoder) => decoder.is_complete(),
            Transfer::Legacy { assembly, .. } => assembly.is_complete(),
        }
    }

    /// Feed one fragment
    pub fn receive(&mut self, raw: &str, fragment: &Classified) -> Result<AccumulatorStep> {
        let step = match (&mut self.transfer, fragment) {
            (Transfer::Fountain(decoder), Classified::UrV2Part | Classified::BbqrPart) => {
                decoder.receive_part(raw)?;
                if decoder.is_complete() {
                    AccumulatorStep::Complete {
                        payload: decoder.result()?,
                        source: PayloadSource::Multipart,
                        total: FOUNTAIN_PROGRESS_SCALE,
                    }
                } else {
                    let fraction = decoder.estimated_percent_complete().clamp(0.0, 1.0);
                    AccumulatorStep::Progress {
                        have: (fraction * f64::from(FOUNTAIN_PROGRESS_SCALE)).floor() as u32,
                        total: FOUNTAIN_PROGRESS_SCALE,
                    }
                }
            }
            (Transfer::Legacy { assembly, decoder }, Classified::UrV1Part { index, total }) => {
                if assembly.insert(*index, *total, raw)? {
                    let hex_payload = decoder.decode(&assembly.ordered_parts())?;
                    AccumulatorStep::Complete {
                        payload: handoff::finish_legacy_payload(&hex_payload)?,
                        source: PayloadSource::LegacyUr,
                        total: assembly.total(),
                    }
                } else {
                    AccumulatorStep::Progress {
                        have: assembly.have(),
                        total: assembly.total(),
                    }
                }
            }
            (transfer, other) => {
                let expected = match transfer {
                    Transfer::Fountain(_) => "UR v2 / BBQR",
                    Transfer::Legacy { .. } => "UR v1",
                };
                return Err(Error::TransferMismatch(format!(
                    "{} fragment in a {} transfer",
                    other.kind().name(),
                    expected
                )));
            }
        };
        self.received += 1;
        Ok(step)
    }
}
