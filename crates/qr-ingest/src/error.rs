//! Error types for fragment ingestion
//!
//! Nothing in here ever reaches the payload sink. Fragment-level errors are
//! logged and swallowed by the session; they exist so the individual stages
//! can report *why* a fragment was discarded.

use std::fmt;

/// Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by an external multi-part decoder.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct DecodeError(pub String);

impl DecodeError {
    /// Create a decode error from any message
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Ingestion errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Fragment rejected by the decoder
    #[error("Malformed fragment: {0}")]
    MalformedFragment(#[from] DecodeError),

    /// Legacy UR workload could not be parsed
    #[error("Invalid workload: {0}")]
    InvalidWorkload(String),

    /// Fragment belongs to a different transfer than the one in progress
    #[error("Transfer mismatch: {0}")]
    TransferMismatch(String),

    /// Base43 decoding failed
    #[error("Invalid base43: {0}")]
    InvalidBase43(String),

    /// Bytes are not a well-formed PSBT
    #[error("Invalid PSBT: {0}")]
    InvalidPsbt(String),

    /// Hex decoding failed
    #[error("Hex error: {0}")]
    Hex(#[from] hex::FromHexError),

    /// Configuration could not be parsed
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    /// Get error category for logging/metrics
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::MalformedFragment(_) | Error::InvalidWorkload(_) | Error::Hex(_) => {
                ErrorCategory::Fragment
            }
            Error::TransferMismatch(_) => ErrorCategory::Transfer,
            Error::InvalidBase43(_) | Error::InvalidPsbt(_) => ErrorCategory::Probe,
            Error::Config(_) => ErrorCategory::Config,
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A single fragment was unusable
    Fragment,
    /// Fragment did not match the transfer in progress
    Transfer,
    /// Single-payload probing (base43 / PSBT)
    Probe,
    /// Configuration loading
    Config,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Fragment => write!(f, "Fragment"),
            ErrorCategory::Transfer => write!(f, "Transfer"),
            ErrorCategory::Probe => write!(f, "Probe"),
            ErrorCategory::Config => write!(f, "Config"),
        }
    }
}
