//! Legacy UR v1 workloads
//!
//! A v1 workload is `ur:<type>/[<i>of<n>/][<digest>/]<fragment>`. Parts are
//! collected by index and handed to the external v1 decoder once every index
//! of the announced total is present.

use crate::{Error, Result};
use std::collections::BTreeMap;

/// Largest total accepted from a sequence header
pub const MAX_WORKLOAD_PARTS: u32 = 10_000;

/// Parse an `<i>of<n>` sequence header (case-insensitive)
fn parse_sequence(piece: &str) -> Option<Result<(u32, u32)>> {
    let lower = piece.to_ascii_lowercase();
    let (index, total) = lower.split_once("of")?;
    if index.is_empty()
        || total.is_empty()
        || !index.bytes().all(|b| b.is_ascii_digit())
        || !total.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    let parsed = match (index.parse::<u32>(), total.parse::<u32>()) {
        (Ok(index), Ok(total)) => (index, total),
        _ => {
            return Some(Err(Error::InvalidWorkload(format!(
                "sequence out of range: {}",
                piece
            ))))
        }
    };
    Some(check_sequence(parsed))
}

fn check_sequence((index, total): (u32, u32)) -> Result<(u32, u32)> {
    if total == 0 || total > MAX_WORKLOAD_PARTS {
        return Err(Error::InvalidWorkload(format!("invalid total {}", total)));
    }
    if index == 0 || index > total {
        return Err(Error::InvalidWorkload(format!(
            "index {} outside 1..={}",
            index, total
        )));
    }
    Ok((index, total))
}

/// Extract `(index, total)` from a single v1 workload.
///
/// Unsequenced workloads are a complete single part, `(1, 1)`.
pub fn extract_single_workload(workload: &str) -> Result<(u32, u32)> {
    let pieces: Vec<&str> = workload.split('/').collect();
    match pieces.len() {
        2 => Ok((1, 1)),
        3 => match parse_sequence(pieces[1]) {
            Some(sequence) => sequence,
            None => Ok((1, 1)),
        },
        4 => parse_sequence(pieces[1]).unwrap_or_else(|| {
            Err(Error::InvalidWorkload(format!(
                "invalid sequence {:?}",
                pieces[1]
            )))
        }),
        n => Err(Error::InvalidWorkload(format!(
            "invalid workload pieces length {}",
            n
        ))),
    }
}

/// Parts of one legacy transfer, keyed by index
#[derive(Debug, Default)]
pub struct LegacyAssembly {
    total: Option<u32>,
    parts: BTreeMap<u32, String>,
}

impl LegacyAssembly {
    /// Create an empty assembly
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a part, replacing any earlier copy of the same index. Returns
    /// `true` when every index is present.
    pub fn insert(&mut self, index: u32, total: u32, raw: &str) -> Result<bool> {
        let (index, total) = check_sequence((index, total))?;
        match self.total {
            Some(expected) if expected != total => {
                return Err(Error::TransferMismatch(format!(
                    "part announces {} parts, transfer has {}",
                    total, expected
                )));
            }
            Some(_) => {}
            None => self.total = Some(total),
        }
        self.parts.insert(index, raw.to_string());
        Ok(self.is_complete())
    }

    /// Distinct parts received
    pub fn have(&self) -> u32 {
        self.parts.len() as u32
    }

    /// Announced total, 0 before the first part
    pub fn total(&self) -> u32 {
        self.total.unwrap_or(0)
    }

    /// Check if every part is present
    pub fn is_complete(&self) -> bool {
        self.total.is_some_and(|total| self.have() == total)
    }

    /// Parts ordered by index
    pub fn ordered_parts(&self) -> Vec<String> {
        self.parts.values().cloned().collect()
    }
}
