//! Shared fixtures for session tests
#![allow(dead_code)]

use parking_lot::Mutex;
use qr_ingest::{
    DecodeError, Decoders, Handoff, LegacyUrDecoder, MultipartDecoder, ScanConfig, ScanOutcome,
    ScanSession,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Log output for failing tests; `RUST_LOG=qr_ingest=debug`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Parts seen by the fountain decoders, in arrival order
pub type ReceiveLog = Arc<Mutex<Vec<String>>>;

/// Fountain stand-in understanding `ur:<type>/<i>-<n>/<chunk>` and BBQR
/// `B$<enc><type><total:2 base36><index:2 base36><chunk>`. Completes once
/// every index is present; the payload is the chunks in index order.
/// Chunks containing `BAD` fail.
pub struct FakeFountain {
    chunks: BTreeMap<u32, String>,
    total: Option<u32>,
    log: ReceiveLog,
}

impl FakeFountain {
    pub fn new(log: ReceiveLog) -> Self {
        Self {
            chunks: BTreeMap::new(),
            total: None,
            log,
        }
    }
}

fn parse_part(part: &str) -> Result<(u32, u32, String), DecodeError> {
    if let Some(body) = part.strip_prefix("B$") {
        let header = |range: std::ops::Range<usize>| {
            body.get(range)
                .and_then(|digits| u32::from_str_radix(digits, 36).ok())
                .ok_or_else(|| DecodeError::new("bad bbqr header"))
        };
        let total = header(2..4)?;
        let index = header(4..6)?;
        return Ok((index, total, body[6..].to_string()));
    }

    let pieces: Vec<&str> = part.split('/').collect();
    if pieces.len() != 3 {
        return Err(DecodeError::new("bad ur shape"));
    }
    let (index, total) = pieces[1]
        .split_once('-')
        .ok_or_else(|| DecodeError::new("missing sequence"))?;
    let index: u32 = index.parse().map_err(|_| DecodeError::new("bad index"))?;
    let total: u32 = total.parse().map_err(|_| DecodeError::new("bad total"))?;
    let index = index
        .checked_sub(1)
        .ok_or_else(|| DecodeError::new("ur sequence is 1-based"))?;
    Ok((index, total, pieces[2].to_string()))
}

impl MultipartDecoder for FakeFountain {
    fn receive_part(&mut self, part: &str) -> Result<(), DecodeError> {
        self.log.lock().push(part.to_string());
        let (index, total, chunk) = parse_part(part)?;
        if chunk.contains("BAD") {
            return Err(DecodeError::new("invalid checksum"));
        }
        match self.total {
            Some(expected) if expected != total => {
                return Err(DecodeError::new("part from another transfer"))
            }
            _ => self.total = Some(total),
        }
        self.chunks.entry(index).or_insert(chunk);
        Ok(())
    }

    fn is_complete(&self) -> bool {
        self.total
            .is_some_and(|total| self.chunks.len() as u32 == total)
    }

    fn estimated_percent_complete(&self) -> f64 {
        match self.total {
            Some(total) if total > 0 => self.chunks.len() as f64 / total as f64,
            _ => 0.0,
        }
    }

    fn result(&mut self) -> Result<String, DecodeError> {
        if !self.is_complete() {
            return Err(DecodeError::new("incomplete"));
        }
        Ok(self.chunks.values().cloned().collect())
    }
}

/// Legacy v1 stand-in: the hex payload is the concatenated fragment bodies
pub struct HexJoin;

impl LegacyUrDecoder for HexJoin {
    fn decode(&self, parts: &[String]) -> Result<String, DecodeError> {
        Ok(parts
            .iter()
            .filter_map(|p| p.rsplit('/').next())
            .collect())
    }
}

pub fn decoders(log: ReceiveLog) -> Decoders {
    Decoders::new(
        move || Box::new(FakeFountain::new(Arc::clone(&log))) as Box<dyn MultipartDecoder>,
        HexJoin,
    )
}

/// Payloads handed to the sink
pub type Delivered = Arc<Mutex<Vec<ScanOutcome>>>;

pub fn recording_handoff() -> (Handoff, Delivered) {
    let delivered: Delivered = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&delivered);
    let handoff = Handoff::new(Arc::new(move |outcome: ScanOutcome| {
        sink.lock().push(outcome)
    }));
    (handoff, delivered)
}

/// Session plus everything observable about it
pub struct Harness {
    pub session: ScanSession,
    pub delivered: Delivered,
    pub received: ReceiveLog,
}

pub fn harness(config: ScanConfig) -> Harness {
    init_tracing();
    let received: ReceiveLog = Arc::new(Mutex::new(Vec::new()));
    let (handoff, delivered) = recording_handoff();
    Harness {
        session: ScanSession::new(config, decoders(Arc::clone(&received)), handoff),
        delivered,
        received,
    }
}

/// v0 PSBT with one input and one output
pub fn sample_psbt() -> Vec<u8> {
    let mut tx = Vec::new();
    tx.extend_from_slice(&2u32.to_le_bytes());
    tx.push(1);
    tx.extend_from_slice(&[0xab; 32]);
    tx.extend_from_slice(&0u32.to_le_bytes());
    tx.push(0);
    tx.extend_from_slice(&0xffff_fffdu32.to_le_bytes());
    tx.push(1);
    tx.extend_from_slice(&50_000u64.to_le_bytes());
    tx.push(22);
    tx.extend_from_slice(&[0x00, 0x14]);
    tx.extend_from_slice(&[0x11; 20]);
    tx.extend_from_slice(&0u32.to_le_bytes());

    let mut psbt = vec![0x70, 0x73, 0x62, 0x74, 0xff];
    psbt.extend_from_slice(&[1, 0x00, tx.len() as u8]);
    psbt.extend_from_slice(&tx);
    psbt.extend_from_slice(&[0, 0, 0]);
    psbt
}
