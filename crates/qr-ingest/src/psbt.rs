//! Structural PSBT probe
//!
//! Used by the classifier to decide whether a base43 string is a PSBT. The
//! probe walks the key/value maps and the unsigned transaction; it does not
//! interpret any of the per-input or per-output fields.

use crate::{Error, Result};

/// PSBT magic bytes: `psbt` followed by 0xff
pub const PSBT_MAGIC: [u8; 5] = [0x70, 0x73, 0x62, 0x74, 0xff];

const GLOBAL_UNSIGNED_TX: u8 = 0x00;
const GLOBAL_INPUT_COUNT: u8 = 0x04;
const GLOBAL_OUTPUT_COUNT: u8 = 0x05;
const GLOBAL_VERSION: u8 = 0xfb;

/// Shape of a structurally valid PSBT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PsbtShape {
    /// PSBT version (0 or 2)
    pub version: u32,
    /// Number of input maps
    pub inputs: usize,
    /// Number of output maps
    pub outputs: usize,
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| Error::InvalidPsbt(format!("truncated at offset {}", self.pos)))?;
        let buf = self.buf;
        let slice = &buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn compact_size(&mut self) -> Result<u64> {
        let prefix = self.byte()?;
        let value = match prefix {
            0xfd => u64::from(u16::from_le_bytes([self.byte()?, self.byte()?])),
            0xfe => {
                let b = self.take(4)?;
                u64::from(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            }
            0xff => {
                let b = self.take(8)?;
                u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
            }
            n => u64::from(n),
        };
        Ok(value)
    }

    fn length(&mut self) -> Result<usize> {
        let len = self.compact_size()?;
        usize::try_from(len).map_err(|_| Error::InvalidPsbt(format!("length {} too large", len)))
    }
}

/// Read one key/value map up to its 0x00 terminator
fn read_map<'a>(reader: &mut Reader<'a>) -> Result<Vec<(&'a [u8], &'a [u8])>> {
    let mut entries: Vec<(&'a [u8], &'a [u8])> = Vec::new();
    loop {
        let key_len = reader.length()?;
        if key_len == 0 {
            return Ok(entries);
        }
        let key = reader.take(key_len)?;
        let value_len = reader.length()?;
        let value = reader.take(value_len)?;
        if entries.iter().any(|(k, _)| *k == key) {
            return Err(Error::InvalidPsbt(format!(
                "duplicate key {}",
                hex::encode(key)
            )));
        }
        entries.push((key, value));
    }
}

fn find<'a>(map: &[(&'a [u8], &'a [u8])], key_type: u8) -> Option<&'a [u8]> {
    map.iter()
        .find(|(k, _)| k.len() == 1 && k[0] == key_type)
        .map(|(_, v)| *v)
}

fn compact_value(value: &[u8]) -> Result<usize> {
    let mut reader = Reader::new(value);
    let n = reader.length()?;
    if !reader.is_empty() {
        return Err(Error::InvalidPsbt("trailing bytes in count".to_string()));
    }
    Ok(n)
}

/// Count inputs and outputs of a non-witness unsigned transaction
fn unsigned_tx_shape(tx: &[u8]) -> Result<(usize, usize)> {
    let mut reader = Reader::new(tx);
    reader.take(4)?; // version

    let inputs = reader.length()?;
    for _ in 0..inputs {
        reader.take(36)?; // outpoint
        if reader.length()? != 0 {
            return Err(Error::InvalidPsbt("unsigned tx has a scriptSig".to_string()));
        }
        reader.take(4)?; // sequence
    }

    let outputs = reader.length()?;
    for _ in 0..outputs {
        reader.take(8)?; // amount
        let script_len = reader.length()?;
        reader.take(script_len)?;
    }

    reader.take(4)?; // locktime
    if !reader.is_empty() {
        return Err(Error::InvalidPsbt("trailing bytes in unsigned tx".to_string()));
    }
    Ok((inputs, outputs))
}

/// Validate the structure of a serialized PSBT
pub fn probe(bytes: &[u8]) -> Result<PsbtShape> {
    let mut reader = Reader::new(bytes);
    if reader.take(PSBT_MAGIC.len())? != PSBT_MAGIC {
        return Err(Error::InvalidPsbt("missing magic".to_string()));
    }

    let global = read_map(&mut reader)?;
    let version = match find(&global, GLOBAL_VERSION) {
        Some(v) if v.len() == 4 => u32::from_le_bytes([v[0], v[1], v[2], v[3]]),
        Some(_) => return Err(Error::InvalidPsbt("bad version field".to_string())),
        None => 0,
    };

    let (inputs, outputs) = match version {
        0 => {
            let tx = find(&global, GLOBAL_UNSIGNED_TX)
                .ok_or_else(|| Error::InvalidPsbt("missing unsigned tx".to_string()))?;
            unsigned_tx_shape(tx)?
        }
        2 => {
            if find(&global, GLOBAL_UNSIGNED_TX).is_some() {
                return Err(Error::InvalidPsbt("v2 must not carry unsigned tx".to_string()));
            }
            let inputs = find(&global, GLOBAL_INPUT_COUNT)
                .ok_or_else(|| Error::InvalidPsbt("missing input count".to_string()))?;
            let outputs = find(&global, GLOBAL_OUTPUT_COUNT)
                .ok_or_else(|| Error::InvalidPsbt("missing output count".to_string()))?;
            (compact_value(inputs)?, compact_value(outputs)?)
        }
        v => return Err(Error::InvalidPsbt(format!("unsupported version {}", v))),
    };

    for _ in 0..inputs.saturating_add(outputs) {
        read_map(&mut reader)?;
    }
    if !reader.is_empty() {
        return Err(Error::InvalidPsbt("trailing bytes after maps".to_string()));
    }

    Ok(PsbtShape {
        version,
        inputs,
        outputs,
    })
}

/// Returns `true` if `bytes` is a structurally valid PSBT
pub fn is_psbt(bytes: &[u8]) -> bool {
    probe(bytes).is_ok()
}

/// Minimal v0 PSBT with one input and one output, for tests
#[cfg(test)]
pub(crate) fn sample_psbt() -> Vec<u8> {
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

    let mut psbt = PSBT_MAGIC.to_vec();
    psbt.push(1);
    psbt.push(GLOBAL_UNSIGNED_TX);
    psbt.push(tx.len() as u8);
    psbt.extend_from_slice(&tx);
    psbt.push(0); // end of global map
    psbt.push(0); // input map
    psbt.push(0); // output map
    psbt
}
