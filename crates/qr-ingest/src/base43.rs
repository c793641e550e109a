//! Base43 decoding
//!
//! Base43 is the QR-friendly alphabet some desktop wallets use to export a
//! PSBT in a single code. Every character is in the QR alphanumeric set, so
//! the code stays dense. Leading `0` characters encode leading zero bytes.

use crate::{Error, Result};

/// Base43 alphabet
pub const ALPHABET: &[u8; 43] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ$*+-./:";

fn digit(c: u8) -> Option<u32> {
    ALPHABET.iter().position(|&a| a == c).map(|p| p as u32)
}

/// Decode a base43 string into bytes
pub fn decode(input: &str) -> Result<Vec<u8>> {
    if input.is_empty() {
        return Err(Error::InvalidBase43("empty input".to_string()));
    }

    // Little-endian big number, multiplied by 43 per character
    let mut bytes: Vec<u8> = Vec::with_capacity(input.len());
    for (pos, c) in input.bytes().enumerate() {
        let mut carry = digit(c).ok_or_else(|| {
            Error::InvalidBase43(format!("invalid character {:?} at {}", c as char, pos))
        })?;
        for byte in bytes.iter_mut() {
            carry += u32::from(*byte) * 43;
            *byte = (carry & 0xff) as u8;
            carry >>= 8;
        }
        while carry > 0 {
            bytes.push((carry & 0xff) as u8);
            carry >>= 8;
        }
    }

    let zeros = input.bytes().take_while(|&c| c == ALPHABET[0]).count();
    bytes.extend(std::iter::repeat(0u8).take(zeros));
    bytes.reverse();
    Ok(bytes)
}

/// Encode bytes as base43
pub fn encode(data: &[u8]) -> String {
    let zeros = data.iter().take_while(|&&b| b == 0).count();

    // Little-endian base-43 digits
    let mut digits: Vec<u8> = Vec::with_capacity(data.len() * 3 / 2);
    for &byte in &data[zeros..] {
        let mut carry = u32::from(byte);
        for d in digits.iter_mut() {
            carry += u32::from(*d) << 8;
            *d = (carry % 43) as u8;
            carry /= 43;
        }
        while carry > 0 {
            digits.push((carry % 43) as u8);
            carry /= 43;
        }
    }

    let mut out = String::with_capacity(zeros + digits.len());
    out.extend(std::iter::repeat(ALPHABET[0] as char).take(zeros));
    out.extend(digits.iter().rev().map(|&d| ALPHABET[d as usize] as char));
    out
}
