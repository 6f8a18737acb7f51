use alloy_primitives::{U256, U512};
use anyhow::{Result, bail};

// Casper encodes big unsigned integers as one length byte followed by the
// little-endian bytes with trailing zeros trimmed. Zero is the single byte `0`.

fn trimmed_le_bytes(le_bytes: &[u8]) -> Vec<u8> {
    let len = le_bytes
        .iter()
        .rposition(|byte| *byte != 0)
        .map_or(0, |index| index + 1);
    let mut bytes = Vec::with_capacity(1 + len);
    // len <= 64, fits in a byte
    bytes.push(len as u8);
    bytes.extend_from_slice(&le_bytes[..len]);
    bytes
}

pub fn u256_to_bytes(value: U256) -> Vec<u8> {
    trimmed_le_bytes(&value.to_le_bytes::<32>())
}

pub fn u512_to_bytes(value: U512) -> Vec<u8> {
    trimmed_le_bytes(&value.to_le_bytes::<64>())
}

/// Reads the trimmed little-endian body of a U256 (without its length byte).
pub fn bytes_to_u256(le_bytes: &[u8]) -> Result<U256> {
    if le_bytes.len() > 32 {
        bail!("U256 cannot hold {} bytes", le_bytes.len());
    }
    match U256::try_from_le_slice(le_bytes) {
        Some(value) => Ok(value),
        None => bail!("Invalid U256 bytes: {}", hex::encode(le_bytes)),
    }
}

pub fn bytes_to_u512(le_bytes: &[u8]) -> Result<U512> {
    if le_bytes.len() > 64 {
        bail!("U512 cannot hold {} bytes", le_bytes.len());
    }
    match U512::try_from_le_slice(le_bytes) {
        Some(value) => Ok(value),
        None => bail!("Invalid U512 bytes: {}", hex::encode(le_bytes)),
    }
}

pub fn u32_to_bytes(value: u32) -> Vec<u8> {
    value.to_le_bytes().to_vec()
}

pub fn u64_to_bytes(value: u64) -> Vec<u8> {
    value.to_le_bytes().to_vec()
}

/// Length-prefixed UTF-8, the `bytesrepr` form of `String`.
pub fn string_to_bytes(value: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(4 + value.len());
    bytes.extend_from_slice(&length_prefix(value.len()));
    bytes.extend_from_slice(value.as_bytes());
    bytes
}

/// `u32` little-endian length prefix.
///
/// # Panics
///
/// Panics if `len` exceeds `u32::MAX`, which no value passed to the node can reach.
pub fn length_prefix(len: usize) -> [u8; 4] {
    match u32::try_from(len) {
        Ok(len) => len.to_le_bytes(),
        Err(_) => panic!(
            "Length {} exceeds maximum allowed size {}",
            len,
            u32::MAX
        ),
    }
}
