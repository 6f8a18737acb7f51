use anyhow::{Context, Result};

use super::traits::serializer::Serializer;

// Lowercase hex, the node's encoding for hashes, keys and CLValue bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct Base16Serializer;

impl Serializer for Base16Serializer {
    fn serialize(&self, data: &[u8]) -> String {
        hex::encode(data)
    }

    fn deserialize(&self, s: &str) -> Result<Vec<u8>> {
        hex::decode(s).with_context(|| format!("Failed to decode Base16 string: '{}'", s))
    }
}

/// Decodes exactly 32 bytes of hex, as used by every hash-like identifier.
pub fn decode_hash(s: &str) -> Result<[u8; 32]> {
    let bytes = Base16Serializer.deserialize(s)?;
    bytes
        .as_slice()
        .try_into()
        .with_context(|| format!("Expected 32 bytes, got {} in '{}'", bytes.len(), s))
}
