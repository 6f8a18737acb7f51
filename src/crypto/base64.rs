use anyhow::{Context, Result};
use base64::{Engine, engine::general_purpose::STANDARD};

use super::traits::serializer::Serializer;

// Standard padded base64, the contract's encoding for `balances` item keys
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64Serializer;

impl Serializer for Base64Serializer {
    fn serialize(&self, data: &[u8]) -> String {
        STANDARD.encode(data)
    }

    fn deserialize(&self, s: &str) -> Result<Vec<u8>> {
        STANDARD
            .decode(s)
            .with_context(|| format!("Failed to decode Base64 string: '{}'", s))
    }
}
