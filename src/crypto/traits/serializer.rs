use anyhow::Result;

// Text encodings used for node-facing identifiers and dictionary item keys.
pub trait Serializer: Send + Sync {
    fn serialize(&self, data: &[u8]) -> String;
    fn deserialize(&self, s: &str) -> Result<Vec<u8>>;
}
