use alloy_primitives::{U256, U512};
use anyhow::{Context, Result, anyhow, bail};
use byteorder::{LittleEndian, ReadBytesExt};

use crate::{
    basic_elements::{
        keys::{Key, PublicKey},
        serializers::{
            bytes_to_u256, bytes_to_u512, length_prefix, string_to_bytes, u32_to_bytes,
            u64_to_bytes, u256_to_bytes, u512_to_bytes,
        },
    },
    types::CLType,
};

use super::next_arg::NextArg;

// 32 / 8 bits = 4 bytes
pub const BYTES_32_OFFSET: usize = 4;
// 64 / 8 bits = 8 bytes
pub const BYTES_64_OFFSET: usize = 8;
pub const DEFAULT_OFFSET: usize = 0;

/// Types with a `bytesrepr` form that can be embedded in an [`Args`] buffer.
pub trait Serializable: Sized {
    fn serialize(&self) -> Vec<u8>;

    /// Deserializes from `data` starting at `offset`, returning the value and the
    /// offset just past it.
    fn deserialize(data: &[u8], offset: usize) -> Result<(Self, usize)>;
}

/// Little-endian `bytesrepr` writer and reader.
///
/// Writers (`add_*`) append to the buffer and chain; readers (`next_*`) consume
/// from the current offset and fail when the buffer runs short.
#[derive(Debug, Clone, Default)]
pub struct Args {
    serialized: Vec<u8>,
    offset: usize,
}

impl Args {
    pub fn new() -> Self {
        Self {
            serialized: Vec::new(),
            offset: DEFAULT_OFFSET,
        }
    }

    /// Creates Args from existing serialized data, ready for deserialization.
    pub fn from_bytes(serialized: Vec<u8>) -> Self {
        Self {
            serialized,
            offset: DEFAULT_OFFSET,
        }
    }

    pub fn get_offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.serialized.len().saturating_sub(self.offset)
    }

    pub fn serialize(&self) -> Vec<u8> {
        self.serialized.clone()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.serialized
    }

    pub fn get_serialized_buffer(&self) -> &[u8] {
        &self.serialized
    }

    fn read_bytes(&mut self, len: usize) -> Result<&[u8]> {
        let current_offset = self.offset;
        let end_offset = current_offset.checked_add(len).ok_or_else(|| {
            anyhow!(
                "Offset overflow while trying to read {} bytes from offset {}",
                len,
                current_offset
            )
        })?;

        if end_offset > self.serialized.len() {
            bail!(
                "Not enough bytes to read. Wanted {} bytes from offset {}, but buffer length is {}",
                len,
                current_offset,
                self.serialized.len()
            );
        }

        self.offset = end_offset;
        Ok(&self.serialized[current_offset..end_offset])
    }

    // --- Deserialization Methods (`next*`) ---

    pub fn next_u8(&mut self) -> Result<u8> {
        self.read_bytes(1)?.read_u8().context("Failed to read u8")
    }

    pub fn next_u32(&mut self) -> Result<u32> {
        self.read_bytes(BYTES_32_OFFSET)?
            .read_u32::<LittleEndian>()
            .context("Failed to read u32")
    }

    pub fn next_u64(&mut self) -> Result<u64> {
        self.read_bytes(BYTES_64_OFFSET)?
            .read_u64::<LittleEndian>()
            .context("Failed to read u64")
    }

    /// Reads a length-tagged, trimmed U256.
    pub fn next_u256(&mut self) -> Result<U256> {
        let len = self.next_u8().context("Failed to read U256 length")? as usize;
        let le_bytes = self.read_bytes(len).context("Failed to read U256")?;
        bytes_to_u256(le_bytes)
    }

    pub fn next_u512(&mut self) -> Result<U512> {
        let len = self.next_u8().context("Failed to read U512 length")? as usize;
        let le_bytes = self.read_bytes(len).context("Failed to read U512")?;
        bytes_to_u512(le_bytes)
    }

    /// Reads a boolean. Only `0` and `1` are valid.
    pub fn next_bool(&mut self) -> Result<bool> {
        match self.next_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => bail!("Invalid bool byte: {}", other),
        }
    }

    /// Reads the next string from the buffer (reads length as u32, then UTF-8 bytes).
    pub fn next_string(&mut self) -> Result<String> {
        let len = self.next_u32()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec())
            .with_context(|| format!("Failed to decode UTF-8 string with length {}", len))
    }

    /// Reads a fixed-size byte array with no length prefix.
    pub fn next_fixed<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn next_key(&mut self) -> Result<Key> {
        self.next_serializable::<Key>()
    }

    pub fn next_serializable<T: Serializable>(&mut self) -> Result<T> {
        let (instance, new_offset) = T::deserialize(&self.serialized, self.offset)?;
        if new_offset < self.offset || new_offset > self.serialized.len() {
            bail!(
                "Invalid offset {} returned by {}::deserialize (previous offset {}, buffer length {})",
                new_offset,
                std::any::type_name::<T>(),
                self.offset,
                self.serialized.len()
            );
        }
        self.offset = new_offset;
        Ok(instance)
    }

    /// Reads a `u32` count followed by that many elements of `element_type`.
    pub fn next_list<T>(&mut self, element_type: &CLType) -> Result<Vec<T>>
    where
        Args: NextArg<T>,
    {
        let len = self.next_u32()? as usize;
        let mut result = Vec::with_capacity(len.min(self.remaining()));
        for _ in 0..len {
            result.push(self.next_arg(element_type)?);
        }
        Ok(result)
    }

    // --- Serialization Methods (`add*`) ---

    pub fn add_u8(&mut self, value: u8) -> &mut Self {
        self.serialized.push(value);
        self
    }

    pub fn add_u32(&mut self, value: u32) -> &mut Self {
        self.serialized.extend_from_slice(&u32_to_bytes(value));
        self
    }

    pub fn add_u64(&mut self, value: u64) -> &mut Self {
        self.serialized.extend_from_slice(&u64_to_bytes(value));
        self
    }

    pub fn add_u256(&mut self, value: U256) -> &mut Self {
        self.serialized.extend_from_slice(&u256_to_bytes(value));
        self
    }

    pub fn add_u512(&mut self, value: U512) -> &mut Self {
        self.serialized.extend_from_slice(&u512_to_bytes(value));
        self
    }

    pub fn add_bool(&mut self, value: bool) -> &mut Self {
        self.add_u8(u8::from(value))
    }

    /// Adds a string to the buffer (length as u32, then UTF-8 bytes).
    pub fn add_string(&mut self, value: &str) -> &mut Self {
        self.serialized.extend_from_slice(&string_to_bytes(value));
        self
    }

    /// Adds a byte array to the buffer (length as u32, then bytes).
    pub fn add_bytes(&mut self, value: &[u8]) -> &mut Self {
        self.serialized
            .extend_from_slice(&length_prefix(value.len()));
        self.serialized.extend_from_slice(value);
        self
    }

    /// Adds raw bytes with no length prefix.
    pub fn add_fixed_bytes(&mut self, value: &[u8]) -> &mut Self {
        self.serialized.extend_from_slice(value);
        self
    }

    pub fn add_key(&mut self, value: &Key) -> &mut Self {
        self.add_serializable(value)
    }

    pub fn add_public_key(&mut self, value: &PublicKey) -> &mut Self {
        self.add_serializable(value)
    }

    pub fn add_serializable<T: Serializable>(&mut self, value: &T) -> &mut Self {
        let bytes = value.serialize();
        self.serialized.extend_from_slice(&bytes);
        self
    }

    /// Adds a `u32` element count followed by each element.
    pub fn add_serializable_list<T: Serializable>(&mut self, values: &[T]) -> &mut Self {
        self.serialized
            .extend_from_slice(&length_prefix(values.len()));
        for value in values {
            self.add_serializable(value);
        }
        self
    }
}
