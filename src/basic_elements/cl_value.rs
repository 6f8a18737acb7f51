use alloy_primitives::{U256, U512};
use anyhow::{Context, Result, bail};
use serde_json::{Value, json};

use crate::{
    basic_elements::{
        args::{Args, Serializable},
        keys::Key,
        next_arg::NextArg,
        serializers::length_prefix,
    },
    crypto::{base16::Base16Serializer, traits::serializer::Serializer},
    types::CLType,
};

/// A typed value as stored by the node: `bytesrepr` body plus its `CLType`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CLValue {
    cl_type: CLType,
    bytes: Vec<u8>,
}

impl CLValue {
    pub fn new(cl_type: CLType, bytes: Vec<u8>) -> Self {
        Self { cl_type, bytes }
    }

    pub fn from_u8(value: u8) -> Self {
        Self::new(CLType::U8, vec![value])
    }

    pub fn from_bool(value: bool) -> Self {
        Self::new(CLType::Bool, vec![u8::from(value)])
    }

    pub fn from_u256(value: U256) -> Self {
        let mut args = Args::new();
        args.add_u256(value);
        Self::new(CLType::U256, args.into_bytes())
    }

    pub fn from_u512(value: U512) -> Self {
        let mut args = Args::new();
        args.add_u512(value);
        Self::new(CLType::U512, args.into_bytes())
    }

    pub fn from_string(value: &str) -> Self {
        let mut args = Args::new();
        args.add_string(value);
        Self::new(CLType::String, args.into_bytes())
    }

    pub fn from_key(value: &Key) -> Self {
        Self::new(CLType::Key, value.serialize())
    }

    pub fn from_key_list(values: &[Key]) -> Self {
        let mut args = Args::new();
        args.add_serializable_list(values);
        Self::new(CLType::List(Box::new(CLType::Key)), args.into_bytes())
    }

    pub fn cl_type(&self) -> &CLType {
        &self.cl_type
    }

    pub fn inner_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Decodes the body as `T`, requiring the whole body to be consumed.
    pub fn to_typed<T>(&self) -> Result<T>
    where
        Args: NextArg<T>,
    {
        let mut args = Args::from_bytes(self.bytes.clone());
        let value = args.next_arg(&self.cl_type)?;
        if args.remaining() != 0 {
            bail!(
                "{} trailing bytes after {:?} value",
                args.remaining(),
                self.cl_type
            );
        }
        Ok(value)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(4 + self.bytes.len() + 2);
        bytes.extend_from_slice(&length_prefix(self.bytes.len()));
        bytes.extend_from_slice(&self.bytes);
        self.cl_type.append_bytes(&mut bytes);
        bytes
    }

    pub fn to_json(&self) -> Value {
        json!({
            "cl_type": self.cl_type.to_json(),
            "bytes": Base16Serializer.serialize(&self.bytes),
            "parsed": Value::Null,
        })
    }

    /// Parses the node's `{"cl_type": …, "bytes": "<hex>", "parsed": …}` form.
    pub fn from_json(value: &Value) -> Result<Self> {
        let cl_type = CLType::from_json(
            value
                .get("cl_type")
                .context("CLValue without cl_type")?,
        )?;
        let bytes_hex = value
            .get("bytes")
            .and_then(Value::as_str)
            .context("CLValue without bytes")?;
        let bytes = Base16Serializer
            .deserialize(bytes_hex)
            .context("CLValue bytes are not hex")?;
        Ok(Self::new(cl_type, bytes))
    }
}

/// Ordered named arguments passed to a session or payment item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeArgs {
    args: Vec<(String, CLValue)>,
}

impl RuntimeArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces `name`, keeping first-insertion order.
    pub fn insert(&mut self, name: &str, value: CLValue) -> &mut Self {
        match self.args.iter_mut().find(|(existing, _)| existing == name) {
            Some((_, existing)) => *existing = value,
            None => self.args.push((name.to_string(), value)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&CLValue> {
        self.args
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.args.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut args = Args::new();
        args.add_fixed_bytes(&length_prefix(self.args.len()));
        for (name, value) in &self.args {
            args.add_string(name).add_fixed_bytes(&value.to_bytes());
        }
        args.into_bytes()
    }

    /// `[[name, clvalue], …]`, as accepted by `account_put_deploy`.
    pub fn to_json(&self) -> Value {
        Value::Array(
            self.args
                .iter()
                .map(|(name, value)| json!([name, value.to_json()]))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic_elements::keys::AccountHash;

    #[test]
    fn test_cl_value_bytes() {
        let value = CLValue::from_u256(U256::from(100u64));
        // length 2, body [1, 100], tag U256
        assert_eq!(value.to_bytes(), vec![2, 0, 0, 0, 1, 100, 7]);

        let list = CLValue::from_key_list(&[]);
        assert_eq!(list.to_bytes(), vec![4, 0, 0, 0, 0, 0, 0, 0, 14, 11]);
    }

    #[test]
    fn test_cl_value_from_node_json() -> Result<()> {
        let value = CLValue::from_json(&json!({
            "cl_type": "U8",
            "bytes": "09",
            "parsed": 9
        }))?;
        assert_eq!(value.to_typed::<u8>()?, 9);

        let supply = CLValue::from_json(&json!({
            "cl_type": "U256",
            "bytes": "0400ca9a3b",
            "parsed": "1000000000"
        }))?;
        assert_eq!(supply.to_typed::<U256>()?, U256::from(1_000_000_000u64));

        let name = CLValue::from_json(&json!({
            "cl_type": "String",
            "bytes": "0400000054455354",
            "parsed": "TEST"
        }))?;
        assert_eq!(name.to_typed::<String>()?, "TEST");
        assert!(name.to_typed::<U256>().is_err());

        Ok(())
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let value = CLValue::new(CLType::U8, vec![1, 2]);
        assert!(value.to_typed::<u8>().is_err());
    }

    #[test]
    fn test_runtime_args_order_and_replace() -> Result<()> {
        let recipient = Key::Account(AccountHash::new([3; 32]));
        let mut args = RuntimeArgs::new();
        args.insert("recipient", CLValue::from_key(&recipient))
            .insert("amount", CLValue::from_u256(U256::from(1u64)))
            .insert("amount", CLValue::from_u256(U256::from(2u64)));

        assert_eq!(args.len(), 2);
        assert_eq!(args.names().collect::<Vec<_>>(), vec!["recipient", "amount"]);
        assert_eq!(
            args.get("amount").map(CLValue::to_typed::<U256>).transpose()?,
            Some(U256::from(2u64))
        );

        let json = args.to_json();
        assert_eq!(json[0][0], "recipient");
        assert_eq!(json[1][1]["cl_type"], "U256");
        assert_eq!(json[1][1]["bytes"], "0102");

        let bytes = args.to_bytes();
        assert_eq!(&bytes[..4], &[2, 0, 0, 0]);

        Ok(())
    }
}
