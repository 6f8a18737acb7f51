pub mod event;
pub mod execution;
pub mod token;

use std::{fmt, str::FromStr};

use anyhow::{Context, Result, anyhow, bail};
use serde_json::{Value, json};

use crate::{
    basic_elements::keys::{EntityAddr, Key, PublicKey},
    constants::{ENTITY_CONTRACT_PREFIX, LEGACY_CONTRACT_PREFIX},
    crypto::base16::decode_hash,
};

/// Result of a point lookup. Not-found is a normal state, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Found(value) => Lookup::Found(f(value)),
            Lookup::NotFound => Lookup::NotFound,
        }
    }

    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound => None,
        }
    }
}

/// Identifies one contract-owned dictionary item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryQuery {
    pub contract: ContractAddress,
    pub dictionary_name: String,
    pub item_key: String,
}

/// Casper `CLType`, the type descriptor carried by every `CLValue`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CLType {
    Bool,
    I32,
    I64,
    U8,
    U32,
    U64,
    U128,
    U256,
    U512,
    Unit,
    String,
    Key,
    URef,
    Option(Box<CLType>),
    List(Box<CLType>),
    ByteArray(u32),
    Map(Box<CLType>, Box<CLType>),
    Any,
    PublicKey,
}

impl CLType {
    fn tag(&self) -> u8 {
        match self {
            CLType::Bool => 0,
            CLType::I32 => 1,
            CLType::I64 => 2,
            CLType::U8 => 3,
            CLType::U32 => 4,
            CLType::U64 => 5,
            CLType::U128 => 6,
            CLType::U256 => 7,
            CLType::U512 => 8,
            CLType::Unit => 9,
            CLType::String => 10,
            CLType::Key => 11,
            CLType::URef => 12,
            CLType::Option(_) => 13,
            CLType::List(_) => 14,
            CLType::ByteArray(_) => 15,
            CLType::Map(_, _) => 17,
            CLType::Any => 21,
            CLType::PublicKey => 22,
        }
    }

    /// Appends the `bytesrepr` form of the type descriptor.
    pub fn append_bytes(&self, buffer: &mut Vec<u8>) {
        buffer.push(self.tag());
        match self {
            CLType::Option(inner) | CLType::List(inner) => inner.append_bytes(buffer),
            CLType::ByteArray(len) => buffer.extend_from_slice(&len.to_le_bytes()),
            CLType::Map(key, value) => {
                key.append_bytes(buffer);
                value.append_bytes(buffer);
            }
            _ => {}
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            CLType::Option(inner) => json!({ "Option": inner.to_json() }),
            CLType::List(inner) => json!({ "List": inner.to_json() }),
            CLType::ByteArray(len) => json!({ "ByteArray": len }),
            CLType::Map(key, value) => json!({ "Map": { "key": key.to_json(), "value": value.to_json() } }),
            simple => Value::String(simple.simple_name().to_string()),
        }
    }

    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::String(name) => Self::from_simple_name(name),
            Value::Object(map) => {
                let (name, inner) = map
                    .iter()
                    .next()
                    .context("Empty object in CLType description")?;
                match name.as_str() {
                    "Option" => Ok(CLType::Option(Box::new(Self::from_json(inner)?))),
                    "List" => Ok(CLType::List(Box::new(Self::from_json(inner)?))),
                    "ByteArray" => {
                        let len = inner
                            .as_u64()
                            .context("ByteArray length must be a number")?;
                        Ok(CLType::ByteArray(
                            u32::try_from(len).context("ByteArray length out of range")?,
                        ))
                    }
                    "Map" => {
                        let key = inner.get("key").context("Map without key type")?;
                        let value = inner.get("value").context("Map without value type")?;
                        Ok(CLType::Map(
                            Box::new(Self::from_json(key)?),
                            Box::new(Self::from_json(value)?),
                        ))
                    }
                    other => bail!("Unsupported CLType: {}", other),
                }
            }
            other => Err(anyhow!("Invalid CLType description: {}", other)),
        }
    }

    fn simple_name(&self) -> &'static str {
        match self {
            CLType::Bool => "Bool",
            CLType::I32 => "I32",
            CLType::I64 => "I64",
            CLType::U8 => "U8",
            CLType::U32 => "U32",
            CLType::U64 => "U64",
            CLType::U128 => "U128",
            CLType::U256 => "U256",
            CLType::U512 => "U512",
            CLType::Unit => "Unit",
            CLType::String => "String",
            CLType::Key => "Key",
            CLType::URef => "URef",
            CLType::Any => "Any",
            CLType::PublicKey => "PublicKey",
            CLType::Option(_) => "Option",
            CLType::List(_) => "List",
            CLType::ByteArray(_) => "ByteArray",
            CLType::Map(_, _) => "Map",
        }
    }

    fn from_simple_name(name: &str) -> Result<Self> {
        Ok(match name {
            "Bool" => CLType::Bool,
            "I32" => CLType::I32,
            "I64" => CLType::I64,
            "U8" => CLType::U8,
            "U32" => CLType::U32,
            "U64" => CLType::U64,
            "U128" => CLType::U128,
            "U256" => CLType::U256,
            "U512" => CLType::U512,
            "Unit" => CLType::Unit,
            "String" => CLType::String,
            "Key" => CLType::Key,
            "URef" => CLType::URef,
            "Any" => CLType::Any,
            "PublicKey" => CLType::PublicKey,
            other => bail!("Unsupported CLType: {}", other),
        })
    }
}

/// A deployed CEP-18 contract. The two variants belong to incompatible contract
/// generations and select the account-key encoding used for every party argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractAddress {
    /// `hash-…`, contracts installed before addressable entities.
    LegacyHash([u8; 32]),
    /// `entity-contract-…`.
    EntityAddress([u8; 32]),
}

impl ContractAddress {
    pub fn is_legacy(&self) -> bool {
        matches!(self, ContractAddress::LegacyHash(_))
    }

    pub fn hash_bytes(&self) -> &[u8; 32] {
        match self {
            ContractAddress::LegacyHash(hash) | ContractAddress::EntityAddress(hash) => hash,
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            ContractAddress::LegacyHash(_) => LEGACY_CONTRACT_PREFIX,
            ContractAddress::EntityAddress(_) => ENTITY_CONTRACT_PREFIX,
        }
    }

    /// Hex of the hash with the addressing prefix stripped.
    pub fn to_hex(&self) -> String {
        hex::encode(self.hash_bytes())
    }

    pub fn same_generation(&self, other: &ContractAddress) -> bool {
        self.is_legacy() == other.is_legacy()
    }

    /// Canonical key of an account for this contract generation.
    pub fn account_key(&self, public_key: &PublicKey) -> Key {
        let account_hash = public_key.account_hash();
        match self {
            ContractAddress::LegacyHash(_) => Key::Account(account_hash),
            ContractAddress::EntityAddress(_) => {
                Key::AddressableEntity(EntityAddr::Account(account_hash.value()))
            }
        }
    }

    /// True when `formatted` (any prefix or none) names this contract's hash.
    pub fn matches(&self, formatted: &str) -> bool {
        let hex_part = formatted.rsplit('-').next().unwrap_or(formatted);
        hex_part.eq_ignore_ascii_case(&self.to_hex())
    }
}

impl fmt::Display for ContractAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix(), self.to_hex())
    }
}

impl FromStr for ContractAddress {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(hex_part) = s.strip_prefix(ENTITY_CONTRACT_PREFIX) {
            return Ok(ContractAddress::EntityAddress(decode_hash(hex_part)?));
        }
        if let Some(hex_part) = s.strip_prefix(LEGACY_CONTRACT_PREFIX) {
            return Ok(ContractAddress::LegacyHash(decode_hash(hex_part)?));
        }
        bail!("Invalid contract hash: {}", s)
    }
}

/// Event emission mechanism chosen at install time.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventsMode {
    NoEvents = 0,
    CES = 1,
    Native = 2,
    NativeBytes = 3,
    NativeNCES = 4,
    NativeBytesNCES = 5,
}

impl EventsMode {
    pub fn from_u8(value: u8) -> Result<Self> {
        Ok(match value {
            0 => EventsMode::NoEvents,
            1 => EventsMode::CES,
            2 => EventsMode::Native,
            3 => EventsMode::NativeBytes,
            4 => EventsMode::NativeNCES,
            5 => EventsMode::NativeBytesNCES,
            other => bail!("Unknown events mode: {}", other),
        })
    }

    pub fn to_u8(&self) -> u8 {
        *self as u8
    }

    /// Whether the contract emits native messages that a subscriber can decode.
    pub fn emits_messages(&self) -> bool {
        matches!(
            self,
            EventsMode::Native
                | EventsMode::NativeBytes
                | EventsMode::NativeNCES
                | EventsMode::NativeBytesNCES
        )
    }
}

/// Role granted through `change_security`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityBadge {
    Admin = 0,
    Minter = 1,
    None = 2,
}

impl SecurityBadge {
    pub fn from_u8(value: u8) -> Result<Self> {
        Ok(match value {
            0 => SecurityBadge::Admin,
            1 => SecurityBadge::Minter,
            2 => SecurityBadge::None,
            other => bail!("Unknown security badge: {}", other),
        })
    }
}

impl FromStr for SecurityBadge {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" => Ok(SecurityBadge::Admin),
            "Minter" => Ok(SecurityBadge::Minter),
            "None" => Ok(SecurityBadge::None),
            other => bail!("Unknown security badge: {}", other),
        }
    }
}
