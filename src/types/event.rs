use std::{collections::BTreeMap, fmt, str::FromStr};

use alloy_primitives::U256;
use anyhow::bail;

use crate::{basic_elements::keys::Key, types::SecurityBadge};

/// Names of the events a CEP-18 contract emits. Listeners subscribe by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventName {
    Mint,
    Burn,
    SetAllowance,
    IncreaseAllowance,
    DecreaseAllowance,
    Transfer,
    TransferFrom,
    ChangeSecurity,
    ChangeEventsMode,
}

impl EventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::Mint => "Mint",
            EventName::Burn => "Burn",
            EventName::SetAllowance => "SetAllowance",
            EventName::IncreaseAllowance => "IncreaseAllowance",
            EventName::DecreaseAllowance => "DecreaseAllowance",
            EventName::Transfer => "Transfer",
            EventName::TransferFrom => "TransferFrom",
            EventName::ChangeSecurity => "ChangeSecurity",
            EventName::ChangeEventsMode => "ChangeEventsMode",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Mint" => EventName::Mint,
            "Burn" => EventName::Burn,
            "SetAllowance" => EventName::SetAllowance,
            "IncreaseAllowance" => EventName::IncreaseAllowance,
            "DecreaseAllowance" => EventName::DecreaseAllowance,
            "Transfer" => EventName::Transfer,
            "TransferFrom" => EventName::TransferFrom,
            "ChangeSecurity" => EventName::ChangeSecurity,
            "ChangeEventsMode" => EventName::ChangeEventsMode,
            other => bail!("Unknown CEP-18 event: {}", other),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mint {
    pub recipient: Key,
    pub amount: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Burn {
    pub owner: Key,
    pub amount: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetAllowance {
    pub owner: Key,
    pub spender: Key,
    pub allowance: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncreaseAllowance {
    pub owner: Key,
    pub spender: Key,
    pub allowance: U256,
    pub inc_by: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecreaseAllowance {
    pub owner: Key,
    pub spender: Key,
    pub allowance: U256,
    pub decr_by: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub sender: Key,
    pub recipient: Key,
    pub amount: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferFrom {
    pub spender: Key,
    pub owner: Key,
    pub recipient: Key,
    pub amount: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSecurity {
    pub admin: Key,
    pub sec_change_map: BTreeMap<Key, SecurityBadge>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEventsMode {
    pub events_mode: u8,
}

/// Payload of one decoded contract message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cep18Event {
    Mint(Mint),
    Burn(Burn),
    SetAllowance(SetAllowance),
    IncreaseAllowance(IncreaseAllowance),
    DecreaseAllowance(DecreaseAllowance),
    Transfer(Transfer),
    TransferFrom(TransferFrom),
    ChangeSecurity(ChangeSecurity),
    ChangeEventsMode(ChangeEventsMode),
}

impl Cep18Event {
    pub fn name(&self) -> EventName {
        match self {
            Cep18Event::Mint(_) => EventName::Mint,
            Cep18Event::Burn(_) => EventName::Burn,
            Cep18Event::SetAllowance(_) => EventName::SetAllowance,
            Cep18Event::IncreaseAllowance(_) => EventName::IncreaseAllowance,
            Cep18Event::DecreaseAllowance(_) => EventName::DecreaseAllowance,
            Cep18Event::Transfer(_) => EventName::Transfer,
            Cep18Event::TransferFrom(_) => EventName::TransferFrom,
            Cep18Event::ChangeSecurity(_) => EventName::ChangeSecurity,
            Cep18Event::ChangeEventsMode(_) => EventName::ChangeEventsMode,
        }
    }
}

/// Correlation data shared by every event decoded from one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionInfo {
    pub transaction_hash: String,
    pub timestamp: String,
}

/// A decoded event as delivered to listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cep18EventWithTransactionInfo {
    pub name: EventName,
    /// Emitting contract, formatted with the bound contract generation's prefix.
    pub contract_address: String,
    pub data: Cep18Event,
    pub transaction_info: TransactionInfo,
}
