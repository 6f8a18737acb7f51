use alloy_primitives::U256;

use crate::{basic_elements::keys::PublicKey, types::EventsMode};

/// Configuration fixed when the token contract is installed.
#[derive(Debug, Clone)]
pub struct InstallArgs {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: U256,
    /// Contract default (no events) applies when unset.
    pub events_mode: Option<EventsMode>,
    /// Contract default (disabled) applies when unset.
    pub enable_mint_and_burn: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct TransferArgs {
    pub recipient: PublicKey,
    pub amount: U256,
}

#[derive(Debug, Clone)]
pub struct TransferFromArgs {
    pub owner: PublicKey,
    pub recipient: PublicKey,
    pub amount: U256,
}

/// Used by `approve`, `increase_allowance` and `decrease_allowance`.
#[derive(Debug, Clone)]
pub struct ApproveArgs {
    pub spender: PublicKey,
    pub amount: U256,
}

#[derive(Debug, Clone)]
pub struct MintArgs {
    pub owner: PublicKey,
    pub amount: U256,
}

#[derive(Debug, Clone)]
pub struct BurnArgs {
    pub owner: PublicKey,
    pub amount: U256,
}

/// Role lists for `change_security`. At least one must be non-empty.
#[derive(Debug, Clone, Default)]
pub struct ChangeSecurityArgs {
    pub admin_list: Option<Vec<PublicKey>>,
    pub minter_list: Option<Vec<PublicKey>>,
    pub burner_list: Option<Vec<PublicKey>>,
    pub mint_and_burn_list: Option<Vec<PublicKey>>,
    pub none_list: Option<Vec<PublicKey>>,
}
