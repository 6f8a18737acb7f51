pub const DEFAULT_NODE_URL: &str = "http://localhost:11101/rpc";
pub const DEFAULT_EVENT_STREAM_ADDRESS: &str = "http://localhost:18101/events/main";
pub const DEFAULT_DEPLOY_TIMEOUT_MS: u64 = 1_200_000;
pub const DEFAULT_TTL_MS: u64 = 30 * 60 * 1000;
pub const DEFAULT_GAS_PRICE: u64 = 1;

// Bounded queue between the event feed and the notification processor.
pub const NOTIFICATION_QUEUE_CAPACITY: usize = 1024;

pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 1_000;

pub const LEGACY_CONTRACT_PREFIX: &str = "hash-";
pub const ENTITY_CONTRACT_PREFIX: &str = "entity-contract-";
pub const ENTITY_ACCOUNT_PREFIX: &str = "entity-account-";
pub const ENTITY_SYSTEM_PREFIX: &str = "entity-system-";
pub const ACCOUNT_HASH_PREFIX: &str = "account-hash-";
pub const PACKAGE_PREFIX: &str = "package-";
pub const LEGACY_PACKAGE_PREFIX: &str = "contract-package-";

pub const USER_ERROR_PREFIX: &str = "User error: ";
pub const EVENTS_TOPIC: &str = "events";
pub const CES_EVENT_PREFIX: &str = "event_";
pub const CONTRACT_HASH_NAME_PREFIX: &str = "cep18_contract_hash_";

// Named keys and dictionaries.
pub const NAME: &str = "name";
pub const SYMBOL: &str = "symbol";
pub const DECIMALS: &str = "decimals";
pub const TOTAL_SUPPLY: &str = "total_supply";
pub const BALANCES: &str = "balances";
pub const ALLOWANCES: &str = "allowances";
pub const EVENTS_MODE: &str = "events_mode";
pub const ENABLE_MINT_BURN: &str = "enable_mint_burn";

// Entry points.
pub const TRANSFER_ENTRY_POINT_NAME: &str = "transfer";
pub const TRANSFER_FROM_ENTRY_POINT_NAME: &str = "transfer_from";
pub const APPROVE_ENTRY_POINT_NAME: &str = "approve";
pub const ALLOWANCE_ENTRY_POINT_NAME: &str = "allowance";
pub const INCREASE_ALLOWANCE_ENTRY_POINT_NAME: &str = "increase_allowance";
pub const DECREASE_ALLOWANCE_ENTRY_POINT_NAME: &str = "decrease_allowance";
pub const MINT_ENTRY_POINT_NAME: &str = "mint";
pub const BURN_ENTRY_POINT_NAME: &str = "burn";
pub const CHANGE_SECURITY_ENTRY_POINT_NAME: &str = "change_security";

// Runtime argument names.
pub const ARG_NAME: &str = "name";
pub const ARG_SYMBOL: &str = "symbol";
pub const ARG_DECIMALS: &str = "decimals";
pub const ARG_TOTAL_SUPPLY: &str = "total_supply";
pub const ARG_EVENTS_MODE: &str = "events_mode";
pub const ARG_ENABLE_MINT_BURN: &str = "enable_mint_burn";
pub const ARG_OWNER: &str = "owner";
pub const ARG_SPENDER: &str = "spender";
pub const ARG_RECIPIENT: &str = "recipient";
pub const ARG_AMOUNT: &str = "amount";
pub const ARG_ADMIN_LIST: &str = "admin_list";
pub const ARG_MINTER_LIST: &str = "minter_list";
pub const ARG_BURNER_LIST: &str = "burner_list";
pub const ARG_MINT_AND_BURN_LIST: &str = "mint_and_burn_list";
pub const ARG_NONE_LIST: &str = "none_list";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Nctl,
    Testnet,
    Mainnet,
}

impl Network {
    pub fn name(&self) -> &'static str {
        match self {
            Network::Nctl => "casper-net-1",
            Network::Testnet => "casper-test",
            Network::Mainnet => "casper",
        }
    }
}
