use alloy_primitives::U512;
use anyhow::{Result, bail};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Value, json};

use crate::{
    basic_elements::{
        args::Args,
        cl_value::{CLValue, RuntimeArgs},
        keys::{PublicKey, SecretKey, Signature, blake2b256},
    },
    constants::{ARG_AMOUNT, DEFAULT_GAS_PRICE, DEFAULT_TTL_MS},
};

const MODULE_BYTES_TAG: u8 = 0;
const STORED_CONTRACT_BY_HASH_TAG: u8 = 1;

/// Code to execute as payment or session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutableItem {
    /// Raw Wasm (empty for the standard payment).
    ModuleBytes {
        module_bytes: Vec<u8>,
        args: RuntimeArgs,
    },
    /// Entry point of an installed contract.
    StoredContractByHash {
        hash: [u8; 32],
        entry_point: String,
        args: RuntimeArgs,
    },
}

impl ExecutableItem {
    /// Standard payment: empty module bytes with an `amount` in motes.
    pub fn standard_payment(amount: U512) -> Self {
        let mut args = RuntimeArgs::new();
        args.insert(ARG_AMOUNT, CLValue::from_u512(amount));
        ExecutableItem::ModuleBytes {
            module_bytes: Vec::new(),
            args,
        }
    }

    pub fn args(&self) -> &RuntimeArgs {
        match self {
            ExecutableItem::ModuleBytes { args, .. }
            | ExecutableItem::StoredContractByHash { args, .. } => args,
        }
    }

    pub fn entry_point(&self) -> Option<&str> {
        match self {
            ExecutableItem::ModuleBytes { .. } => None,
            ExecutableItem::StoredContractByHash { entry_point, .. } => Some(entry_point),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut args = Args::new();
        match self {
            ExecutableItem::ModuleBytes {
                module_bytes,
                args: runtime_args,
            } => {
                args.add_u8(MODULE_BYTES_TAG)
                    .add_bytes(module_bytes)
                    .add_fixed_bytes(&runtime_args.to_bytes());
            }
            ExecutableItem::StoredContractByHash {
                hash,
                entry_point,
                args: runtime_args,
            } => {
                args.add_u8(STORED_CONTRACT_BY_HASH_TAG)
                    .add_fixed_bytes(hash)
                    .add_string(entry_point)
                    .add_fixed_bytes(&runtime_args.to_bytes());
            }
        }
        args.into_bytes()
    }

    pub fn to_json(&self) -> Value {
        match self {
            ExecutableItem::ModuleBytes { module_bytes, args } => json!({
                "ModuleBytes": {
                    "module_bytes": hex::encode(module_bytes),
                    "args": args.to_json(),
                }
            }),
            ExecutableItem::StoredContractByHash {
                hash,
                entry_point,
                args,
            } => json!({
                "StoredContractByHash": {
                    "hash": hex::encode(hash),
                    "entry_point": entry_point,
                    "args": args.to_json(),
                }
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployHeader {
    pub account: PublicKey,
    pub timestamp: DateTime<Utc>,
    pub ttl_ms: u64,
    pub gas_price: u64,
    pub body_hash: [u8; 32],
    pub dependencies: Vec<[u8; 32]>,
    pub chain_name: String,
}

impl DeployHeader {
    fn timestamp_ms(&self) -> u64 {
        u64::try_from(self.timestamp.timestamp_millis()).unwrap_or_default()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut args = Args::new();
        args.add_public_key(&self.account)
            .add_u64(self.timestamp_ms())
            .add_u64(self.ttl_ms)
            .add_u64(self.gas_price)
            .add_fixed_bytes(&self.body_hash)
            .add_u32(self.dependencies.len() as u32);
        for dependency in &self.dependencies {
            args.add_fixed_bytes(dependency);
        }
        args.add_string(&self.chain_name);
        args.into_bytes()
    }

    pub fn to_json(&self) -> Value {
        json!({
            "account": self.account.to_hex(),
            "timestamp": self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            "ttl": format_ttl(self.ttl_ms),
            "gas_price": self.gas_price,
            "body_hash": hex::encode(self.body_hash),
            "dependencies": self.dependencies.iter().map(hex::encode).collect::<Vec<_>>(),
            "chain_name": self.chain_name,
        })
    }
}

fn format_ttl(ttl_ms: u64) -> String {
    match ttl_ms {
        0 => "0ms".to_string(),
        ms if ms % 3_600_000 == 0 => format!("{}h", ms / 3_600_000),
        ms if ms % 60_000 == 0 => format!("{}m", ms / 60_000),
        ms if ms % 1_000 == 0 => format!("{}s", ms / 1_000),
        ms => format!("{}ms", ms),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Approval {
    pub signer: PublicKey,
    pub signature: Signature,
}

/// An unsubmitted deploy executing one session item, with optional approvals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    header: DeployHeader,
    payment: ExecutableItem,
    session: ExecutableItem,
    hash: [u8; 32],
    approvals: Vec<Approval>,
}

impl Call {
    pub fn new(
        sender: PublicKey,
        chain_name: &str,
        session: ExecutableItem,
        payment_amount: U512,
    ) -> Self {
        let payment = ExecutableItem::standard_payment(payment_amount);
        let header = DeployHeader {
            account: sender,
            timestamp: Utc::now(),
            ttl_ms: DEFAULT_TTL_MS,
            gas_price: DEFAULT_GAS_PRICE,
            body_hash: body_hash(&payment, &session),
            dependencies: Vec::new(),
            chain_name: chain_name.to_string(),
        };
        let hash = blake2b256(&header.to_bytes());
        Self {
            header,
            payment,
            session,
            hash,
            approvals: Vec::new(),
        }
    }

    /// Replaces the header timestamp. Drops existing approvals since the hash changes.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.header.timestamp = timestamp;
        self.rehash();
        self
    }

    pub fn with_ttl(mut self, ttl_ms: u64) -> Self {
        self.header.ttl_ms = ttl_ms;
        self.rehash();
        self
    }

    fn rehash(&mut self) {
        self.hash = blake2b256(&self.header.to_bytes());
        self.approvals.clear();
    }

    pub fn sign(&mut self, secret_key: &SecretKey) -> Result<&mut Self> {
        let signer = secret_key.public_key()?;
        if self
            .approvals
            .iter()
            .any(|approval| approval.signer == signer)
        {
            return Ok(self);
        }
        let signature = secret_key.sign(&self.hash)?;
        self.approvals.push(Approval { signer, signature });
        Ok(self)
    }

    pub fn is_signed(&self) -> bool {
        !self.approvals.is_empty()
    }

    /// Checks the body hash, deploy hash and every approval.
    pub fn verify(&self) -> Result<()> {
        if self.header.body_hash != body_hash(&self.payment, &self.session) {
            bail!("Body hash does not match payment and session");
        }
        if self.hash != blake2b256(&self.header.to_bytes()) {
            bail!("Deploy hash does not match header");
        }
        for approval in &self.approvals {
            if !approval.signer.verify(&self.hash, &approval.signature)? {
                bail!("Invalid approval from {}", approval.signer.to_hex());
            }
        }
        Ok(())
    }

    pub fn hash(&self) -> [u8; 32] {
        self.hash
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    pub fn header(&self) -> &DeployHeader {
        &self.header
    }

    pub fn sender(&self) -> &PublicKey {
        &self.header.account
    }

    pub fn payment(&self) -> &ExecutableItem {
        &self.payment
    }

    pub fn session(&self) -> &ExecutableItem {
        &self.session
    }

    pub fn session_args(&self) -> &RuntimeArgs {
        self.session.args()
    }

    pub fn entry_point(&self) -> Option<&str> {
        self.session.entry_point()
    }

    pub fn approvals(&self) -> &[Approval] {
        &self.approvals
    }

    /// JSON deploy accepted by `account_put_deploy`.
    pub fn to_json(&self) -> Value {
        json!({
            "hash": self.hash_hex(),
            "header": self.header.to_json(),
            "payment": self.payment.to_json(),
            "session": self.session.to_json(),
            "approvals": self.approvals.iter().map(|approval| json!({
                "signer": approval.signer.to_hex(),
                "signature": approval.signature.to_hex(),
            })).collect::<Vec<_>>(),
        })
    }
}

fn body_hash(payment: &ExecutableItem, session: &ExecutableItem) -> [u8; 32] {
    let mut body = payment.to_bytes();
    body.extend_from_slice(&session.to_bytes());
    blake2b256(&body)
}
