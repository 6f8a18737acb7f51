use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::types::{event::TransactionInfo, execution::ExecutionResult};

/// Notification kinds the node's event stream can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// Casper 2.x.
    TransactionProcessed,
    /// Casper 1.x.
    DeployProcessed,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::TransactionProcessed => "TransactionProcessed",
            NotificationKind::DeployProcessed => "DeployProcessed",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "TransactionProcessed" => Some(NotificationKind::TransactionProcessed),
            "DeployProcessed" => Some(NotificationKind::DeployProcessed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum TaggedTransactionHash {
    Deploy(String),
    Version1(String),
}

/// `{"Deploy": "<hex>"}`, `{"Version1": "<hex>"}` or a bare hex string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TransactionHash {
    Tagged(TaggedTransactionHash),
    Plain(String),
}

impl TransactionHash {
    pub fn to_hex(&self) -> &str {
        match self {
            TransactionHash::Tagged(TaggedTransactionHash::Deploy(hash))
            | TransactionHash::Tagged(TaggedTransactionHash::Version1(hash))
            | TransactionHash::Plain(hash) => hash,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum MessagePayload {
    String(String),
    /// Hex-encoded bytes.
    Bytes(String),
}

/// A contract message carried by a processed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Message {
    #[serde(alias = "entity_hash", alias = "hash_addr")]
    pub entity_addr: String,
    pub message: MessagePayload,
    pub topic_name: String,
    #[serde(default)]
    pub topic_name_hash: Option<String>,
    #[serde(default)]
    pub topic_index: u32,
    #[serde(default)]
    pub block_index: u64,
}

/// Payload of a processed-transaction notification, 1.x deploys included.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransactionProcessed {
    #[serde(alias = "deploy_hash")]
    pub transaction_hash: TransactionHash,
    #[serde(default)]
    pub initiator_addr: Option<Value>,
    pub timestamp: String,
    #[serde(default)]
    pub block_hash: Option<String>,
    pub execution_result: Value,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl TransactionProcessed {
    /// Parses the inner payload of a `TransactionProcessed` or `DeployProcessed` frame.
    pub fn from_value(payload: Value) -> Result<Self> {
        serde_json::from_value(payload).context("Malformed processed-transaction notification")
    }
}

/// Correlation data and execution result, ready for classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDetails {
    pub transaction_info: TransactionInfo,
    pub execution_result: ExecutionResult,
}

// Extract correlation data and the typed execution result from a notification
pub fn extract_transaction_details(
    notification: &TransactionProcessed,
) -> Result<TransactionDetails> {
    let execution_result = ExecutionResult::from_json(&notification.execution_result)
        .context("Failed to classify execution result")?;

    Ok(TransactionDetails {
        transaction_info: TransactionInfo {
            transaction_hash: notification.transaction_hash.to_hex().to_string(),
            timestamp: notification.timestamp.clone(),
        },
        execution_result,
    })
}

/// Splits a feed frame `{"<Kind>": {...}}` into its kind and payload.
pub fn split_notification(frame: Value) -> Option<(NotificationKind, Value)> {
    let Value::Object(map) = frame else {
        return None;
    };
    map.into_iter()
        .find_map(|(name, payload)| NotificationKind::from_name(&name).map(|kind| (kind, payload)))
}
