//! In-memory node and feed used by the client tests.

use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use alloy_primitives::U256;
use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::{
    basic_elements::{cl_value::CLValue, deploy::Call},
    client::{
        event_stream::{EventFeed, Notification},
        rpc_client::NodeClient,
    },
    constants::{ARG_AMOUNT, ARG_OWNER, BALANCES, BURN_ENTRY_POINT_NAME, MINT_ENTRY_POINT_NAME},
    crypto::{base64::Base64Serializer, traits::serializer::Serializer},
    error::Cep18Error,
    helpers::events::{NotificationKind, split_notification},
    types::{ContractAddress, DictionaryQuery, Lookup},
};

/// Node holding named values and dictionaries in maps. Submitted mint and burn calls
/// are applied to the `balances` dictionary.
#[derive(Default)]
pub struct InMemoryNode {
    named_values: Mutex<HashMap<String, CLValue>>,
    dictionaries: Mutex<HashMap<(String, String), CLValue>>,
    outcomes: Mutex<HashMap<String, Value>>,
    submitted: Mutex<Vec<Call>>,
    failure: Mutex<Option<String>>,
}

impl InMemoryNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_named_value(&self, name: &str, value: CLValue) {
        self.named_values
            .lock()
            .unwrap()
            .insert(name.to_string(), value);
    }

    pub fn put_dictionary(&self, dictionary_name: &str, item_key: &str, value: CLValue) {
        self.dictionaries
            .lock()
            .unwrap()
            .insert((dictionary_name.to_string(), item_key.to_string()), value);
    }

    pub fn put_outcome(&self, transaction_hash: &str, execution_result: Value) {
        self.outcomes
            .lock()
            .unwrap()
            .insert(transaction_hash.to_string(), execution_result);
    }

    /// Every later request fails with an infrastructure error.
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn submitted(&self) -> Vec<Call> {
        self.submitted.lock().unwrap().clone()
    }

    fn check_failure(&self) -> Result<(), Cep18Error> {
        match self.failure.lock().unwrap().as_ref() {
            Some(message) => Err(Cep18Error::Infra(message.clone())),
            None => Ok(()),
        }
    }

    fn apply_balance_change(&self, call: &Call) -> Result<(), Cep18Error> {
        let entry_point = call.entry_point().unwrap_or_default();
        if entry_point != MINT_ENTRY_POINT_NAME && entry_point != BURN_ENTRY_POINT_NAME {
            return Ok(());
        }

        let args = call.session_args();
        let (Some(owner), Some(amount)) = (args.get(ARG_OWNER), args.get(ARG_AMOUNT)) else {
            return Err(Cep18Error::Validation(format!(
                "{} without owner or amount",
                entry_point
            )));
        };
        let amount: U256 = amount.to_typed()?;
        let item_key = Base64Serializer.serialize(owner.inner_bytes());

        let mut dictionaries = self.dictionaries.lock().unwrap();
        let slot = (BALANCES.to_string(), item_key);
        let current = match dictionaries.get(&slot) {
            Some(value) => value.to_typed::<U256>()?,
            None => U256::ZERO,
        };
        let updated = if entry_point == MINT_ENTRY_POINT_NAME {
            current.saturating_add(amount)
        } else {
            current.saturating_sub(amount)
        };
        dictionaries.insert(slot, CLValue::from_u256(updated));
        Ok(())
    }
}

#[async_trait]
impl NodeClient for InMemoryNode {
    async fn query_point_value(
        &self,
        _contract: &ContractAddress,
        path: &str,
    ) -> Result<Lookup<CLValue>, Cep18Error> {
        self.check_failure()?;
        Ok(match self.named_values.lock().unwrap().get(path) {
            Some(value) => Lookup::Found(value.clone()),
            None => Lookup::NotFound,
        })
    }

    async fn query_dictionary(
        &self,
        query: &DictionaryQuery,
    ) -> Result<Lookup<CLValue>, Cep18Error> {
        self.check_failure()?;
        let slot = (query.dictionary_name.clone(), query.item_key.clone());
        Ok(match self.dictionaries.lock().unwrap().get(&slot) {
            Some(value) => Lookup::Found(value.clone()),
            None => Lookup::NotFound,
        })
    }

    async fn get_transaction_outcome(
        &self,
        transaction_hash: &str,
    ) -> Result<Option<Value>, Cep18Error> {
        self.check_failure()?;
        Ok(self.outcomes.lock().unwrap().get(transaction_hash).cloned())
    }

    async fn put_call(&self, call: &Call) -> Result<String, Cep18Error> {
        self.check_failure()?;
        self.apply_balance_change(call)?;

        let hash = call.hash_hex();
        self.put_outcome(&hash, json!({ "Version2": { "error_message": null } }));
        self.submitted.lock().unwrap().push(call.clone());
        Ok(hash)
    }
}

/// Feed that delivers frames pushed by the test while started.
#[derive(Default)]
pub struct InMemoryFeed {
    sinks: Mutex<Vec<(NotificationKind, mpsc::Sender<Notification>)>>,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl InMemoryFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Drops every sink, as a feed that lost its connection for good does.
    pub fn close(&self) {
        self.sinks.lock().unwrap().clear();
    }

    /// Routes a raw `{"<Kind>": {...}}` frame. Returns the number of sinks reached.
    pub async fn push(&self, frame: Value) -> usize {
        if !self.is_started() || self.is_stopped() {
            return 0;
        }
        let Some((kind, payload)) = split_notification(frame) else {
            return 0;
        };

        let sinks: Vec<mpsc::Sender<Notification>> = self
            .sinks
            .lock()
            .unwrap()
            .iter()
            .filter(|(subscribed, _)| *subscribed == kind)
            .map(|(_, sink)| sink.clone())
            .collect();

        let mut reached = 0;
        for sink in sinks {
            let notification = Notification {
                kind,
                payload: payload.clone(),
            };
            if sink.send(notification).await.is_ok() {
                reached += 1;
            }
        }
        reached
    }
}

#[async_trait]
impl EventFeed for InMemoryFeed {
    fn subscribe(&self, kind: NotificationKind, sink: mpsc::Sender<Notification>) {
        self.sinks.lock().unwrap().push((kind, sink));
    }

    async fn start(&self) -> Result<(), Cep18Error> {
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}
