use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::{Value, json};
use tracing::debug;

use crate::{
    basic_elements::{cl_value::CLValue, deploy::Call},
    config::ClientConfig,
    error::Cep18Error,
    types::{ContractAddress, DictionaryQuery, Lookup},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// Node error codes. `QUERY_FAILED` is what a global state read of a missing value
// reports; `METHOD_NOT_FOUND` is the JSON-RPC standard code for an unsupported method.
const QUERY_FAILED: i64 = -32003;
const METHOD_NOT_FOUND: i64 = -32601;

/// Node operations the client depends on.
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Reads a named key of the contract.
    async fn query_point_value(
        &self,
        contract: &ContractAddress,
        path: &str,
    ) -> Result<Lookup<CLValue>, Cep18Error>;

    async fn query_dictionary(
        &self,
        query: &DictionaryQuery,
    ) -> Result<Lookup<CLValue>, Cep18Error>;

    /// Raw execution result of a transaction, `None` while it is not yet executed.
    async fn get_transaction_outcome(
        &self,
        transaction_hash: &str,
    ) -> Result<Option<Value>, Cep18Error>;

    /// Submits a call and returns its hash.
    async fn put_call(&self, call: &Call) -> Result<String, Cep18Error>;
}

/// `NodeClient` over the node's JSON-RPC endpoint.
#[derive(Debug)]
pub struct JsonRpcClient {
    http_client: HttpClient,
    node_url: String,
    request_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(node_url: impl Into<String>) -> Result<Self, Cep18Error> {
        let http_client = HttpClient::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            http_client,
            node_url: node_url.into(),
            request_id: AtomicU64::new(1),
        })
    }

    pub fn new_from_env() -> Result<Self, Cep18Error> {
        let config = ClientConfig::from_env()?;
        Self::new(config.node_url)
    }

    pub fn node_url(&self) -> &str {
        &self.node_url
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, Cep18Error> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let request_body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });

        debug!(method, id, "Sending JSON-RPC request");

        let response = self
            .http_client
            .post(&self.node_url)
            .json(&request_body)
            .send()
            .await?
            .error_for_status()?;
        let mut body: Value = response.json().await?;

        if let Some(error) = body.get("error") {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            let data = error.get("data").map(Value::to_string).unwrap_or_default();

            if is_not_found(code, &message, &data) {
                return Err(Cep18Error::NotFound(message));
            }
            return Err(Cep18Error::Infra(format!(
                "{} failed with code {}: {} {}",
                method, code, message, data
            )));
        }

        match body.get_mut("result").map(Value::take) {
            Some(result) => Ok(result),
            None => Err(Cep18Error::Infra(format!(
                "{} returned neither result nor error",
                method
            ))),
        }
    }

    async fn get_state_root_hash(&self) -> Result<String, Cep18Error> {
        let result = self
            .rpc_call("chain_get_state_root_hash", json!({}))
            .await
            .map_err(|error| match error {
                Cep18Error::NotFound(message) => Cep18Error::Infra(format!(
                    "chain_get_state_root_hash failed: {}",
                    message
                )),
                error => error,
            })?;
        result
            .get("state_root_hash")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Cep18Error::Infra("Missing state_root_hash in response".to_string()))
    }
}

/// Whether a node error means the requested value or deploy does not exist.
fn is_not_found(code: i64, message: &str, data: &str) -> bool {
    if code == METHOD_NOT_FOUND {
        return false;
    }
    code == QUERY_FAILED
        || [message, data].iter().any(|text| {
            text.contains("ValueNotFound")
                || text.contains("No such deploy")
                || text.contains("No such transaction")
        })
}

fn lookup_from(result: Result<Value, Cep18Error>) -> Result<Lookup<CLValue>, Cep18Error> {
    match result {
        Ok(result) => {
            let cl_value = result
                .get("stored_value")
                .and_then(|stored| stored.get("CLValue"))
                .ok_or_else(|| {
                    Cep18Error::Schema(format!("stored value is not a CLValue: {}", result))
                })?;
            Ok(Lookup::Found(CLValue::from_json(cl_value)?))
        }
        Err(Cep18Error::NotFound(message)) => {
            debug!(%message, "Lookup found nothing");
            Ok(Lookup::NotFound)
        }
        Err(error) => Err(error),
    }
}

/// Execution result from an `info_get_deploy` result, for 1.x and 2.x nodes.
pub fn execution_result_from_deploy_info(result: &Value) -> Option<Value> {
    if let Some(execution_info) = result.get("execution_info") {
        return execution_info
            .get("execution_result")
            .filter(|value| !value.is_null())
            .cloned();
    }

    result
        .get("execution_results")
        .and_then(Value::as_array)
        .and_then(|results| results.first())
        .and_then(|first| first.get("result"))
        .cloned()
}

#[async_trait]
impl NodeClient for JsonRpcClient {
    async fn query_point_value(
        &self,
        contract: &ContractAddress,
        path: &str,
    ) -> Result<Lookup<CLValue>, Cep18Error> {
        let params = json!({
            "state_identifier": null,
            "key": contract.to_string(),
            "path": [path],
        });
        lookup_from(self.rpc_call("query_global_state", params).await)
    }

    async fn query_dictionary(
        &self,
        query: &DictionaryQuery,
    ) -> Result<Lookup<CLValue>, Cep18Error> {
        let state_root_hash = self.get_state_root_hash().await?;
        let identifier_kind = if query.contract.is_legacy() {
            "ContractNamedKey"
        } else {
            "EntityNamedKey"
        };
        let params = json!({
            "state_root_hash": state_root_hash,
            "dictionary_identifier": {
                (identifier_kind): {
                    "key": query.contract.to_string(),
                    "dictionary_name": query.dictionary_name,
                    "dictionary_item_key": query.item_key,
                }
            }
        });
        lookup_from(self.rpc_call("state_get_dictionary_item", params).await)
    }

    async fn get_transaction_outcome(
        &self,
        transaction_hash: &str,
    ) -> Result<Option<Value>, Cep18Error> {
        let params = json!({
            "deploy_hash": transaction_hash,
            "finalized_approvals": false,
        });
        match self.rpc_call("info_get_deploy", params).await {
            Ok(result) => Ok(execution_result_from_deploy_info(&result)),
            // Freshly submitted deploys may not have reached this node yet
            Err(Cep18Error::NotFound(_)) => Ok(None),
            Err(error) => Err(error),
        }
    }

    async fn put_call(&self, call: &Call) -> Result<String, Cep18Error> {
        let result = self
            .rpc_call("account_put_deploy", json!({ "deploy": call.to_json() }))
            .await?;
        result
            .get("deploy_hash")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Cep18Error::Infra("Missing deploy_hash in response".to_string()))
    }
}
