use std::{env, time::Duration};

use crate::{
    basic_elements::keys::SecretKey,
    constants::{
        DEFAULT_DEPLOY_TIMEOUT_MS, DEFAULT_EVENT_STREAM_ADDRESS, DEFAULT_NODE_URL, Network,
    },
    error::Cep18Error,
};

pub const NODE_URL_VAR: &str = "NODE_URL";
pub const EVENT_STREAM_ADDRESS_VAR: &str = "EVENT_STREAM_ADDRESS";
pub const NETWORK_NAME_VAR: &str = "NETWORK_NAME";
pub const DEPLOY_TIMEOUT_VAR: &str = "DEPLOY_TIMEOUT";
pub const PRIVATE_KEY_VAR: &str = "PRIVATE_KEY";

/// Connection settings, usually read from the environment or a `.env` file.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub node_url: String,
    pub event_stream_address: String,
    pub network_name: String,
    pub deploy_timeout: Duration,
    pub private_key: Option<SecretKey>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            node_url: DEFAULT_NODE_URL.to_string(),
            event_stream_address: DEFAULT_EVENT_STREAM_ADDRESS.to_string(),
            network_name: Network::Nctl.name().to_string(),
            deploy_timeout: Duration::from_millis(DEFAULT_DEPLOY_TIMEOUT_MS),
            private_key: None,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, Cep18Error> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let deploy_timeout = match env::var(DEPLOY_TIMEOUT_VAR) {
            Ok(value) => Duration::from_millis(value.trim().parse().map_err(|_| {
                Cep18Error::Validation(format!(
                    "{} must be a number of milliseconds, got '{}'",
                    DEPLOY_TIMEOUT_VAR, value
                ))
            })?),
            Err(_) => defaults.deploy_timeout,
        };

        // The key is optional: read-only clients never sign
        let private_key = match env::var(PRIVATE_KEY_VAR) {
            Ok(_) => Some(SecretKey::from_env(PRIVATE_KEY_VAR)?),
            Err(_) => None,
        };

        Ok(Self {
            node_url: env::var(NODE_URL_VAR).unwrap_or(defaults.node_url),
            event_stream_address: env::var(EVENT_STREAM_ADDRESS_VAR)
                .unwrap_or(defaults.event_stream_address),
            network_name: env::var(NETWORK_NAME_VAR).unwrap_or(defaults.network_name),
            deploy_timeout,
            private_key,
        })
    }
}
