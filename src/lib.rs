pub mod basic_elements;
pub mod client;
pub mod config;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod helpers;
pub mod types;

pub use basic_elements::{
    deploy::Call,
    keys::{Algorithm, Key, PublicKey, SecretKey},
};
pub use client::{
    cep18_client::Cep18Client,
    event_stream::{EventFeed, Notification, SseEventStream},
    listeners::{ListenerHandle, ListenerRegistry},
    rpc_client::{JsonRpcClient, NodeClient},
};
pub use config::ClientConfig;
pub use error::{Cep18Error, ContractErrorCode};
pub use types::{
    ContractAddress, EventsMode, Lookup,
    event::{Cep18Event, Cep18EventWithTransactionInfo, EventName, TransactionInfo},
    execution::{TransactionOutcome, WaitOutcome},
};
