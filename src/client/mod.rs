pub mod cep18_client;
pub mod event_stream;
pub mod listeners;
pub mod rpc_client;
pub mod state_reader;
pub mod subscriber;

#[cfg(test)]
pub(crate) mod testing;
