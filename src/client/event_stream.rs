use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use reqwest::{Client as HttpClient, Response};
use serde_json::Value;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::{
    config::ClientConfig,
    constants::{DEFAULT_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_DELAY_MS},
    error::Cep18Error,
    helpers::events::{NotificationKind, split_notification},
};

/// One notification taken off the node's event stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub payload: Value,
}

type Subscribers = Arc<Mutex<HashMap<NotificationKind, Vec<mpsc::Sender<Notification>>>>>;

/// Push feed of node notifications.
#[async_trait]
pub trait EventFeed: Send + Sync {
    /// Routes every notification of `kind` into `sink`.
    fn subscribe(&self, kind: NotificationKind, sink: mpsc::Sender<Notification>);

    async fn start(&self) -> Result<(), Cep18Error>;

    /// Stops delivery. Calling it again is a no-op.
    async fn stop(&self);
}

/// `EventFeed` reading the node's server-sent events endpoint.
///
/// When the connection ends it reconnects up to `reconnect_attempts` times in a row.
/// Once it gives up, every subscribed sink is dropped so receivers see the feed close.
pub struct SseEventStream {
    address: String,
    http_client: HttpClient,
    subscribers: Subscribers,
    reconnect_attempts: u32,
    reconnect_delay: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SseEventStream {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            http_client: HttpClient::new(),
            subscribers: Arc::new(Mutex::new(HashMap::new())),
            reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            task: Mutex::new(None),
        }
    }

    pub fn with_reconnect_policy(mut self, attempts: u32, delay: Duration) -> Self {
        self.reconnect_attempts = attempts;
        self.reconnect_delay = delay;
        self
    }

    pub fn new_from_env() -> Result<Self, Cep18Error> {
        let config = ClientConfig::from_env()?;
        Ok(Self::new(config.event_stream_address))
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl EventFeed for SseEventStream {
    fn subscribe(&self, kind: NotificationKind, sink: mpsc::Sender<Notification>) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push(sink);
    }

    async fn start(&self) -> Result<(), Cep18Error> {
        if self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
        {
            return Ok(());
        }

        let response = connect(&self.http_client, &self.address).await?;
        info!(address = %self.address, "Connected to event stream");

        let http_client = self.http_client.clone();
        let subscribers = self.subscribers.clone();
        let address = self.address.clone();
        let attempts = self.reconnect_attempts;
        let delay = self.reconnect_delay;
        let task = tokio::spawn(async move {
            let mut response = response;
            loop {
                read_events(response, &subscribers, &address).await;

                let mut reconnected = None;
                for attempt in 1..=attempts {
                    tokio::time::sleep(delay).await;
                    info!(%address, attempt, "Reconnecting to event stream");
                    match connect(&http_client, &address).await {
                        Ok(response) => {
                            reconnected = Some(response);
                            break;
                        }
                        Err(error) => warn!(%address, attempt, "Reconnect failed: {}", error),
                    }
                }
                match reconnected {
                    Some(next) => response = next,
                    None => break,
                }
            }

            subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
            info!(%address, "Event stream closed");
        });

        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
        Ok(())
    }

    async fn stop(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
            info!(address = %self.address, "Event stream stopped");
        }
    }
}

async fn connect(http_client: &HttpClient, address: &str) -> Result<Response, Cep18Error> {
    Ok(http_client
        .get(address)
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .send()
        .await?
        .error_for_status()?)
}

/// Routes every event of one connection until its body ends or fails.
async fn read_events(response: Response, subscribers: &Subscribers, address: &str) {
    let mut stream = std::pin::pin!(response.bytes_stream());
    let mut parser = SseFrameParser::default();

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(error) => {
                warn!(%address, "Event stream read failed: {}", error);
                return;
            }
        };

        for data in parser.push(&chunk) {
            route(subscribers, &data).await;
        }
    }
    debug!(%address, "Event stream body ended");
}

async fn route(subscribers: &Subscribers, data: &str) {
    let frame: Value = match serde_json::from_str(data) {
        Ok(frame) => frame,
        Err(error) => {
            debug!("Ignoring non-JSON event frame: {}", error);
            return;
        }
    };
    let Some((kind, payload)) = split_notification(frame) else {
        return;
    };

    let sinks = subscribers
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&kind)
        .cloned()
        .unwrap_or_default();
    for sink in sinks {
        let notification = Notification {
            kind,
            payload: payload.clone(),
        };
        if sink.send(notification).await.is_err() {
            debug!(kind = kind.as_str(), "Notification sink closed");
        }
    }
}

/// Incremental parser for `text/event-stream` bodies, yielding each event's data.
#[derive(Debug, Default)]
pub struct SseFrameParser {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseFrameParser {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(position) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=position).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data.is_empty() {
                    events.push(self.data.join("\n"));
                    self.data.clear();
                }
            } else if let Some(value) = line.strip_prefix("data:") {
                self.data
                    .push(value.strip_prefix(' ').unwrap_or(value).to_string());
            }
            // `id:`, `event:`, `retry:` and `:` comments carry nothing we route on
        }
        events
    }
}
