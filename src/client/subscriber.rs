use std::sync::{Arc, Mutex, PoisonError};

use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use crate::{
    client::{
        event_stream::{EventFeed, Notification},
        listeners::ListenerRegistry,
        state_reader::StateReader,
    },
    constants::NOTIFICATION_QUEUE_CAPACITY,
    error::Cep18Error,
    helpers::{
        events::{NotificationKind, TransactionProcessed, extract_transaction_details},
        message_parser::MessageDecoder,
    },
};

/// Background task turning feed notifications into dispatched token events.
///
/// Notifications are queued from the moment the feed starts, so nothing that arrives
/// while the decoder is still being bound is lost. They are then processed one at a
/// time, in feed order.
pub struct EventSubscriber {
    feed: Arc<dyn EventFeed>,
    stop_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl EventSubscriber {
    pub async fn attach(
        feed: Arc<dyn EventFeed>,
        reader: StateReader,
        registry: Arc<ListenerRegistry>,
    ) -> Result<Self, Cep18Error> {
        let (tx, rx) = mpsc::channel(NOTIFICATION_QUEUE_CAPACITY);
        feed.subscribe(NotificationKind::TransactionProcessed, tx.clone());
        // 1.x nodes report executions as `DeployProcessed`, which carries no messages.
        feed.subscribe(NotificationKind::DeployProcessed, tx);
        feed.start().await?;

        let decoder = match bind_decoder(&reader).await {
            Ok(decoder) => decoder,
            Err(error) => {
                feed.stop().await;
                return Err(error);
            }
        };

        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(process_notifications(rx, stop_rx, decoder, registry));

        Ok(Self {
            feed,
            stop_tx,
            task: Mutex::new(Some(task)),
        })
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Stops the feed and the processing task. No event is dispatched once this
    /// returns. Calling it again is a no-op.
    pub async fn stop(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(task) = task else {
            return;
        };

        self.stop_tx.send_replace(true);
        self.feed.stop().await;
        if let Err(error) = task.await {
            if !error.is_cancelled() {
                error!("Event processing task failed: {}", error);
            }
        }
        info!("Event stream subscriber stopped");
    }
}

/// Decoder for the contract's messages. Legacy contracts do not emit messages, so they
/// get none.
async fn bind_decoder(reader: &StateReader) -> Result<Option<MessageDecoder>, Cep18Error> {
    let contract = *reader.contract();
    if contract.is_legacy() {
        debug!(%contract, "Legacy contract, events will not be decoded");
        return Ok(None);
    }

    match reader.events_mode().await {
        Ok(mode) => {
            info!(%contract, ?mode, "Event decoder bound");
            if !mode.emits_messages() {
                warn!(%contract, ?mode, "Contract events mode does not emit messages");
            }
        }
        Err(Cep18Error::NotFound(_)) => {
            warn!(%contract, "Events mode not found, binding decoder anyway");
        }
        Err(error) => return Err(error),
    }
    Ok(Some(MessageDecoder::new(contract)))
}

async fn process_notifications(
    mut rx: mpsc::Receiver<Notification>,
    mut stop_rx: watch::Receiver<bool>,
    decoder: Option<MessageDecoder>,
    registry: Arc<ListenerRegistry>,
) {
    loop {
        let notification = tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            notification = rx.recv() => match notification {
                Some(notification) => notification,
                None => {
                    info!("Event feed closed, no more notifications");
                    break;
                }
            },
        };

        if *stop_rx.borrow() {
            break;
        }
        handle_notification(notification, decoder.as_ref(), &registry);
    }
    debug!("Notification processing finished");
}

/// Decodes one notification and dispatches its events in message order. Returns the
/// number of events dispatched.
pub(crate) fn handle_notification(
    notification: Notification,
    decoder: Option<&MessageDecoder>,
    registry: &ListenerRegistry,
) -> usize {
    let processed = match TransactionProcessed::from_value(notification.payload) {
        Ok(processed) => processed,
        Err(error) => {
            warn!(kind = notification.kind.as_str(), "Dropping notification: {:#}", error);
            return 0;
        }
    };

    let details = match extract_transaction_details(&processed) {
        Ok(details) => details,
        Err(error) => {
            error!(
                transaction_hash = processed.transaction_hash.to_hex(),
                "Unrecognized execution result, dropping notification: {:#}", error
            );
            return 0;
        }
    };

    if !details.execution_result.is_success() {
        debug!(
            transaction_hash = %details.transaction_info.transaction_hash,
            error_message = ?details.execution_result.error_message(),
            "Skipping failed transaction"
        );
        return 0;
    }

    let Some(decoder) = decoder else {
        debug!(
            transaction_hash = %details.transaction_info.transaction_hash,
            "No decoder bound, dropping notification"
        );
        return 0;
    };

    let events = decoder.decode(&processed.messages, &details.transaction_info);
    for event in &events {
        registry.emit(event);
    }
    events.len()
}
