use std::{
    collections::HashMap,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use tracing::error;

use crate::{
    error::Cep18Error,
    types::event::{Cep18EventWithTransactionInfo, EventName},
};

pub type Listener = Arc<dyn Fn(&Cep18EventWithTransactionInfo) + Send + Sync>;

/// Opaque identity of one registration, used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

/// Listeners per event name, kept in registration order.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    buckets: RwLock<HashMap<EventName, Vec<(ListenerHandle, Listener)>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&self, name: EventName, listener: F) -> ListenerHandle
    where
        F: Fn(&Cep18EventWithTransactionInfo) + Send + Sync + 'static,
    {
        let handle = ListenerHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.buckets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name)
            .or_default()
            .push((handle, Arc::new(listener)));
        handle
    }

    /// Removes one registration. Fails only when `name` never had a listener.
    pub fn off(&self, name: EventName, handle: ListenerHandle) -> Result<(), Cep18Error> {
        let mut buckets = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        let bucket = buckets.get_mut(&name).ok_or_else(|| {
            Cep18Error::Usage(format!(
                "Can't remove a listener. Event \"{}\" doesn't exist.",
                name
            ))
        })?;
        bucket.retain(|(registered, _)| *registered != handle);
        Ok(())
    }

    pub fn listener_count(&self, name: EventName) -> usize {
        self.buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&name)
            .map_or(0, Vec::len)
    }

    /// Delivers `event` to every listener of its name, in registration order. A
    /// panicking listener is logged and does not stop delivery. Returns the number of
    /// listeners that completed.
    pub fn emit(&self, event: &Cep18EventWithTransactionInfo) -> usize {
        let listeners: Vec<(ListenerHandle, Listener)> = self
            .buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&event.name)
            .cloned()
            .unwrap_or_default();

        let mut delivered = 0;
        for (handle, listener) in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(()) => delivered += 1,
                Err(_) => error!(
                    event = %event.name,
                    listener = handle.0,
                    transaction_hash = %event.transaction_info.transaction_hash,
                    "Event listener panicked"
                ),
            }
        }
        delivered
    }
}
