//! Cache Events
//!
//! Listeners registered on a [`Cache`](super::Cache) hear about reads that hit,
//! writes, deletes and flushes made through it. Delivery is synchronous on the
//! task that performed the operation.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

// == Event Kind ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Set,
    /// A read that found a live value
    Get,
    Delete,
    Flush,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Set => "set",
            EventKind::Get => "get",
            EventKind::Delete => "delete",
            EventKind::Flush => "flush",
        };
        f.write_str(name)
    }
}

// == Cache Event ==
/// One notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEvent<'a> {
    pub kind: EventKind,
    /// Namespace of the facade the operation went through
    pub namespace: &'a str,
    /// Caller's key within `namespace`, None for flushes
    pub key: Option<&'a str>,
}

// == Listener ==
/// Receives cache events. Runs inline with the cache operation, so
/// implementations must not block.
pub trait CacheListener: Send + Sync {
    fn on_event(&self, event: &CacheEvent<'_>);
}

impl<F> CacheListener for F
where
    F: Fn(&CacheEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &CacheEvent<'_>) {
        self(event)
    }
}

/// Handle returned by registration, used to remove the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

// == Listeners ==
/// The registered listeners of one facade and all its views.
#[derive(Default)]
pub struct Listeners {
    next_id: AtomicU64,
    entries: RwLock<Vec<(ListenerId, Arc<dyn CacheListener>)>>,
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners").field("len", &self.len()).finish()
    }
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<dyn CacheListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, listener));
        id
    }

    /// Returns false if `id` was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|(entry, _)| *entry != id);
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // == Emit ==
    /// Delivers `event` to every listener in registration order.
    ///
    /// The lock is released before any listener runs, so a listener may
    /// register or remove listeners; the change applies from the next event.
    pub fn emit(&self, event: &CacheEvent<'_>) {
        let listeners: Vec<Arc<dyn CacheListener>> = {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            if entries.is_empty() {
                return;
            }
            entries.iter().map(|(_, listener)| listener.clone()).collect()
        };

        for listener in listeners {
            listener.on_event(event);
        }
    }
}
