// ── Event bus ──
//
// Named-topic publish/subscribe with synchronous delivery. The bus holds
// only weak references to handlers; the `Subscription` returned from
// `subscribe` owns its handler, and dropping it unsubscribes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::trace;

use crate::model::{EntityId, ViewState};

/// Topics carried by the bus.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::AsRefStr,
)]
pub enum Topic {
    /// The catalog was modified. Any publisher may raise it.
    CatalogChanged,
    /// The coordinator's view state changed.
    ViewUpdated,
}

/// What kind of edit produced a [`CatalogChange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ChangeKind {
    Saved,
    Renamed,
    Relocated,
    Deleted,
    Bound,
    Unbound,
    /// Raised outside the coordinator (another process, an import).
    External,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogChange {
    pub kind: ChangeKind,
    pub entity_id: Option<EntityId>,
    /// Catalog revision after the edit, when known.
    pub revision: Option<u64>,
}

impl CatalogChange {
    pub fn external() -> Self {
        Self {
            kind: ChangeKind::External,
            entity_id: None,
            revision: None,
        }
    }
}

/// Message body delivered to handlers.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Empty,
    Catalog(CatalogChange),
    View(ViewState),
}

type Handler = dyn Fn(&Payload) + Send + Sync;

struct Slot {
    id: u64,
    handler: Weak<Handler>,
}

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    topics: RwLock<HashMap<Topic, Vec<Slot>>>,
}

impl BusInner {
    fn remove(&self, topic: Topic, id: u64) -> bool {
        let mut topics = self.topics.write();
        let Some(slots) = topics.get_mut(&topic) else {
            return false;
        };
        let before = slots.len();
        slots.retain(|s| s.id != id);
        before != slots.len()
    }
}

/// Process-wide publish/subscribe bus. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `payload` to every live handler of `topic`, in registration
    /// order, on the calling thread. Returns how many handlers ran.
    ///
    /// No lock is held while handlers run, so a handler may publish or
    /// subscribe itself.
    pub fn publish(&self, topic: Topic, payload: &Payload) -> usize {
        let handlers: Vec<Arc<Handler>> = {
            let topics = self.inner.topics.read();
            topics
                .get(&topic)
                .map(|slots| slots.iter().filter_map(|s| s.handler.upgrade()).collect())
                .unwrap_or_default()
        };

        for handler in &handlers {
            handler(payload);
        }
        trace!(%topic, delivered = handlers.len(), "published");
        handlers.len()
    }

    /// Register a handler for `topic`. It stays registered for as long as
    /// the returned [`Subscription`] is alive.
    #[must_use = "dropping the Subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, topic: Topic, handler: F) -> Subscription
    where
        F: Fn(&Payload) + Send + Sync + 'static,
    {
        let handler: Arc<Handler> = Arc::new(handler);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .topics
            .write()
            .entry(topic)
            .or_default()
            .push(Slot {
                id,
                handler: Arc::downgrade(&handler),
            });
        trace!(%topic, id, "subscribed");

        Subscription {
            id,
            topic,
            _handler: handler,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Number of live handlers on `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.inner
            .topics
            .read()
            .get(&topic)
            .map_or(0, |slots| slots.iter().filter(|s| s.handler.strong_count() > 0).count())
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let topics = self.inner.topics.read();
        f.debug_struct("EventBus")
            .field("topics", &topics.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Owns a registered handler. Drop or [`cancel`](Self::cancel) to unsubscribe.
pub struct Subscription {
    id: u64,
    topic: Topic,
    _handler: Arc<Handler>,
    bus: Weak<BusInner>,
}

impl Subscription {
    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Unsubscribe now.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            if bus.remove(self.topic, self.id) {
                trace!(topic = %self.topic, id = self.id, "unsubscribed");
            }
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}
