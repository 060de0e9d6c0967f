//! Fan-out event publisher
//!
//! Each subscriber owns an unbounded channel, so `publish` never waits on a slow listener and
//! every listener sees events in publish order. Listeners registered after a publish never see
//! that event.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

use super::EngineEvent;

pub type SubscriberId = u64;

type Registry = DashMap<SubscriberId, mpsc::UnboundedSender<Arc<EngineEvent>>>;

#[derive(Clone, Default)]
pub struct EventPublisher {
    subscribers: Arc<Registry>,
    next_id: Arc<AtomicU64>,
}

/// A registered listener. Dropping it unsubscribes.
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::UnboundedReceiver<Arc<EngineEvent>>,
    registry: Weak<Registry>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next event, or `None` once the publisher is gone and the queue is drained.
    pub async fn recv(&mut self) -> Option<Arc<EngineEvent>> {
        self.receiver.recv().await
    }

    /// Next already-queued event without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<EngineEvent>> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.id);
        }
    }
}

impl EventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.insert(id, tx);
        crate::log_debug!("[EVENTS] Subscriber {} registered", id);

        Subscription {
            id,
            receiver: rx,
            registry: Arc::downgrade(&self.subscribers),
        }
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        if removed {
            crate::log_debug!("[EVENTS] Subscriber {} removed", id);
        }
        removed
    }

    /// Deliver `event` to every current subscriber. Returns how many received it.
    pub fn publish(&self, event: EngineEvent) -> usize {
        let event = Arc::new(event);
        let mut delivered = 0usize;
        let mut closed = Vec::new();

        for entry in self.subscribers.iter() {
            if entry.value().send(Arc::clone(&event)).is_ok() {
                delivered += 1;
            } else {
                closed.push(*entry.key());
            }
        }

        // removal happens after iteration; DashMap shards are read-locked while iterating
        for id in closed {
            self.subscribers.remove(&id);
        }

        crate::log_debug!("[EVENTS] {} delivered to {} subscribers", event.name(), delivered);
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
