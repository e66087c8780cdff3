//! Live-update fan-out to connected subscribers.
//!
//! The [`Broadcaster`] owns the registry of open client connections
//! and all of its synchronization; the raw collection is never
//! exposed. Delivery is best-effort and independent per subscriber:
//! each subscriber has a bounded channel, publishing never blocks and
//! never fails to the caller, a disconnected subscriber is removed as
//! a side effect of the failed delivery, and a slow subscriber loses
//! the event rather than stalling everyone else.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::{RwLock, mpsc};

/// Events buffered per subscriber before updates are dropped.
const DEFAULT_EVENT_BUFFER: usize = 32;

/// Notification that a task list changed, published once per
/// successful save.
///
/// Serializes to the wire shape `{"type":"update","date":"<key>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateEvent {
    /// Always `"update"`; the only message kind in this layer.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// The key (date or template path) whose list changed.
    pub date: String,
}

impl UpdateEvent {
    /// Creates an update event for the given key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            kind: "update",
            date: key.into(),
        }
    }
}

/// Opaque handle identifying one live subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// One subscriber's view: its handle plus the receiving end of its
/// event channel. Tied to the lifetime of one live connection.
pub struct Subscription {
    /// Handle to pass back to [`Broadcaster::unsubscribe`].
    pub id: SubscriberId,
    /// Stream of update events for this subscriber.
    pub events: mpsc::Receiver<UpdateEvent>,
}

/// Registry of live subscribers with best-effort publish.
///
/// Created once at startup and held for the life of the service.
pub struct Broadcaster {
    subscribers: RwLock<HashMap<SubscriberId, mpsc::Sender<UpdateEvent>>>,
    next_id: AtomicU64,
    event_buffer: usize,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster {
    /// Creates an empty broadcaster with the default per-subscriber
    /// buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::with_event_buffer(DEFAULT_EVENT_BUFFER)
    }

    /// Creates an empty broadcaster with a custom per-subscriber
    /// buffer size.
    #[must_use]
    pub fn with_event_buffer(event_buffer: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            event_buffer,
        }
    }

    /// Registers a new subscriber and returns its handle and event
    /// channel.
    pub async fn subscribe(&self) -> Subscription {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.event_buffer);
        self.subscribers.write().await.insert(id, tx);
        Subscription { id, events: rx }
    }

    /// Removes a subscriber. Idempotent: removing an unknown or
    /// already-removed handle is a no-op.
    pub async fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers.write().await.remove(&id);
    }

    /// Publishes `event` to every subscriber registered at the moment
    /// of the call.
    ///
    /// Never blocks and never fails to the caller. Per-subscriber
    /// outcomes:
    /// - delivered: the event is queued on the subscriber's channel;
    /// - buffer full: the event is dropped for that subscriber only,
    ///   with a warning;
    /// - channel closed: the connection is gone; the subscriber is
    ///   removed from the registry.
    pub async fn publish(&self, event: &UpdateEvent) {
        let mut dead = Vec::new();

        {
            let subscribers = self.subscribers.read().await;
            for (id, tx) in subscribers.iter() {
                match tx.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::warn!(
                            subscriber = id.0,
                            key = %event.date,
                            "subscriber lagging, dropping update"
                        );
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        tracing::debug!(
                            subscriber = id.0,
                            "subscriber channel closed, removing"
                        );
                        dead.push(*id);
                    }
                }
            }
        }

        if !dead.is_empty() {
            let mut subscribers = self.subscribers.write().await;
            for id in dead {
                subscribers.remove(&id);
            }
        }
    }

    /// Number of currently registered subscribers.
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }
}
