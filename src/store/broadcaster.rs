//! Publish path: latest-value update plus fan-out to subscribers.
//!
//! ```text
//!   push_reading ──► Broadcaster::publish
//!                        │ 1. serialize once
//!                        │ 2. ReadingStore::set
//!                        │ 3. SubscriberRegistry::broadcast
//!                        ▼
//!          [queue]    [queue]    [queue]   ──► ws writer tasks ──► sockets
//! ```

use super::reading_store::ReadingStore;
use super::registry::{BroadcastReport, SubscriberHandle, SubscriberId, SubscriberRegistry};
use super::types::{Payload, Reading, Snapshot};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Default number of payloads a subscriber may have in flight.
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// Error returned when a reading cannot be published.
#[derive(Debug)]
pub enum PublishError {
    /// The reading could not be turned into its wire form.
    Serialize(serde_json::Error),
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::Serialize(e) => write!(f, "Failed to serialize reading: {}", e),
        }
    }
}

impl std::error::Error for PublishError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PublishError::Serialize(e) => Some(e),
        }
    }
}

/// Owns the latest-reading store and the subscriber registry and keeps
/// them consistent with each other.
#[derive(Debug)]
pub struct Broadcaster {
    store: Arc<ReadingStore>,
    registry: Arc<SubscriberRegistry>,
    queue_capacity: usize,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster {
    /// Creates a broadcaster with fresh components and the default queue size.
    pub fn new() -> Self {
        Self::with_queue_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Creates a broadcaster whose subscribers buffer up to `capacity` payloads.
    pub fn with_queue_capacity(capacity: usize) -> Self {
        Self::from_parts(
            Arc::new(ReadingStore::new()),
            Arc::new(SubscriberRegistry::new()),
            capacity,
        )
    }

    /// Builds a broadcaster around existing components.
    pub fn from_parts(
        store: Arc<ReadingStore>,
        registry: Arc<SubscriberRegistry>,
        queue_capacity: usize,
    ) -> Self {
        Self {
            store,
            registry,
            queue_capacity: queue_capacity.max(1),
        }
    }

    pub fn store(&self) -> &ReadingStore {
        &self.store
    }

    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    /// Latest reading, if any has been published.
    pub fn latest(&self) -> Option<Arc<Reading>> {
        self.store.get()
    }

    /// Number of live subscribers right now.
    pub fn subscriber_count(&self) -> usize {
        self.registry.count()
    }

    /// Publishes a new reading to the store and to every subscriber.
    ///
    /// The reading is serialized before anything else happens. If that
    /// fails the store is left untouched, so a reading that was never
    /// broadcast can not become the latest one.
    pub fn publish(&self, reading: Reading) -> Result<BroadcastReport, PublishError> {
        let snapshot = Snapshot::encode(reading).map_err(PublishError::Serialize)?;
        let payload = Payload::clone(&snapshot.payload);

        // The store is updated before the fan-out. A subscriber that misses
        // this broadcast registered after it started, and its replay reads
        // the value set here.
        self.store.set(snapshot);
        let report = self.registry.broadcast(&payload);

        if report.delivered > 0 {
            tracing::info!(
                subscribers = report.delivered,
                pruned = report.pruned,
                "Broadcast sent"
            );
        }

        Ok(report)
    }

    /// Registers a new subscriber and replays the latest reading to it.
    ///
    /// Registration and replay happen under the registry lock, so the replay
    /// is always queued ahead of any broadcast the subscriber receives.
    pub fn subscribe(&self) -> Subscription {
        let (handle, rx) = SubscriberHandle::channel(self.queue_capacity);
        let mut replayed = false;

        let id = self.registry.register_with(handle, |handle| {
            if let Some(snapshot) = self.store.snapshot() {
                match handle.deliver(&snapshot.payload) {
                    Ok(()) => replayed = true,
                    Err(e) => {
                        tracing::warn!(subscriber = %handle.id(), error = %e, "Replay failed");
                    }
                }
            }
        });

        tracing::debug!(subscriber = %id, replayed, "Subscriber registered");

        Subscription {
            id,
            rx,
            replayed,
            registry: Arc::clone(&self.registry),
        }
    }

    /// Removes a subscriber. Safe to call more than once.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.registry.deregister(id)
    }
}

/// Receiving side of one subscriber.
///
/// Dropping it deregisters the subscriber.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<Payload>,
    replayed: bool,
    registry: Arc<SubscriberRegistry>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Whether the latest reading was queued for this subscriber on connect.
    pub fn replayed(&self) -> bool {
        self.replayed
    }

    /// Waits for the next payload.
    ///
    /// Returns `None` once the registry has dropped this subscriber and the
    /// queue is drained.
    pub async fn recv(&mut self) -> Option<Payload> {
        self.rx.recv().await
    }

    /// Takes the next payload if one is already queued.
    pub fn try_recv(&mut self) -> Option<Payload> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.deregister(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::types::sample_reading;

    fn temperature_of(payload: &Payload) -> Option<f64> {
        serde_json::from_str::<Reading>(payload).unwrap().temperature
    }

    #[test]
    fn test_publish_updates_store() {
        let broadcaster = Broadcaster::new();
        assert!(broadcaster.latest().is_none());

        broadcaster.publish(sample_reading(22.3)).unwrap();
        assert_eq!(broadcaster.latest().unwrap().temperature, Some(22.3));

        broadcaster.publish(sample_reading(19.8)).unwrap();
        assert_eq!(broadcaster.latest().unwrap().temperature, Some(19.8));
    }

    #[test]
    fn test_subscribe_without_reading_has_no_replay() {
        let broadcaster = Broadcaster::new();
        let mut sub = broadcaster.subscribe();

        assert!(!sub.replayed());
        assert!(sub.try_recv().is_none());
        assert_eq!(broadcaster.subscriber_count(), 1);
    }

    #[test]
    fn test_subscribe_replays_exactly_once() {
        let broadcaster = Broadcaster::new();
        broadcaster.publish(sample_reading(22.3)).unwrap();

        let mut sub = broadcaster.subscribe();

        assert!(sub.replayed());
        let replay = sub.try_recv().unwrap();
        assert_eq!(temperature_of(&replay), Some(22.3));
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_replay_is_byte_identical_to_broadcast() {
        let broadcaster = Broadcaster::new();
        let mut early = broadcaster.subscribe();
        broadcaster.publish(sample_reading(21.0)).unwrap();
        let mut late = broadcaster.subscribe();

        assert_eq!(early.try_recv().unwrap(), late.try_recv().unwrap());
    }

    #[test]
    fn test_replay_is_private() {
        let broadcaster = Broadcaster::new();
        let mut first = broadcaster.subscribe();
        broadcaster.publish(sample_reading(22.3)).unwrap();
        assert!(first.try_recv().is_some());

        let _second = broadcaster.subscribe();
        assert!(first.try_recv().is_none());
    }

    #[test]
    fn test_dropping_subscription_deregisters() {
        let broadcaster = Broadcaster::new();
        let sub = broadcaster.subscribe();
        let id = sub.id();
        assert!(broadcaster.registry().contains(id));

        drop(sub);

        assert!(!broadcaster.registry().contains(id));
        assert_eq!(broadcaster.subscriber_count(), 0);
        // Already gone; a second removal is a no-op.
        assert!(!broadcaster.unsubscribe(id));
    }

    #[test]
    fn test_failing_subscriber_does_not_affect_others() {
        let broadcaster = Broadcaster::with_queue_capacity(1);
        let _stuck = broadcaster.subscribe();
        let mut healthy = broadcaster.subscribe();

        broadcaster.publish(sample_reading(1.0)).unwrap();
        assert!(healthy.try_recv().is_some());

        // `_stuck` never drains, so this overflows its queue.
        let report = broadcaster.publish(sample_reading(2.0)).unwrap();

        assert_eq!(report, BroadcastReport { delivered: 1, pruned: 1 });
        assert_eq!(temperature_of(&healthy.try_recv().unwrap()), Some(2.0));
        assert_eq!(broadcaster.subscriber_count(), 1);
    }

    #[test]
    fn test_full_scenario() {
        let broadcaster = Broadcaster::new();

        broadcaster.publish(sample_reading(22.3)).unwrap();
        assert_eq!(broadcaster.latest().unwrap().temperature, Some(22.3));

        let mut s1 = broadcaster.subscribe();
        assert_eq!(temperature_of(&s1.try_recv().unwrap()), Some(22.3));

        broadcaster.publish(sample_reading(19.8)).unwrap();
        assert_eq!(temperature_of(&s1.try_recv().unwrap()), Some(19.8));
        assert_eq!(broadcaster.latest().unwrap().temperature, Some(19.8));

        let mut s2 = broadcaster.subscribe();
        assert_eq!(temperature_of(&s2.try_recv().unwrap()), Some(19.8));
        assert!(s2.try_recv().is_none());

        assert!(broadcaster.unsubscribe(s1.id()));
        let report = broadcaster.publish(sample_reading(25.0)).unwrap();

        assert_eq!(report.delivered, 1);
        assert_eq!(temperature_of(&s2.try_recv().unwrap()), Some(25.0));
        assert!(s1.try_recv().is_none());
        assert_eq!(broadcaster.latest().unwrap().temperature, Some(25.0));
    }

    #[tokio::test]
    async fn test_recv_ends_after_prune() {
        let broadcaster = Broadcaster::with_queue_capacity(1);
        let mut sub = broadcaster.subscribe();

        broadcaster.publish(sample_reading(1.0)).unwrap();
        broadcaster.publish(sample_reading(2.0)).unwrap();

        assert_eq!(temperature_of(&sub.recv().await.unwrap()), Some(1.0));
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_publishes_keep_order() {
        let broadcaster = Arc::new(Broadcaster::with_queue_capacity(128));
        let mut sub = broadcaster.subscribe();

        let producer = {
            let broadcaster = Arc::clone(&broadcaster);
            tokio::spawn(async move {
                for i in 0..100 {
                    broadcaster.publish(sample_reading(i as f64)).unwrap();
                }
            })
        };

        let mut last = -1.0;
        for _ in 0..100 {
            let temp = temperature_of(&sub.recv().await.unwrap()).unwrap();
            assert!(temp > last);
            last = temp;
        }
        producer.await.unwrap();
        assert_eq!(broadcaster.latest().unwrap().temperature, Some(99.0));
    }
}
