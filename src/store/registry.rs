//! Registry of live subscriber connections.
//!
//! Each subscriber is represented by a [`SubscriberHandle`]: the sending half
//! of a bounded queue drained by that subscriber's connection task. The
//! registry owns every live handle; dropping a handle closes its queue, which
//! is how the connection task learns it has been cut off.

use super::types::Payload;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque, process-unique token identifying one subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    fn next() -> Self {
        Self(NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Reason a payload could not be handed to a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The subscriber's queue is full; the peer is not keeping up.
    Lagging,
    /// The subscriber's connection task has gone away.
    Closed,
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryError::Lagging => write!(f, "subscriber queue is full"),
            DeliveryError::Closed => write!(f, "subscriber connection is closed"),
        }
    }
}

impl std::error::Error for DeliveryError {}

/// Delivery end of one subscriber connection.
#[derive(Debug)]
pub struct SubscriberHandle {
    id: SubscriberId,
    tx: mpsc::Sender<Payload>,
}

impl SubscriberHandle {
    /// Creates a handle with a queue of `capacity` pending payloads.
    ///
    /// The returned receiver belongs to the connection task; it yields `None`
    /// once the handle has been dropped by the registry.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Payload>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                id: SubscriberId::next(),
                tx,
            },
            rx,
        )
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Attempts to enqueue `payload` without waiting.
    ///
    /// Any failure is final: the caller is expected to drop this handle.
    pub fn deliver(&self, payload: &Payload) -> Result<(), DeliveryError> {
        self.tx.try_send(Payload::clone(payload)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Lagging,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

/// Outcome of one fan-out pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers that accepted the payload.
    pub delivered: usize,
    /// Subscribers removed because delivery failed.
    pub pruned: usize,
}

/// Concurrent set of live subscriber handles.
///
/// A single mutex guards the set. It is held only for one add/remove or for
/// one iterate-and-prune pass, and deliveries inside that pass never block.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    subscribers: Mutex<HashMap<SubscriberId, SubscriberHandle>>,
}

impl SubscriberRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SubscriberId, SubscriberHandle>> {
        // Nothing under this lock can panic half-way through a mutation.
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a handle to the live set. It receives every later broadcast.
    pub fn register(&self, handle: SubscriberHandle) -> SubscriberId {
        self.register_with(handle, |_| {})
    }

    /// Adds a handle and runs `on_registered` against it before the lock is
    /// released, so no broadcast can slip in between the two.
    pub fn register_with<F>(&self, handle: SubscriberHandle, on_registered: F) -> SubscriberId
    where
        F: FnOnce(&SubscriberHandle),
    {
        let id = handle.id();
        let mut subscribers = self.lock();
        on_registered(&handle);
        subscribers.insert(id, handle);
        id
    }

    /// Removes a handle if it is still registered.
    ///
    /// Returns whether anything was removed. Unknown or already removed ids
    /// are a no-op.
    pub fn deregister(&self, id: SubscriberId) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// Delivers `payload` to every registered handle.
    ///
    /// Handles that fail are removed and dropped in the same pass, which
    /// closes their queues. One failure never affects delivery to others.
    pub fn broadcast(&self, payload: &Payload) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let mut subscribers = self.lock();

        subscribers.retain(|id, handle| match handle.deliver(payload) {
            Ok(()) => {
                report.delivered += 1;
                true
            }
            Err(e) => {
                tracing::warn!(subscriber = %id, error = %e, "Dropping subscriber after failed delivery");
                report.pruned += 1;
                false
            }
        });

        report
    }

    /// Point-in-time number of live handles.
    pub fn count(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if `id` is currently registered.
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.lock().contains_key(&id)
    }
}
