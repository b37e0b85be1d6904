//! Latest-reading store.
//!
//! Holds the single most recent reading. Nothing older is kept.

use super::types::{Reading, Snapshot};
use std::sync::{Arc, PoisonError, RwLock};

/// Thread-safe holder for the last known reading.
///
/// The value is swapped as a whole under the lock, so readers observe
/// either the previous snapshot or the new one, never a mix.
#[derive(Debug, Default)]
pub struct ReadingStore {
    latest: RwLock<Option<Snapshot>>,
}

impl ReadingStore {
    /// Creates an empty store. No reading has arrived yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the stored snapshot unconditionally.
    pub fn set(&self, snapshot: Snapshot) {
        // A poisoned lock still guards a whole value; the swap below cannot
        // leave it half-written.
        let mut latest = self.latest.write().unwrap_or_else(PoisonError::into_inner);
        *latest = Some(snapshot);
    }

    /// Returns the latest reading, or `None` if nothing was ever stored.
    pub fn get(&self) -> Option<Arc<Reading>> {
        self.snapshot().map(|s| s.reading)
    }

    /// Returns the latest reading together with its serialized payload.
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns true once at least one reading has been stored.
    pub fn has_reading(&self) -> bool {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
