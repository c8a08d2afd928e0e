//! Bounded, idempotent log of processed webhook deliveries.
//!
//! The store is the one piece of shared mutable state in the service. It is
//! constructed once at startup (optionally backed by a [`Journal`] file) and
//! injected into the HTTP handlers; tests build isolated instances.
//!
//! # Invariants
//!
//! - A `delivery_id` appears at most once. Appending a known id is a no-op.
//! - The store never holds more than `capacity` deliveries. Inserting past
//!   capacity evicts the oldest entry synchronously inside `append`.
//! - Entries are kept in insertion order and never mutated.
//!
//! Appends are serialized by a write lock, so two concurrent deliveries with
//! the same id can never both insert. Readers share the lock and see a
//! consistent snapshot. No lock is held across an `.await`.
//!
//! Once a delivery has been evicted its id is forgotten, so the dedup window
//! is the retention window.

use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use tracing::{debug, info, warn};

pub mod fsync;
pub mod journal;

pub use journal::{Journal, JournalError};

use crate::types::{DeliveryId, WebhookDelivery};

/// Default number of deliveries retained.
pub const DEFAULT_CAPACITY: usize = 500;

/// Result of appending a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    /// False when the delivery id was already present.
    pub inserted: bool,
}

/// Append-only, bounded store of webhook deliveries.
#[derive(Debug)]
pub struct EventStore {
    capacity: usize,
    inner: RwLock<StoreInner>,
}

#[derive(Debug, Default)]
struct StoreInner {
    entries: VecDeque<WebhookDelivery>,
    ids: HashSet<DeliveryId>,
    journal: Option<Journal>,
}

impl StoreInner {
    /// Inserts into memory only, evicting from the head past `capacity`.
    fn insert(&mut self, delivery: WebhookDelivery, capacity: usize) -> bool {
        if self.ids.contains(&delivery.delivery_id) {
            return false;
        }

        self.ids.insert(delivery.delivery_id.clone());
        self.entries.push_back(delivery);

        while self.entries.len() > capacity {
            if let Some(evicted) = self.entries.pop_front() {
                self.ids.remove(&evicted.delivery_id);
                debug!(delivery_id = %evicted.delivery_id, "Evicted oldest delivery");
            }
        }
        true
    }
}

impl EventStore {
    /// Creates an empty in-memory store. A capacity of zero is treated as one.
    pub fn in_memory(capacity: usize) -> Self {
        EventStore {
            capacity: capacity.max(1),
            inner: RwLock::new(StoreInner::default()),
        }
    }

    /// Creates a store backed by a journal file, restoring its retained entries.
    ///
    /// The newest `capacity` unique deliveries in the journal are loaded, and
    /// the journal is compacted if it has grown past its bound.
    pub fn with_journal(capacity: usize, path: impl AsRef<Path>) -> Result<Self, JournalError> {
        let store = Self::in_memory(capacity);
        let (mut journal, replayed) = Journal::open(path)?;
        let replayed_count = replayed.len();

        let mut inner = store.inner.write().unwrap_or_else(PoisonError::into_inner);
        for delivery in replayed {
            inner.insert(delivery, store.capacity);
        }

        if journal.lines() > inner.entries.len() {
            journal.compact(&inner.entries)?;
        }

        info!(
            path = %journal.path().display(),
            replayed = replayed_count,
            retained = inner.entries.len(),
            "Restored event store from journal"
        );

        inner.journal = Some(journal);
        drop(inner);
        Ok(store)
    }

    /// Appends a delivery unless its id is already stored.
    ///
    /// Never fails: journal errors are logged and leave the in-memory
    /// outcome unchanged.
    pub fn append(&self, delivery: WebhookDelivery) -> AppendOutcome {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        if inner.ids.contains(&delivery.delivery_id) {
            return AppendOutcome { inserted: false };
        }

        if let Some(journal) = inner.journal.as_mut() {
            if let Err(e) = journal.append(&delivery) {
                warn!(
                    delivery_id = %delivery.delivery_id,
                    error = %e,
                    "Failed to journal delivery"
                );
            }
        }

        let inserted = inner.insert(delivery, self.capacity);

        let StoreInner {
            entries, journal, ..
        } = &mut *inner;
        if let Some(journal) = journal.as_mut() {
            if journal.needs_compaction(self.capacity) {
                match journal.compact(entries.iter()) {
                    Ok(()) => debug!(retained = entries.len(), "Compacted event journal"),
                    Err(e) => warn!(error = %e, "Failed to compact event journal"),
                }
            }
        }

        AppendOutcome { inserted }
    }

    /// Returns up to `limit` deliveries, newest first.
    pub fn list_recent(&self, limit: usize) -> Vec<WebhookDelivery> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.entries.iter().rev().take(limit).cloned().collect()
    }

    /// Returns true if a delivery with this id is currently retained.
    pub fn contains(&self, id: &DeliveryId) -> bool {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.ids.contains(id)
    }

    /// Returns the number of retained deliveries.
    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventStore {
    fn default() -> Self {
        Self::in_memory(DEFAULT_CAPACITY)
    }
}
