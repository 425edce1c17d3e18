//! [`RemapEngine`]: the live remap table and the per-key decision.
//!
//! # Threading
//!
//! The hook thread reads the table on every key-down; a control thread may
//! call [`RemapEngine::remap_key`] / [`RemapEngine::remove_mapping`] at any
//! time.  The table sits behind an `RwLock`, and every lookup copies the target
//! out and drops the guard before returning, so a caller that goes on to inject
//! input (which can re-enter the hook on the same thread) never holds the lock.
//!
//! Lock poisoning is recovered rather than propagated: a panic on a control
//! thread must not take system-wide keyboard input down with it.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, PoisonError, RwLock};

use tracing::{debug, info};

use crate::keys::VirtualKey;
use crate::remap::table::RemapTable;

/// Outcome of looking up one observed key-down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Consume the physical event and emit the contained key instead.
    Suppress(VirtualKey),
    /// Deliver the physical event unchanged.
    PassThrough,
}

impl Decision {
    /// The key an observer should see for an event that was `original`.
    pub fn resulting_key(self, original: VirtualKey) -> VirtualKey {
        match self {
            Decision::Suppress(mapped) => mapped,
            Decision::PassThrough => original,
        }
    }
}

/// Owner of the live [`RemapTable`] and of the `KeyObserved` subscriptions.
#[derive(Debug, Default)]
pub struct RemapEngine {
    table: RwLock<RemapTable>,
    observers: Mutex<Vec<Sender<VirtualKey>>>,
}

impl RemapEngine {
    /// Creates an engine that starts with `table`.
    pub fn new(table: RemapTable) -> Self {
        Self {
            table: RwLock::new(table),
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Looks `key` up without notifying anyone.
    pub fn decide(&self, key: VirtualKey) -> Decision {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        match table.get(key) {
            Some(mapped) => Decision::Suppress(mapped),
            None => Decision::PassThrough,
        }
    }

    /// Decides for a physical, non-injected key-down and publishes the
    /// resulting key to every `KeyObserved` subscriber.
    ///
    /// Call exactly once per such key-down; the hook pipeline does.
    pub fn observe_key_down(&self, key: VirtualKey) -> Decision {
        let decision = self.decide(key);
        self.publish(decision.resulting_key(key));
        decision
    }

    /// Maps `source` to `target`, replacing any existing target.
    pub fn remap_key(&self, source: VirtualKey, target: VirtualKey) {
        let previous = self
            .table
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(source, target);
        match previous {
            Some(old) if old != target => info!("remapped {source}: {old} -> {target}"),
            Some(_) => debug!("mapping {source} -> {target} unchanged"),
            None => info!("mapped {source} -> {target}"),
        }
    }

    /// Removes the mapping for `source`; absent mappings are ignored.
    pub fn remove_mapping(&self, source: VirtualKey) {
        let removed = self
            .table
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(source);
        match removed {
            Some(target) => info!("unmapped {source} (was -> {target})"),
            None => debug!("no mapping for {source} to remove"),
        }
    }

    /// Returns the current target for `source`.
    pub fn mapping_for(&self, source: VirtualKey) -> Option<VirtualKey> {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(source)
    }

    /// Copies the live table, e.g. for persisting it.
    pub fn snapshot(&self) -> RemapTable {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swaps in a whole new table in one step.
    pub fn replace_table(&self, table: RemapTable) {
        let count = table.len();
        *self.table.write().unwrap_or_else(PoisonError::into_inner) = table;
        info!("remap table replaced ({count} mappings)");
    }

    /// Registers a `KeyObserved` subscriber.
    ///
    /// The channel is unbounded so publishing never blocks the hook thread.
    /// Dropping the receiver unsubscribes; the sender is pruned on the next
    /// publish.
    pub fn subscribe(&self) -> Receiver<VirtualKey> {
        let (tx, rx) = mpsc::channel();
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    fn publish(&self, key: VirtualKey) {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        observers.retain(|tx| tx.send(key).is_ok());
    }
}
