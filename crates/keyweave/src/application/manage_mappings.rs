//! ManageMappingsUseCase: change the live remap table from a control thread.
//!
//! Every change is applied to the [`RemapEngine`] first, so it takes effect
//! for the very next key-down, and then handed to an optional
//! [`TablePersister`].  A persistence failure is logged and otherwise
//! ignored: the live table stays authoritative for this session.

use std::sync::Arc;

use keyweave_core::{RemapEngine, RemapTable, VirtualKey};
use tracing::warn;

/// Stores the remap table somewhere that outlives the process.
pub trait TablePersister: Send + Sync {
    fn persist(&self, table: &RemapTable) -> Result<(), String>;
}

/// The Manage Mappings use case.
pub struct ManageMappingsUseCase {
    engine: Arc<RemapEngine>,
    persister: Option<Arc<dyn TablePersister>>,
}

impl ManageMappingsUseCase {
    pub fn new(engine: Arc<RemapEngine>) -> Self {
        Self {
            engine,
            persister: None,
        }
    }

    pub fn with_persister(mut self, persister: Arc<dyn TablePersister>) -> Self {
        self.persister = Some(persister);
        self
    }

    /// Maps `source` to `target` (last write wins) and persists the table.
    pub fn remap_key(&self, source: VirtualKey, target: VirtualKey) {
        self.engine.remap_key(source, target);
        self.persist();
    }

    /// Removes the mapping for `source` and persists the table.
    ///
    /// Nothing is persisted when there was no mapping to remove.
    pub fn remove_mapping(&self, source: VirtualKey) {
        if self.engine.mapping_for(source).is_none() {
            self.engine.remove_mapping(source);
            return;
        }
        self.engine.remove_mapping(source);
        self.persist();
    }

    /// Returns a copy of the live table.
    pub fn table(&self) -> RemapTable {
        self.engine.snapshot()
    }

    fn persist(&self) {
        let Some(persister) = &self.persister else {
            return;
        };
        if let Err(e) = persister.persist(&self.engine.snapshot()) {
            warn!("failed to persist remap table: {e}");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
