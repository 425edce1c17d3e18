//! [`KeyRemapper`]: the control surface a host embeds.
//!
//! Owns the shared [`RemapEngine`], the hook-callback use case, the mapping
//! management use case and, once started, the [`EventPump`].
//!
//! ```text
//! KeyRemapper
//!  ├─ RemapEngine            (table + KeyObserved subscriptions)
//!  ├─ ManageMappingsUseCase  (remap_key / remove_mapping, persists)
//!  ├─ RemapKeysUseCase       (runs inside the hook callback)
//!  └─ EventPump              (hook thread; present while running)
//! ```

use std::sync::mpsc::Receiver;
use std::sync::Arc;

use keyweave_core::{RemapEngine, RemapTable, VirtualKey};
use tracing::{error, info};

use crate::application::manage_mappings::{ManageMappingsUseCase, TablePersister};
use crate::application::remap_keys::{
    HookStatsSnapshot, KeyEventHandler, KeyInjector, RemapKeysUseCase,
};
use crate::infrastructure::hook::{HookCapabilities, HookError, InterceptionBackend};
use crate::infrastructure::pump::EventPump;

/// System-wide key remapper.
pub struct KeyRemapper {
    engine: Arc<RemapEngine>,
    mappings: ManageMappingsUseCase,
    handler: Arc<RemapKeysUseCase>,
    pump: Option<EventPump>,
}

impl KeyRemapper {
    /// Creates a stopped remapper with `table` as its initial mappings.
    pub fn new(table: RemapTable, injector: Arc<dyn KeyInjector>) -> Self {
        let engine = Arc::new(RemapEngine::new(table));
        Self {
            mappings: ManageMappingsUseCase::new(Arc::clone(&engine)),
            handler: Arc::new(RemapKeysUseCase::new(Arc::clone(&engine), injector)),
            engine,
            pump: None,
        }
    }

    /// Persists the table through `persister` after every change.
    pub fn with_persister(mut self, persister: Arc<dyn TablePersister>) -> Self {
        self.mappings =
            ManageMappingsUseCase::new(Arc::clone(&self.engine)).with_persister(persister);
        self
    }

    /// Installs the backend built by `make_backend` on the hook thread and
    /// starts remapping.
    ///
    /// # Errors
    ///
    /// [`HookError::AlreadyInstalled`] if this remapper is already running,
    /// otherwise whatever the backend reported while installing.
    pub fn start<B, F>(&mut self, make_backend: F) -> Result<HookCapabilities, HookError>
    where
        B: InterceptionBackend,
        F: FnOnce() -> Result<B, HookError> + Send + 'static,
    {
        if self.pump.is_some() {
            return Err(HookError::AlreadyInstalled);
        }
        let handler: Arc<dyn KeyEventHandler> = self.handler.clone();
        let pump = EventPump::start(make_backend, handler)?;
        let capabilities = pump.capabilities();
        info!(
            "remapping {} keys via {}",
            self.engine.snapshot().len(),
            pump.backend_name()
        );
        self.pump = Some(pump);
        Ok(capabilities)
    }

    pub fn is_running(&self) -> bool {
        self.pump.is_some()
    }

    /// Capabilities of the running backend, if any.
    pub fn capabilities(&self) -> Option<HookCapabilities> {
        self.pump.as_ref().map(EventPump::capabilities)
    }

    /// Maps `source` to `target`; takes effect on the next key-down.
    pub fn remap_key(&self, source: VirtualKey, target: VirtualKey) {
        self.mappings.remap_key(source, target);
    }

    /// Removes the mapping for `source`, if any.
    pub fn remove_mapping(&self, source: VirtualKey) {
        self.mappings.remove_mapping(source);
    }

    /// Copy of the live table.
    pub fn table(&self) -> RemapTable {
        self.mappings.table()
    }

    /// Receives the resulting key of every physical key-down (`KeyObserved`).
    pub fn subscribe(&self) -> Receiver<VirtualKey> {
        self.engine.subscribe()
    }

    pub fn stats(&self) -> HookStatsSnapshot {
        self.handler.stats()
    }

    /// The handler the hook calls; injectors that loop back need it.
    pub fn event_handler(&self) -> Arc<dyn KeyEventHandler> {
        self.handler.clone()
    }

    /// Uninstalls the hook and joins the hook thread.  No-op when stopped.
    pub fn stop(&mut self) -> Result<(), HookError> {
        match self.pump.take() {
            Some(pump) => pump.stop(),
            None => Ok(()),
        }
    }
}

impl Drop for KeyRemapper {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!("failed to stop remapper cleanly: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::hook::mock::mock_hook;
    use crate::infrastructure::injector::mock::RecordingInjector;

    #[test]
    fn test_start_twice_reports_already_installed() {
        // Arrange
        let mut remapper = KeyRemapper::new(RemapTable::new(), Arc::new(RecordingInjector::new()));
        let (first, _kb1) = mock_hook(HookCapabilities { can_suppress: true });
        let (second, kb2) = mock_hook(HookCapabilities { can_suppress: true });

        // Act
        remapper.start(move || Ok(first)).expect("first start");
        let result = remapper.start(move || Ok(second));

        // Assert
        assert!(matches!(result, Err(HookError::AlreadyInstalled)));
        assert_eq!(kb2.install_calls(), 0);
        assert!(remapper.is_running());
    }

    #[test]
    fn test_stop_then_restart() {
        let mut remapper = KeyRemapper::new(RemapTable::new(), Arc::new(RecordingInjector::new()));
        let (first, kb1) = mock_hook(HookCapabilities { can_suppress: true });
        let (second, kb2) = mock_hook(HookCapabilities { can_suppress: true });

        remapper.start(move || Ok(first)).expect("start");
        remapper.stop().expect("stop");
        assert!(!kb1.is_installed());
        assert!(!remapper.is_running());

        remapper.start(move || Ok(second)).expect("restart");
        assert!(kb2.is_installed());
    }

    #[test]
    fn test_stop_when_not_running_is_noop() {
        let mut remapper = KeyRemapper::new(RemapTable::new(), Arc::new(RecordingInjector::new()));
        assert!(remapper.stop().is_ok());
        assert_eq!(remapper.capabilities(), None);
    }
}
