//! EventPump: the dedicated thread that owns the interception backend.
//!
//! The OS delivers low-level hook callbacks on the installing thread, and only
//! while that thread dispatches messages.  [`EventPump::start`] therefore
//! builds, installs and pumps the backend on one named thread, and blocks the
//! caller until the install has either succeeded or failed, so a refused hook
//! is reported synchronously instead of leaving a silently dead remapper.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info};

use crate::application::remap_keys::KeyEventHandler;
use crate::infrastructure::hook::{HookCapabilities, HookError, InterceptionBackend, PumpStopper};

/// Name of the thread that runs the hook and its message loop.
pub const HOOK_THREAD_NAME: &str = "keyweave-hook-loop";

/// What the hook thread reports once the backend is installed.
struct Ready {
    stopper: Arc<dyn PumpStopper>,
    capabilities: HookCapabilities,
    backend: &'static str,
}

/// A running interception backend on its own thread.
///
/// Stopping (explicitly or on drop) releases the OS registration before the
/// thread exits and joins it.
pub struct EventPump {
    stopper: Arc<dyn PumpStopper>,
    capabilities: HookCapabilities,
    backend: &'static str,
    thread: Option<JoinHandle<Result<(), HookError>>>,
}

impl EventPump {
    /// Spawns the hook thread, creates the backend there with `make_backend`,
    /// installs `handler`, and starts dispatching.
    ///
    /// Returns only after the install result is known.
    pub fn start<B, F>(make_backend: F, handler: Arc<dyn KeyEventHandler>) -> Result<Self, HookError>
    where
        B: InterceptionBackend,
        F: FnOnce() -> Result<B, HookError> + Send + 'static,
    {
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<Ready, HookError>>(1);

        let thread = thread::Builder::new()
            .name(HOOK_THREAD_NAME.to_string())
            .spawn(move || {
                let installed = make_backend()
                    .and_then(|mut backend| backend.install(handler).map(|reg| (backend, reg)));
                let (mut backend, registration) = match installed {
                    Ok(pair) => pair,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return Ok(());
                    }
                };

                let ready = Ready {
                    stopper: backend.stopper(),
                    capabilities: backend.capabilities(),
                    backend: backend.name(),
                };
                if ready_tx.send(Ok(ready)).is_err() {
                    // Nobody is waiting; release the hook right away.
                    return Ok(());
                }
                backend.pump(registration)
            })
            .map_err(HookError::PumpSpawn)?;

        match ready_rx.recv() {
            Ok(Ok(ready)) => {
                info!(
                    "{} running on thread {HOOK_THREAD_NAME} (can suppress: {})",
                    ready.backend, ready.capabilities.can_suppress
                );
                Ok(Self {
                    stopper: ready.stopper,
                    capabilities: ready.capabilities,
                    backend: ready.backend,
                    thread: Some(thread),
                })
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(HookError::PumpTerminated)
            }
        }
    }

    pub fn capabilities(&self) -> HookCapabilities {
        self.capabilities
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend
    }

    /// Uninstalls the backend and joins the hook thread.
    pub fn stop(mut self) -> Result<(), HookError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), HookError> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        debug!("stopping {}", self.backend);
        self.stopper.request_stop();
        match thread.join() {
            Ok(result) => {
                info!("{} stopped", self.backend);
                result
            }
            Err(_) => Err(HookError::Pump("hook thread panicked".to_string())),
        }
    }
}

impl Drop for EventPump {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("hook thread did not shut down cleanly: {e}");
        }
    }
}
