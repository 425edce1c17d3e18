//! Keyboard interception backends.
//!
//! A backend registers a process-wide interception point with the OS and
//! reports every keyboard event to one [`KeyEventHandler`].  Windows delivers
//! those callbacks on the thread that installed the hook, and only while that
//! thread pumps messages, so the lifecycle is split in three:
//!
//! 1. [`InterceptionBackend::install`] registers and returns a
//!    [`HookRegistration`] guard.
//! 2. [`InterceptionBackend::pump`] blocks, dispatching OS messages, until a
//!    [`PumpStopper`] asks it to finish.  It releases the registration
//!    *before* returning.
//! 3. Dropping the guard at any point also releases the registration.
//!
//! [`crate::infrastructure::pump::EventPump`] runs all three on a dedicated
//! thread.
//!
//! # Backends
//!
//! | Backend                          | Can suppress | Notes                   |
//! |----------------------------------|--------------|-------------------------|
//! | `windows::LowLevelHookBackend`   | yes          | `WH_KEYBOARD_LL`        |
//! | `raw_input::RawInputBackend`     | no           | `RIDEV_INPUTSINK`       |
//! | `mock::MockHookBackend`          | configurable | tests; no OS calls      |

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::application::remap_keys::KeyEventHandler;

pub mod mock;

#[cfg(target_os = "windows")]
mod win32;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(target_os = "windows")]
pub mod raw_input;

/// What a backend can do with the events it observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookCapabilities {
    /// `false` for observe-only backends: remapped keys are emitted but the
    /// original key still reaches the application.
    pub can_suppress: bool,
}

/// Error type for installing and running an interception backend.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("failed to install keyboard hook (OS error {code}): {message}")]
    InstallFailed { code: u32, message: String },
    #[error("a keyboard hook is already installed in this process")]
    AlreadyInstalled,
    #[error("platform not supported: {0}")]
    UnsupportedPlatform(String),
    #[error("failed to spawn the hook thread: {0}")]
    PumpSpawn(#[source] std::io::Error),
    #[error("hook thread exited before reporting whether the hook was installed")]
    PumpTerminated,
    #[error("message pump failed: {0}")]
    Pump(String),
}

/// Asks a running [`InterceptionBackend::pump`] to release its registration
/// and return.  Callable from any thread; extra calls are harmless.
pub trait PumpStopper: Send + Sync {
    fn request_stop(&self);
}

/// Owned proof that an interception point is registered with the OS.
///
/// Releasing happens exactly once: through [`HookRegistration::uninstall`] or
/// on drop, whichever comes first.
pub struct HookRegistration {
    backend: &'static str,
    release: Option<Box<dyn FnOnce()>>,
}

impl HookRegistration {
    pub fn new(backend: &'static str, release: impl FnOnce() + 'static) -> Self {
        Self {
            backend,
            release: Some(Box::new(release)),
        }
    }

    pub fn backend(&self) -> &'static str {
        self.backend
    }

    /// Releases the registration now.
    pub fn uninstall(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
            debug!("{} uninstalled", self.backend);
        }
    }
}

impl Drop for HookRegistration {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for HookRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistration")
            .field("backend", &self.backend)
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// A keyboard interception mechanism.
///
/// Implementations are created, installed and pumped on the same thread and
/// need not be `Send`.
pub trait InterceptionBackend {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> HookCapabilities;

    /// Registers the interception point; events go to `handler` from now on.
    ///
    /// Fails with [`HookError::AlreadyInstalled`] while another registration
    /// is live.
    fn install(&mut self, handler: Arc<dyn KeyEventHandler>)
        -> Result<HookRegistration, HookError>;

    /// Returns a handle that stops [`InterceptionBackend::pump`] from another
    /// thread.
    fn stopper(&self) -> Arc<dyn PumpStopper>;

    /// Dispatches OS messages until stopped, then releases `registration`.
    fn pump(&mut self, registration: HookRegistration) -> Result<(), HookError>;
}
