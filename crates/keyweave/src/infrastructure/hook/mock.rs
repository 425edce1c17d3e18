//! Mock interception backend for tests.
//!
//! [`mock_hook`] returns a backend plus a [`MockKeyboard`] handle.  The
//! backend runs inside the real [`EventPump`] thread like an OS hook would;
//! the keyboard sends it "physical" events and waits for the handler's
//! [`HookAction`], so tests observe exactly what the OS would have been told.
//!
//! [`EventPump`]: crate::infrastructure::pump::EventPump

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};

use keyweave_core::{KeyEvent, VirtualKey};

use super::{HookCapabilities, HookError, HookRegistration, InterceptionBackend, PumpStopper};
use crate::application::remap_keys::{HookAction, KeyEventHandler};

enum MockCommand {
    Deliver(KeyEvent, Sender<HookAction>),
    Stop,
}

type HandlerSlot = Arc<Mutex<Option<Arc<dyn KeyEventHandler>>>>;

/// State visible from both the backend and its keyboard handle.
#[derive(Default)]
struct Shared {
    installed: AtomicBool,
    install_calls: AtomicUsize,
    uninstall_calls: AtomicUsize,
    fail_install: AtomicBool,
}

/// Test backend driven by a [`MockKeyboard`].
pub struct MockHookBackend {
    commands: Receiver<MockCommand>,
    control: Sender<MockCommand>,
    capabilities: HookCapabilities,
    handler: HandlerSlot,
    shared: Arc<Shared>,
}

/// Sends simulated physical key events to a [`MockHookBackend`].
#[derive(Clone)]
pub struct MockKeyboard {
    commands: Sender<MockCommand>,
    shared: Arc<Shared>,
}

/// Creates a connected backend/keyboard pair.
pub fn mock_hook(capabilities: HookCapabilities) -> (MockHookBackend, MockKeyboard) {
    let (tx, rx) = mpsc::channel();
    let shared = Arc::new(Shared::default());
    let backend = MockHookBackend {
        commands: rx,
        control: tx.clone(),
        capabilities,
        handler: Arc::new(Mutex::new(None)),
        shared: Arc::clone(&shared),
    };
    (backend, MockKeyboard { commands: tx, shared })
}

impl MockKeyboard {
    /// Delivers `event` and returns the handler's verdict.
    ///
    /// Returns `None` once the pump has exited.  Observe-only backends always
    /// report [`HookAction::Forward`], whatever the handler returned.
    pub fn send(&self, event: KeyEvent) -> Option<HookAction> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.commands.send(MockCommand::Deliver(event, reply_tx)).ok()?;
        reply_rx.recv().ok()
    }

    /// Presses and releases `key`; returns the (down, up) verdicts.
    pub fn tap(&self, key: VirtualKey) -> Option<(HookAction, HookAction)> {
        let down = self.send(KeyEvent::key_down(key))?;
        let up = self.send(KeyEvent::key_up(key))?;
        Some((down, up))
    }

    pub fn is_installed(&self) -> bool {
        self.shared.installed.load(Ordering::SeqCst)
    }

    pub fn install_calls(&self) -> usize {
        self.shared.install_calls.load(Ordering::SeqCst)
    }

    pub fn uninstall_calls(&self) -> usize {
        self.shared.uninstall_calls.load(Ordering::SeqCst)
    }

    /// Makes the next `install` fail as if the OS refused the hook.
    pub fn fail_next_install(&self) {
        self.shared.fail_install.store(true, Ordering::SeqCst);
    }
}

impl InterceptionBackend for MockHookBackend {
    fn name(&self) -> &'static str {
        "mock hook"
    }

    fn capabilities(&self) -> HookCapabilities {
        self.capabilities
    }

    fn install(
        &mut self,
        handler: Arc<dyn KeyEventHandler>,
    ) -> Result<HookRegistration, HookError> {
        self.shared.install_calls.fetch_add(1, Ordering::SeqCst);
        if self.shared.fail_install.swap(false, Ordering::SeqCst) {
            return Err(HookError::InstallFailed {
                code: 5,
                message: "mock install failure".into(),
            });
        }
        if self.shared.installed.swap(true, Ordering::SeqCst) {
            return Err(HookError::AlreadyInstalled);
        }
        *self.handler.lock().unwrap_or_else(PoisonError::into_inner) = Some(handler);

        let slot = Arc::clone(&self.handler);
        let shared = Arc::clone(&self.shared);
        Ok(HookRegistration::new(self.name(), move || {
            slot.lock().unwrap_or_else(PoisonError::into_inner).take();
            shared.uninstall_calls.fetch_add(1, Ordering::SeqCst);
            shared.installed.store(false, Ordering::SeqCst);
        }))
    }

    fn stopper(&self) -> Arc<dyn PumpStopper> {
        Arc::new(MockStopper {
            control: self.control.clone(),
        })
    }

    fn pump(&mut self, registration: HookRegistration) -> Result<(), HookError> {
        let mut registration = Some(registration);
        while let Ok(command) = self.commands.recv() {
            match command {
                MockCommand::Deliver(event, reply) => {
                    let handler = self
                        .handler
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .clone();
                    let action = match handler {
                        Some(handler) => handler.handle(&event),
                        None => HookAction::Forward,
                    };
                    let action = if self.capabilities.can_suppress {
                        action
                    } else {
                        HookAction::Forward
                    };
                    let _ = reply.send(action);
                }
                MockCommand::Stop => {
                    if let Some(active) = registration.take() {
                        active.uninstall();
                    }
                    break;
                }
            }
        }
        Ok(())
    }
}

struct MockStopper {
    control: Sender<MockCommand>,
}

impl PumpStopper for MockStopper {
    fn request_stop(&self) {
        let _ = self.control.send(MockCommand::Stop);
    }
}
