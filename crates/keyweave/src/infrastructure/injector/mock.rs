//! Recording injector for tests.
//!
//! [`RecordingInjector`] replaces `SendInput` with in-memory recording.  Each
//! emitted event is pushed into a `Mutex<Vec<...>>` so assertions can inspect
//! exactly what would have been submitted, and in what order.
//!
//! # Loopback
//!
//! On a real system every injected event passes through the global hook
//! again.  [`RecordingInjector::connect_loopback`] reproduces that: emitted
//! events are handed straight back to the hook handler (re-entrantly, on the
//! emitting thread) and the handler's verdicts are recorded.  A handler that
//! failed to recognise its own output would recurse; the injector panics past
//! a small depth instead of overflowing the stack.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use keyweave_core::{press_pair, KeyEvent, VirtualKey};

use crate::application::remap_keys::{HookAction, InjectionError, KeyEventHandler, KeyInjector};

const MAX_LOOPBACK_DEPTH: usize = 8;

/// An injector that records all calls without performing OS API calls.
#[derive(Default)]
pub struct RecordingInjector {
    emitted: Mutex<Vec<KeyEvent>>,
    loopback: Mutex<Option<Weak<dyn KeyEventHandler>>>,
    loopback_actions: Mutex<Vec<HookAction>>,
    depth: AtomicUsize,
    /// When `true`, `emit` fails as if the OS accepted none of the events.
    should_fail: AtomicBool,
}

impl RecordingInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let injector = Self::default();
        injector.set_should_fail(true);
        injector
    }

    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::SeqCst);
    }

    /// Feeds every emitted event back into `handler`.
    pub fn connect_loopback(&self, handler: &Arc<dyn KeyEventHandler>) {
        *self.loopback.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Arc::downgrade(handler));
    }

    /// All events submitted so far, in submission order.
    pub fn emitted(&self) -> Vec<KeyEvent> {
        self.emitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Keys of the emitted key-down events.
    pub fn emitted_presses(&self) -> Vec<VirtualKey> {
        self.emitted()
            .into_iter()
            .filter(KeyEvent::is_down)
            .map(|event| event.key)
            .collect()
    }

    /// What the hook handler decided for each looped-back event.
    pub fn loopback_actions(&self) -> Vec<HookAction> {
        self.loopback_actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn loop_back(&self, events: &[KeyEvent]) {
        let handler = self
            .loopback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade);
        let Some(handler) = handler else {
            return;
        };

        let depth = self.depth.fetch_add(1, Ordering::SeqCst) + 1;
        assert!(
            depth <= MAX_LOOPBACK_DEPTH,
            "injected events re-entered the handler {depth} times; injection loop"
        );
        for event in events {
            let action = handler.handle(event);
            self.loopback_actions
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(action);
        }
        self.depth.fetch_sub(1, Ordering::SeqCst);
    }
}

impl KeyInjector for RecordingInjector {
    fn emit(&self, key: VirtualKey) -> Result<(), InjectionError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(InjectionError::Rejected {
                submitted: 2,
                accepted: 0,
                code: 5,
            });
        }
        let events = press_pair(key);
        self.emitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(&events);
        self.loop_back(&events);
        Ok(())
    }
}
