//! Windows low-level keyboard hook (`WH_KEYBOARD_LL`).
//!
//! The only backend that can suppress: returning non-zero from the hook proc
//! without calling `CallNextHookEx` swallows the event system-wide.
//!
//! `WH_KEYBOARD_LL` procs get no user pointer, so the handler lives in a
//! thread-local slot on the hook thread; the OS calls the proc on that same
//! thread.  A panic inside the handler is caught at the FFI boundary and the
//! event is forwarded.
//!
//! # Safety
//!
//! This module uses `unsafe` code exclusively for Windows API FFI calls.
//! All `unsafe` blocks are annotated with `// SAFETY:` comments.

#![cfg(target_os = "windows")]

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use keyweave_core::{KeyEvent, KeyTransition, VirtualKey};
use tracing::{error, info};
use windows::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, SetWindowsHookExW, UnhookWindowsHookEx, HC_ACTION, KBDLLHOOKSTRUCT,
    KBDLLHOOKSTRUCT_FLAGS, LLKHF_INJECTED, WH_KEYBOARD_LL, WM_KEYDOWN, WM_KEYUP, WM_SYSKEYDOWN,
    WM_SYSKEYUP,
};

use super::win32::{install_failed, run_message_loop, ProcessSlot, ThreadStopper};
use super::{HookCapabilities, HookError, HookRegistration, InterceptionBackend, PumpStopper};
use crate::application::remap_keys::{HookAction, KeyEventHandler};

thread_local! {
    static HANDLER: RefCell<Option<Arc<dyn KeyEventHandler>>> = const { RefCell::new(None) };
}

/// Windows `WH_KEYBOARD_LL` interception backend.
///
/// Create it on the thread that will pump; see
/// [`crate::infrastructure::pump::EventPump`].
pub struct LowLevelHookBackend {
    stopper: Arc<ThreadStopper>,
}

impl LowLevelHookBackend {
    pub fn new() -> Result<Self, HookError> {
        Ok(Self {
            stopper: Arc::new(ThreadStopper::for_current_thread()),
        })
    }
}

impl InterceptionBackend for LowLevelHookBackend {
    fn name(&self) -> &'static str {
        "low-level keyboard hook"
    }

    fn capabilities(&self) -> HookCapabilities {
        HookCapabilities { can_suppress: true }
    }

    fn install(
        &mut self,
        handler: Arc<dyn KeyEventHandler>,
    ) -> Result<HookRegistration, HookError> {
        let slot = ProcessSlot::claim()?;
        HANDLER.with(|h| *h.borrow_mut() = Some(handler));

        // SAFETY: keyboard_hook_proc matches HOOKPROC and lives for the whole
        // process; a global LL hook needs no module handle for an in-process proc.
        let hook = unsafe { SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), None, 0) };
        let hook = match hook {
            Ok(hook) => hook,
            Err(e) => {
                HANDLER.with(|h| h.borrow_mut().take());
                return Err(install_failed(&e));
            }
        };
        info!("WH_KEYBOARD_LL hook installed");

        Ok(HookRegistration::new(self.name(), move || {
            // SAFETY: hook came from SetWindowsHookExW and is unhooked once.
            if let Err(e) = unsafe { UnhookWindowsHookEx(hook) } {
                error!("UnhookWindowsHookEx failed: {e}");
            }
            HANDLER.with(|h| h.borrow_mut().take());
            drop(slot);
        }))
    }

    fn stopper(&self) -> Arc<dyn PumpStopper> {
        self.stopper.clone()
    }

    fn pump(&mut self, registration: HookRegistration) -> Result<(), HookError> {
        run_message_loop(registration)
    }
}

/// Reads the fields the handler needs out of the hook struct.
fn to_key_event(kbs: &KBDLLHOOKSTRUCT, transition: KeyTransition) -> KeyEvent {
    KeyEvent {
        key: VirtualKey::new(kbs.vkCode as u16),
        transition,
        scan_code: kbs.scanCode as u16,
        extra_info: kbs.dwExtraInfo,
        os_injected: (kbs.flags & LLKHF_INJECTED) != KBDLLHOOKSTRUCT_FLAGS(0),
    }
}

fn dispatch(event: &KeyEvent) -> HookAction {
    // Clone out so the RefCell is not borrowed while the handler runs; emitting
    // input from inside the handler can re-enter this proc.
    let handler = HANDLER.with(|h| h.borrow().clone());
    match handler {
        Some(handler) => panic::catch_unwind(AssertUnwindSafe(|| handler.handle(event)))
            .unwrap_or_else(|_| {
                error!("key handler panicked on {}; forwarding event", event.key);
                HookAction::Forward
            }),
        None => HookAction::Forward,
    }
}

/// Low-level keyboard hook callback.
///
/// # Safety
///
/// This function is called by Windows from the hook message loop thread.
/// It must return quickly (< ~300ms) to avoid hook removal by the OS.
unsafe extern "system" fn keyboard_hook_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code != HC_ACTION as i32 {
        // SAFETY: Must call CallNextHookEx when n_code < 0.
        return CallNextHookEx(None, n_code, w_param, l_param);
    }

    let transition = match w_param.0 as u32 {
        WM_KEYDOWN | WM_SYSKEYDOWN => KeyTransition::Down,
        WM_KEYUP | WM_SYSKEYUP => KeyTransition::Up,
        _ => return CallNextHookEx(None, n_code, w_param, l_param),
    };

    // SAFETY: l_param points to a KBDLLHOOKSTRUCT when n_code == HC_ACTION.
    let kbs = &*(l_param.0 as *const KBDLLHOOKSTRUCT);
    let event = to_key_event(kbs, transition);

    match dispatch(&event) {
        HookAction::Suppress => LRESULT(1),
        // SAFETY: Forward the event to the next hook in the chain.
        HookAction::Forward => CallNextHookEx(None, n_code, w_param, l_param),
    }
}
