//! Plumbing shared by the Win32 backends: the one-registration-per-process
//! slot, the thread message loop, and the cross-thread stop request.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::warn;
use windows::Win32::Foundation::{GetLastError, LPARAM, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    DispatchMessageW, GetMessageW, PeekMessageW, PostQuitMessage, PostThreadMessageW,
    TranslateMessage, MSG, PM_NOREMOVE, WM_APP, WM_USER,
};

use super::{HookError, HookRegistration, PumpStopper};

/// Thread message asking the loop to uninstall and quit.
const WM_KEYWEAVE_STOP: u32 = WM_APP + 0x4B;

/// `true` while any Win32 backend holds a registration.
static OS_HOOK_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Exclusive claim on the process-wide interception point.
///
/// Released on drop; registrations move it into their release closure.
pub(super) struct ProcessSlot(());

impl ProcessSlot {
    pub(super) fn claim() -> Result<Self, HookError> {
        OS_HOOK_ACTIVE
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ProcessSlot(()))
            .map_err(|_| HookError::AlreadyInstalled)
    }
}

impl Drop for ProcessSlot {
    fn drop(&mut self) {
        OS_HOOK_ACTIVE.store(false, Ordering::SeqCst);
    }
}

/// Stops [`run_message_loop`] on the thread that created it.
pub(super) struct ThreadStopper {
    thread_id: u32,
}

impl ThreadStopper {
    /// Must be called on the thread that will run the message loop.
    pub(super) fn for_current_thread() -> Self {
        ensure_message_queue();
        // SAFETY: GetCurrentThreadId has no preconditions.
        let thread_id = unsafe { GetCurrentThreadId() };
        Self { thread_id }
    }
}

impl PumpStopper for ThreadStopper {
    fn request_stop(&self) {
        // SAFETY: posting to a thread id is valid even after that thread exits;
        // the call then simply fails.
        let posted =
            unsafe { PostThreadMessageW(self.thread_id, WM_KEYWEAVE_STOP, WPARAM(0), LPARAM(0)) };
        if let Err(e) = posted {
            warn!("could not post stop request to hook thread {}: {e}", self.thread_id);
        }
    }
}

/// Forces creation of this thread's message queue so a stop request posted
/// before the loop starts is not lost.
fn ensure_message_queue() {
    let mut msg = MSG::default();
    // SAFETY: msg is a valid out-pointer; PM_NOREMOVE leaves the queue untouched.
    unsafe {
        let _ = PeekMessageW(&mut msg, None, WM_USER, WM_USER, PM_NOREMOVE);
    }
}

/// Dispatches messages until [`ThreadStopper::request_stop`] or `WM_QUIT`.
///
/// The registration is released as soon as the stop request is seen, before
/// the remaining queue drains.
pub(super) fn run_message_loop(registration: HookRegistration) -> Result<(), HookError> {
    let mut registration = Some(registration);
    let mut msg = MSG::default();

    loop {
        // SAFETY: standard GetMessage/DispatchMessage loop on the owning thread.
        let ret = unsafe { GetMessageW(&mut msg, None, 0, 0) };
        match ret.0 {
            0 => break,
            -1 => {
                // SAFETY: GetLastError has no preconditions.
                let code = unsafe { GetLastError() }.0;
                return Err(HookError::Pump(format!("GetMessageW failed (error {code})")));
            }
            _ => {}
        }

        if msg.message == WM_KEYWEAVE_STOP {
            if let Some(active) = registration.take() {
                active.uninstall();
            }
            // SAFETY: posts WM_QUIT to this thread's own queue.
            unsafe { PostQuitMessage(0) };
            continue;
        }

        // SAFETY: msg was filled in by GetMessageW above.
        unsafe {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }

    drop(registration);
    Ok(())
}

/// Converts a failed registration call into [`HookError::InstallFailed`],
/// unwrapping Win32 error codes from their HRESULT form.
pub(super) fn install_failed(e: &windows::core::Error) -> HookError {
    let hr = e.code().0 as u32;
    let code = if hr & 0xFFFF_0000 == 0x8007_0000 {
        hr & 0xFFFF
    } else {
        hr
    };
    HookError::InstallFailed {
        code,
        message: e.message().to_string(),
    }
}
