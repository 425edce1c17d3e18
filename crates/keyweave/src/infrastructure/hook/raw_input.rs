//! Windows Raw Input backend (observe-only).
//!
//! Registers a message-only window for keyboard raw input with
//! `RIDEV_INPUTSINK`, so `WM_INPUT` arrives whatever window has focus.  Raw
//! input is delivered after the fact and cannot be blocked: the handler still
//! runs (mapped keys get emitted), but the action it returns is ignored and the
//! original key reaches the application too.
//!
//! Injected input arrives with a null device handle; the marker travels in
//! `RAWKEYBOARD::ExtraInformation`.
//!
//! # Safety
//!
//! All `unsafe` blocks are Windows API FFI calls, annotated with `// SAFETY:`.

#![cfg(target_os = "windows")]

use std::cell::RefCell;
use std::mem::size_of;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use keyweave_core::{KeyEvent, KeyTransition, VirtualKey};
use tracing::{debug, error, info};
use windows::core::w;
use windows::Win32::Foundation::{
    GetLastError, ERROR_CLASS_ALREADY_EXISTS, HWND, LPARAM, LRESULT, WPARAM,
};
use windows::Win32::UI::Input::{
    GetRawInputData, RegisterRawInputDevices, HRAWINPUT, RAWINPUT, RAWINPUTDEVICE, RAWINPUTHEADER,
    RAWKEYBOARD, RIDEV_INPUTSINK, RIDEV_REMOVE, RID_INPUT, RIM_TYPEKEYBOARD,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, RegisterClassW, UnregisterClassW,
    HWND_MESSAGE, WINDOW_EX_STYLE, WM_INPUT, WNDCLASSW, WS_OVERLAPPED,
};

use super::win32::{install_failed, run_message_loop, ProcessSlot, ThreadStopper};
use super::{HookCapabilities, HookError, HookRegistration, InterceptionBackend, PumpStopper};
use crate::application::remap_keys::KeyEventHandler;

thread_local! {
    static HANDLER: RefCell<Option<Arc<dyn KeyEventHandler>>> = const { RefCell::new(None) };
}

/// `RAWKEYBOARD::Flags` bit set on key release.
const RI_KEY_BREAK: u16 = 0x0001;
const USAGE_PAGE_GENERIC_DESKTOP: u16 = 0x01;
const USAGE_KEYBOARD: u16 = 0x06;

/// Windows Raw Input interception backend.
pub struct RawInputBackend {
    stopper: Arc<ThreadStopper>,
}

impl RawInputBackend {
    pub fn new() -> Result<Self, HookError> {
        Ok(Self {
            stopper: Arc::new(ThreadStopper::for_current_thread()),
        })
    }
}

impl InterceptionBackend for RawInputBackend {
    fn name(&self) -> &'static str {
        "raw input sink"
    }

    fn capabilities(&self) -> HookCapabilities {
        HookCapabilities {
            can_suppress: false,
        }
    }

    fn install(
        &mut self,
        handler: Arc<dyn KeyEventHandler>,
    ) -> Result<HookRegistration, HookError> {
        let slot = ProcessSlot::claim()?;
        let class_name = w!("KeyweaveRawInputSink");

        let wc = WNDCLASSW {
            lpfnWndProc: Some(window_proc),
            lpszClassName: class_name,
            ..Default::default()
        };
        // SAFETY: wc is fully initialised and class_name is a static string.
        if unsafe { RegisterClassW(&wc) } == 0 {
            // SAFETY: GetLastError has no preconditions.
            let err = unsafe { GetLastError() };
            if err != ERROR_CLASS_ALREADY_EXISTS {
                return Err(HookError::InstallFailed {
                    code: err.0,
                    message: "RegisterClassW failed".into(),
                });
            }
            debug!("raw input window class already registered, reusing");
        }

        // SAFETY: message-only window owned by this thread, destroyed on release.
        let hwnd = unsafe {
            CreateWindowExW(
                WINDOW_EX_STYLE::default(),
                class_name,
                w!("Keyweave raw input"),
                WS_OVERLAPPED,
                0,
                0,
                0,
                0,
                Some(HWND_MESSAGE),
                None,
                None,
                None,
            )
        }
        .map_err(|e| install_failed(&e))?;

        let device = RAWINPUTDEVICE {
            usUsagePage: USAGE_PAGE_GENERIC_DESKTOP,
            usUsage: USAGE_KEYBOARD,
            dwFlags: RIDEV_INPUTSINK,
            hwndTarget: hwnd,
        };
        // SAFETY: device is a valid RAWINPUTDEVICE targeting our own window.
        let registered =
            unsafe { RegisterRawInputDevices(&[device], size_of::<RAWINPUTDEVICE>() as u32) };
        if let Err(e) = registered {
            // SAFETY: hwnd was created above on this thread.
            let _ = unsafe { DestroyWindow(hwnd) };
            return Err(install_failed(&e));
        }

        HANDLER.with(|h| *h.borrow_mut() = Some(handler));
        info!("raw keyboard input registered (observe-only)");

        Ok(HookRegistration::new(self.name(), move || {
            let remove = RAWINPUTDEVICE {
                usUsagePage: USAGE_PAGE_GENERIC_DESKTOP,
                usUsage: USAGE_KEYBOARD,
                dwFlags: RIDEV_REMOVE,
                hwndTarget: HWND::default(),
            };
            // SAFETY: removing our own registration; hwnd belongs to this thread.
            unsafe {
                let removed =
                    RegisterRawInputDevices(&[remove], size_of::<RAWINPUTDEVICE>() as u32);
                if let Err(e) = removed {
                    error!("failed to remove raw input registration: {e}");
                }
                let _ = DestroyWindow(hwnd);
                let _ = UnregisterClassW(class_name, None);
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

fn to_key_event(keyboard: &RAWKEYBOARD, from_device: bool) -> KeyEvent {
    let transition = if keyboard.Flags & RI_KEY_BREAK != 0 {
        KeyTransition::Up
    } else {
        KeyTransition::Down
    };
    KeyEvent {
        key: VirtualKey::new(keyboard.VKey),
        transition,
        scan_code: keyboard.MakeCode,
        extra_info: keyboard.ExtraInformation as usize,
        os_injected: !from_device,
    }
}

unsafe extern "system" fn window_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    if msg == WM_INPUT {
        if let Some(event) = read_raw_keyboard(HRAWINPUT(lparam.0 as _)) {
            let handler = HANDLER.with(|h| h.borrow().clone());
            if let Some(handler) = handler {
                // The action is ignored: raw input cannot be suppressed.
                if panic::catch_unwind(AssertUnwindSafe(|| handler.handle(&event))).is_err() {
                    error!("key handler panicked on {}", event.key);
                }
            }
        }
    }
    // SAFETY: default processing is required for WM_INPUT cleanup as well.
    DefWindowProcW(hwnd, msg, wparam, lparam)
}

/// Copies one keyboard raw-input packet out of the OS buffer.
unsafe fn read_raw_keyboard(hrawinput: HRAWINPUT) -> Option<KeyEvent> {
    let header_size = size_of::<RAWINPUTHEADER>() as u32;
    let mut size: u32 = 0;
    // SAFETY: a null buffer asks only for the required size.
    GetRawInputData(hrawinput, RID_INPUT, None, &mut size, header_size);
    if size == 0 {
        return None;
    }

    let mut buffer = vec![0u8; size as usize];
    // SAFETY: buffer holds exactly `size` bytes as reported above.
    let copied = GetRawInputData(
        hrawinput,
        RID_INPUT,
        Some(buffer.as_mut_ptr() as *mut _),
        &mut size,
        header_size,
    );
    if copied != size {
        return None;
    }

    // SAFETY: GetRawInputData filled the buffer with a RAWINPUT.
    let raw = &*(buffer.as_ptr() as *const RAWINPUT);
    if raw.header.dwType != RIM_TYPEKEYBOARD.0 {
        return None;
    }
    let from_device = !raw.header.hDevice.0.is_null();
    Some(to_key_event(&raw.data.keyboard, from_device))
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyweave_core::{is_injected, INJECTION_MARKER};

    fn packet(vk: u16, flags: u16, extra: u32) -> RAWKEYBOARD {
        RAWKEYBOARD {
            MakeCode: 0x1E,
            Flags: flags,
            Reserved: 0,
            VKey: vk,
            Message: 0,
            ExtraInformation: extra,
        }
    }

    #[test]
    fn test_break_flag_maps_to_key_up() {
        let down = to_key_event(&packet(0x41, 0, 0), true);
        let up = to_key_event(&packet(0x41, RI_KEY_BREAK, 0), true);
        assert_eq!(down.transition, KeyTransition::Down);
        assert_eq!(up.transition, KeyTransition::Up);
    }

    #[test]
    fn test_marker_in_extra_information_is_detected() {
        let ours = to_key_event(&packet(0x42, 0, INJECTION_MARKER as u32), true);
        assert!(is_injected(&ours));
    }

    #[test]
    fn test_null_device_counts_as_injected() {
        let foreign = to_key_event(&packet(0x42, 0, 0), false);
        let physical = to_key_event(&packet(0x42, 0, 0), true);
        assert!(is_injected(&foreign));
        assert!(!is_injected(&physical));
    }
}
