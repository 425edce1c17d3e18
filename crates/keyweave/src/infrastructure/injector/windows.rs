//! Windows input injection via the SendInput API.

#![cfg(target_os = "windows")]

use std::mem::size_of;

use keyweave_core::{press_pair, KeyEvent, KeyTransition, VirtualKey};
use windows::Win32::Foundation::GetLastError;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYBD_EVENT_FLAGS,
    KEYEVENTF_EXTENDEDKEY, KEYEVENTF_KEYUP, VIRTUAL_KEY,
};

use crate::application::remap_keys::{InjectionError, KeyInjector};

/// Virtual keys that live on the extended part of the keyboard.
const EXTENDED_VKS: &[u16] = &[
    0x21, 0x22, 0x23, 0x24, 0x25, 0x26, 0x27, 0x28, // nav
    0x2D, 0x2E, // Insert, Delete
    0x5B, 0x5C, 0x5D, // Win keys, Apps
    0x6F, 0x90, // NumPad divide, NumLock
    0xA3, 0xA5, // Right Ctrl, Right Alt
];

/// Windows implementation of [`KeyInjector`] using SendInput.
#[derive(Debug, Default)]
pub struct SendInputInjector;

impl SendInputInjector {
    pub fn new() -> Self {
        Self
    }
}

impl KeyInjector for SendInputInjector {
    fn emit(&self, key: VirtualKey) -> Result<(), InjectionError> {
        let inputs = press_pair(key).map(|event| to_input(&event));
        // SAFETY: inputs is a valid array of keyboard INPUT structures.
        let accepted = unsafe { SendInput(&inputs, size_of::<INPUT>() as i32) };
        if accepted as usize != inputs.len() {
            // SAFETY: GetLastError has no preconditions.
            let code = unsafe { GetLastError() }.0;
            return Err(InjectionError::Rejected {
                submitted: inputs.len() as u32,
                accepted,
                code,
            });
        }
        Ok(())
    }
}

/// Builds the `INPUT` for one event; the marker rides in `dwExtraInfo`.
fn to_input(event: &KeyEvent) -> INPUT {
    let mut flags = KEYBD_EVENT_FLAGS(0);
    if event.transition == KeyTransition::Up {
        flags |= KEYEVENTF_KEYUP;
    }
    if EXTENDED_VKS.contains(&event.key.code()) {
        flags |= KEYEVENTF_EXTENDEDKEY;
    }

    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: VIRTUAL_KEY(event.key.code()),
                wScan: event.scan_code,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: event.extra_info,
            },
        },
    }
}
