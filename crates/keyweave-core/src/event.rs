//! Platform-neutral keyboard event.
//!
//! Every interception backend translates its native record (`KBDLLHOOKSTRUCT`,
//! `RAWKEYBOARD`, a mock's test input) into a [`KeyEvent`] before handing it
//! to the remap pipeline, and every injector translates [`KeyEvent`]s back into
//! its native submission format.

use crate::keys::VirtualKey;

/// Direction of a key transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyTransition {
    Down,
    Up,
}

/// One key-down or key-up, observed or about to be synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: VirtualKey,
    pub transition: KeyTransition,
    /// Hardware scan code; zero for synthesized events.
    pub scan_code: u16,
    /// Auxiliary data attached by whoever produced the event
    /// (`dwExtraInfo` / `ExtraInformation` on Windows).  Hardware drivers
    /// leave it zero; the injector stores [`crate::INJECTION_MARKER`] here.
    pub extra_info: usize,
    /// The platform's own "this was injected" indication, as reported by the
    /// backend that observed the event.
    pub os_injected: bool,
}

impl KeyEvent {
    /// A hardware-originated key-down with no auxiliary data.
    pub fn key_down(key: VirtualKey) -> Self {
        Self {
            key,
            transition: KeyTransition::Down,
            scan_code: 0,
            extra_info: 0,
            os_injected: false,
        }
    }

    /// A hardware-originated key-up with no auxiliary data.
    pub fn key_up(key: VirtualKey) -> Self {
        Self {
            transition: KeyTransition::Up,
            ..Self::key_down(key)
        }
    }

    pub fn is_down(&self) -> bool {
        self.transition == KeyTransition::Down
    }
}
