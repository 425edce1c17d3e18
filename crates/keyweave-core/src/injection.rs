//! Injection marker contract.
//!
//! The injector and the hook share exactly two operations:
//!
//! - [`stamp`] – attaches [`INJECTION_MARKER`] to an outgoing synthetic event
//!   before it is submitted to the OS.
//! - [`is_injected`] – run by the hook on every observed event *before* any
//!   remap lookup.  `true` means "forward untouched and do nothing else".
//!
//! If the hook ever remapped an event the injector produced, a mapping such as
//! `A → B, B → A` would bounce between the two keys forever.  The marker is
//! therefore the one thing every injection path must carry.
//!
//! The marker is for same-process loop prevention only; any process can forge
//! it, so it must never be used to authenticate input.

use crate::event::KeyEvent;
use crate::keys::VirtualKey;

/// Token stored in the auxiliary field of every event keyweave synthesizes.
///
/// Hardware drivers report an auxiliary value of zero, and the value fits in
/// 32 bits so it survives the raw-input path, whose `ExtraInformation` field
/// is a `ULONG`.
pub const INJECTION_MARKER: usize = 0x4B57_5652;

/// Returns `event` with its auxiliary field set to [`INJECTION_MARKER`].
///
/// Only the auxiliary field changes; key, transition, and scan code are kept.
pub fn stamp(event: KeyEvent) -> KeyEvent {
    KeyEvent {
        extra_info: INJECTION_MARKER,
        ..event
    }
}

/// Returns `true` if `event` was synthesized rather than typed.
///
/// Either signal is sufficient: our own marker in the auxiliary field, or the
/// platform reporting the event as injected (which also covers other tools
/// calling `SendInput`).  The two are independent booleans; the auxiliary field
/// is compared for equality and never bit-tested.
pub fn is_injected(event: &KeyEvent) -> bool {
    event.extra_info == INJECTION_MARKER || event.os_injected
}

/// Builds the stamped key-down + key-up pair that emits one press of `key`.
pub fn press_pair(key: VirtualKey) -> [KeyEvent; 2] {
    [stamp(KeyEvent::key_down(key)), stamp(KeyEvent::key_up(key))]
}
