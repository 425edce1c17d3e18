//! Input injection adapters implementing
//! [`KeyInjector`](crate::application::remap_keys::KeyInjector).
//!
//! On Windows, [`windows::SendInputInjector`] submits each stamped press pair
//! with one `SendInput` call.  Tests use [`mock::RecordingInjector`], which can
//! loop its output back into the hook handler the way the OS would.

pub mod mock;

#[cfg(target_os = "windows")]
pub mod windows;
