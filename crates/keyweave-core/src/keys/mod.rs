//! Virtual-key vocabulary.
//!
//! A [`VirtualKey`] is the code the OS attaches to every keyboard event and the
//! code the injector hands back to the OS.  On Windows these are the `VK_*`
//! constants from `winuser.h`; the same numbers are used on every platform so
//! the mapping file is portable.

mod names;
pub mod virtual_key;

pub use virtual_key::{KeyParseError, VirtualKey};
