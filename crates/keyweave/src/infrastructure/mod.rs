//! Infrastructure layer for the remapper.
//!
//! Contains OS-facing adapters: keyboard interception backends, the thread
//! that pumps their messages, input injection, and file-system storage.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `keyweave_core`, but MUST NOT be imported by the `application` layer.

pub mod hook;
pub mod injector;
pub mod pump;
pub mod storage;
