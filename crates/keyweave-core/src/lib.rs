//! # keyweave-core
//!
//! Platform-independent heart of keyweave: the virtual-key vocabulary, the
//! injection marker contract shared by the injector and the hook, and the
//! remap engine that decides what happens to every observed key-down.
//!
//! This crate makes no OS calls.  The `keyweave` crate plugs the pieces into
//! real Windows hooks and `SendInput`; tests plug them into mocks.
//!
//! # Architecture overview
//!
//! ```text
//! hardware ─► OS ─► hook callback ─► is_injected? ──yes──► forward
//!                                        │ no
//!                                        ▼
//!                               RemapEngine::decide(key)
//!                               ├─ Suppress(mapped) ─► consume + emit(mapped)
//!                               └─ PassThrough      ─► forward
//! ```
//!
//! - **`keys`** – [`VirtualKey`], the opaque key code shared by the OS, the
//!   hook and the injector, plus its name table.
//! - **`event`** – [`KeyEvent`], one observed or synthesized key transition.
//! - **`injection`** – the marker stamped on synthetic events and the
//!   detector the hook runs before anything else.
//! - **`remap`** – [`RemapTable`] and [`RemapEngine`].

pub mod event;
pub mod injection;
pub mod keys;
pub mod remap;

pub use event::{KeyEvent, KeyTransition};
pub use injection::{is_injected, press_pair, stamp, INJECTION_MARKER};
pub use keys::{KeyParseError, VirtualKey};
pub use remap::{Decision, RemapEngine, RemapTable};
