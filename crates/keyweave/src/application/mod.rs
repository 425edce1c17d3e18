//! Application layer use cases.
//!
//! Use cases here orchestrate `keyweave_core` types behind traits and make no
//! OS calls, so every decision the hook thread takes can be unit-tested with
//! mocks.
//!
//! # Sub-modules
//!
//! - **`remap_keys`** – the hook-callback contract: skip injected events,
//!   decide, suppress-and-emit or forward.  Runs on every keystroke.
//! - **`manage_mappings`** – the control path: change the live table and
//!   hand the result to a persister.

pub mod manage_mappings;
pub mod remap_keys;
