//! Remap table and decision engine.
//!
//! - **`table`** – [`RemapTable`], the plain source → target mapping that the
//!   configuration layer loads and saves.
//! - **`engine`** – [`RemapEngine`], the thread-safe owner of the live table
//!   that the hook thread consults on every key-down.

pub mod engine;
pub mod table;

pub use engine::{Decision, RemapEngine};
pub use table::RemapTable;
