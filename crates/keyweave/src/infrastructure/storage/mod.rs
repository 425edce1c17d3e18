//! Storage infrastructure: the JSON mapping file.
//!
//! The `config` sub-module reads the remap table (and the debug-console flag)
//! at startup, writes it back when mappings change, and provides the built-in
//! default table used when the file is missing or unreadable.

pub mod config;
