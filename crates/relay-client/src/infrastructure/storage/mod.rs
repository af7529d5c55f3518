//! Storage infrastructure: the relay's configuration file.
//!
//! The `config` sub-module reads `config.toml` from the platform config
//! directory (or an explicit path), fills in defaults for anything missing,
//! and converts the result into the option structs the application layer
//! consumes.

pub mod config;
