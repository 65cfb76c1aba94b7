//! Configuration for the garden runtime.
//!
//! Every field has a default, so an empty TOML file (or no file at all)
//! yields a working configuration.

pub mod types;

pub use types::*;
