//! Configuration module for sheetsmith
//!
//! Provides types and parsing for `sheetsmith.toml`.

pub mod loader;
pub mod schema;

pub use loader::{load_config, merge_cli_overrides, CliOverrides, ConfigError};
pub use schema::*;
