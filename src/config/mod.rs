// src/config/mod.rs

//! Graph file configuration.
//!
//! - [`model`] mirrors the TOML layout (`[executor]`, `[node.<name>]`).
//! - [`loader`] reads a file from disk.
//! - [`validate`] turns a raw file into a checked [`ConfigFile`].
//! - [`duration`] parses the `500ms` / `30s` / `5m` / `1h` duration strings.

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{ConfigFile, ExecutorSection, NodeConfig, NodeSpec, RawConfigFile};
