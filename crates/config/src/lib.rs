//! Configuration loading, validation, and env substitution.
//!
//! Config files: `voxrelay.toml`, `voxrelay.yaml`, or `voxrelay.json`
//! Searched in `./` then `~/.config/voxrelay/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{apply_env_overrides, config_dir, discover_and_load, find_config_file, load_config},
    schema::{BackendConfig, TelegramConfig, VoxrelayConfig},
    validate::{Diagnostic, Severity, ValidationResult},
};
