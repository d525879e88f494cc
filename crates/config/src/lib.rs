//! Configuration loading, validation and env substitution.
//!
//! Config files: `switchboard.toml`, `switchboard.yaml`, or `switchboard.json`.
//! Searched in `./` then `~/.config/switchboard/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{
        apply_env_overrides, config_dir, data_dir, discover_and_load, find_config_file,
        load_config,
    },
    schema::{
        DatabaseConfig, MessagesConfig, MetricsConfig, PendingConfig, ServerConfig,
        SwitchboardConfig, WebhookConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate, validate_file},
};
