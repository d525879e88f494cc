//! Configuration validation.
//!
//! Flags out-of-range values in a parsed [`SwitchboardConfig`] and unknown or
//! misspelled keys in the raw config file.

use std::path::{Path, PathBuf};

use crate::{
    env_subst::substitute_env,
    error::{Error, Result},
    schema::SwitchboardConfig,
};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "pending.max_entries".
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}] {}", self.severity, self.path, self.message)
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(&mut self, severity: Severity, path: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path: path.to_string(),
            message: message.into(),
        });
    }
}

/// Known keys per section, mirroring `schema.rs`.
const KNOWN_KEYS: &[(&str, &[&str])] = &[
    ("server", &["bind", "port", "cors_origins", "body_limit_bytes"]),
    ("database", &["path", "max_connections", "operation_timeout_ms"]),
    ("webhook", &["wrapper_field"]),
    ("messages", &[
        "outbound_sender",
        "default_page_size",
        "max_page_size",
    ]),
    ("pending", &["enabled", "ttl_secs", "max_entries"]),
    ("metrics", &["enabled"]),
];

/// Check value ranges on an already-parsed config.
pub fn validate(config: &SwitchboardConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    if config.server.port == 0 {
        result.push(
            Severity::Warning,
            "server.port",
            "port 0 binds a random port",
        );
    }
    if config.server.body_limit_bytes < 1024 {
        result.push(
            Severity::Warning,
            "server.body_limit_bytes",
            "limit below 1 KiB will reject most webhook payloads",
        );
    }
    if config.database.max_connections == 0 {
        result.push(
            Severity::Error,
            "database.max_connections",
            "must be at least 1",
        );
    }
    if config.database.operation_timeout_ms == 0 {
        result.push(
            Severity::Error,
            "database.operation_timeout_ms",
            "must be greater than 0",
        );
    }
    if config.webhook.wrapper_field.trim().is_empty() {
        result.push(
            Severity::Warning,
            "webhook.wrapper_field",
            "empty wrapper field disables envelope unwrapping",
        );
    }
    if config.messages.outbound_sender.trim().is_empty() {
        result.push(
            Severity::Error,
            "messages.outbound_sender",
            "must not be empty",
        );
    }
    if config.messages.max_page_size == 0 {
        result.push(
            Severity::Error,
            "messages.max_page_size",
            "must be at least 1",
        );
    } else if config.messages.default_page_size > config.messages.max_page_size {
        result.push(
            Severity::Error,
            "messages.default_page_size",
            format!(
                "{} exceeds max_page_size {}",
                config.messages.default_page_size, config.messages.max_page_size
            ),
        );
    }
    if config.pending.enabled {
        if config.pending.max_entries == 0 {
            result.push(
                Severity::Error,
                "pending.max_entries",
                "must be at least 1 when the pending buffer is enabled",
            );
        }
        if config.pending.ttl_secs == 0 {
            result.push(
                Severity::Warning,
                "pending.ttl_secs",
                "entries expire immediately; buffering has no effect",
            );
        }
    }

    result
}

/// Validate a config file: syntax, unknown keys, then value ranges.
pub fn validate_file(path: &Path) -> Result<ValidationResult> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.display().to_string(),
        source,
    })?;
    let raw = substitute_env(&raw);
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
    let value: serde_json::Value = match ext {
        "toml" => serde_json::to_value(toml::from_str::<toml::Value>(&raw)?)?,
        "yaml" | "yml" => serde_json::to_value(serde_yaml::from_str::<serde_yaml::Value>(&raw)?)?,
        "json" => serde_json::from_str(&raw)?,
        _ => {
            return Err(Error::UnsupportedFormat {
                extension: ext.to_string(),
            });
        },
    };

    let mut result = ValidationResult {
        config_path: Some(path.to_path_buf()),
        ..Default::default()
    };
    check_unknown_keys(&value, &mut result);

    let config: SwitchboardConfig = serde_json::from_value(value)?;
    result.diagnostics.extend(validate(&config).diagnostics);
    Ok(result)
}

fn check_unknown_keys(value: &serde_json::Value, result: &mut ValidationResult) {
    let Some(root) = value.as_object() else {
        return;
    };
    for (section, body) in root {
        let Some((_, keys)) = KNOWN_KEYS.iter().find(|(name, _)| *name == section.as_str()) else {
            result.push(Severity::Warning, section, "unknown section");
            continue;
        };
        let Some(fields) = body.as_object() else {
            continue;
        };
        for field in fields.keys() {
            if !keys.contains(&field.as_str()) {
                result.push(
                    Severity::Warning,
                    &format!("{section}.{field}"),
                    "unknown field",
                );
            }
        }
    }
}
