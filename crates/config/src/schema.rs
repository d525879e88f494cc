/// Config schema types (server, database, webhook, messages, pending, metrics).
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchboardConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub webhook: WebhookConfig,
    pub messages: MessagesConfig,
    pub pending: PendingConfig,
    pub metrics: MetricsConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "127.0.0.1".
    pub bind: String,
    /// Port to listen on. Defaults to 5000.
    pub port: u16,
    /// Allowed CORS origins. Empty means any origin.
    pub cors_origins: Vec<String>,
    /// Maximum accepted request body size.
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 5000,
            cors_origins: Vec::new(),
            body_limit_bytes: 10 * 1024 * 1024,
        }
    }
}

/// SQLite message store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file. `None` resolves to `<data_dir>/switchboard.db`.
    pub path: Option<PathBuf>,
    pub max_connections: u32,
    /// Upper bound for a single store round trip.
    pub operation_timeout_ms: u64,
}

impl DatabaseConfig {
    /// The configured path, or `switchboard.db` in the data directory.
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| crate::loader::data_dir().join("switchboard.db"))
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: 5,
            operation_timeout_ms: 5_000,
        }
    }
}

/// Webhook envelope handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Top-level field that wraps the vendor envelope in custom payloads.
    pub wrapper_field: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            wrapper_field: "metaData".into(),
        }
    }
}

/// Message API behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagesConfig {
    /// Identity recorded as the sender of outbound messages.
    pub outbound_sender: String,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            outbound_sender: "system".into(),
            default_page_size: 50,
            max_page_size: 500,
        }
    }
}

/// Buffer for status events that arrive before their message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PendingConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub max_entries: usize,
}

impl Default for PendingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 120,
            max_entries: 1024,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder and expose `/metrics`.
    pub enabled: bool,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: SwitchboardConfig = toml::from_str(
            r#"
            [server]
            port = 8080

            [pending]
            ttl_secs = 30
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.bind, "127.0.0.1");
        assert_eq!(cfg.pending.ttl_secs, 30);
        assert_eq!(cfg.pending.max_entries, 1024);
        assert_eq!(cfg.webhook.wrapper_field, "metaData");
        assert_eq!(cfg.messages.outbound_sender, "system");
    }

    #[test]
    fn empty_document_is_default() {
        let cfg: SwitchboardConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.database.operation_timeout_ms, 5_000);
        assert!(cfg.database.path.is_none());
        assert!(!cfg.metrics.enabled);
    }

    #[test]
    fn explicit_db_path_wins() {
        let cfg = DatabaseConfig {
            path: Some(PathBuf::from("/tmp/x.db")),
            ..Default::default()
        };
        assert_eq!(cfg.resolved_path(), PathBuf::from("/tmp/x.db"));
        assert!(
            DatabaseConfig::default()
                .resolved_path()
                .ends_with("switchboard.db")
        );
    }
}
