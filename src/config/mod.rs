//! Configuration management
//!
//! Configuration lives in `~/.mimir/config.yaml` (or the file named by
//! `MIMIR_CONFIG`). A missing file yields the defaults. Environment
//! variables fill in or override a few database settings:
//!
//! - `MIMIR_DB_KEY` supplies the encryption key when the file has none
//! - `MIMIR_DB_PATH` overrides the database path

mod secret;

pub use secret::Secret;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::storage::db::DEFAULT_DB_PATH;
use crate::storage::StoreOptions;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "MIMIR_CONFIG";
/// Environment variable holding the database encryption key.
pub const DB_KEY_ENV: &str = "MIMIR_DB_KEY";
/// Environment variable overriding the database path.
pub const DB_PATH_ENV: &str = "MIMIR_DB_PATH";

pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_WS_PORT: u16 = 8081;
pub const DEFAULT_MODEL: &str = "anthropic/claude-sonnet-4";

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not find home directory")]
    NoHomeDir,

    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub opencode: OpencodeConfig,
    pub projects: Vec<ProjectConfig>,
    pub webhooks: WebhooksConfig,
    pub cron: Vec<CronJob>,
    pub logging: LoggingConfig,
}

/// Listener ports for the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub http_port: u16,
    pub ws_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            ws_port: DEFAULT_WS_PORT,
        }
    }
}

/// Where the database lives and how to unlock it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file; a leading `~` is expanded
    pub path: String,
    pub encryption_key: Option<Secret>,
    /// SQLite file-lock wait, in milliseconds
    pub busy_timeout_ms: u64,
    /// In-process connection-lock wait, in milliseconds
    pub lock_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let options = StoreOptions::default();
        Self {
            path: DEFAULT_DB_PATH.to_string(),
            encryption_key: None,
            busy_timeout_ms: options.busy_timeout.as_millis() as u64,
            lock_timeout_ms: options.lock_timeout.as_millis() as u64,
        }
    }
}

impl DatabaseConfig {
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
            lock_timeout: Duration::from_millis(self.lock_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpencodeConfig {
    pub default_model: String,
}

impl Default for OpencodeConfig {
    fn default() -> Self {
        Self {
            default_model: DEFAULT_MODEL.to_string(),
        }
    }
}

/// A project declared in the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: String,
    pub path: String,
    pub opencode_port: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhooksConfig {
    pub sentry: SentryWebhookConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentryWebhookConfig {
    pub secret: Option<Secret>,
    pub projects: Vec<SentryProjectMap>,
}

/// Maps a Sentry project onto a Mimir project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentryProjectMap {
    pub sentry_project: String,
    pub mimir_project: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CronJob {
    pub name: String,
    pub schedule: String,
    pub project: String,
    pub action: String,
}

/// Log output settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset (e.g. "mimir=debug")
    pub level: Option<String>,
    /// Also write logs to this file
    pub file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default location and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Load configuration from a file, falling back to defaults if it is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        Self::parse(&content).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Parse YAML config text.
    pub fn parse(content: &str) -> Result<Self, String> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_saphyr::from_str(content).map_err(|e| e.to_string())
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.database.encryption_key.is_none() {
            self.database.encryption_key = lookup(DB_KEY_ENV)
                .filter(|key| !key.is_empty())
                .map(Secret::new);
        }
        if let Some(path) = lookup(DB_PATH_ENV).filter(|path| !path.is_empty()) {
            self.database.path = path;
        }
    }

    /// The config file path: `MIMIR_CONFIG`, or `~/.mimir/config.yaml`.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
            return Ok(PathBuf::from(path));
        }
        let config_dir = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?.join(".mimir");
        Ok(config_dir.join("config.yaml"))
    }

    /// Check ports, the database path, and declared projects.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.http_port == 0 {
            return Err(ConfigError::Invalid(format!(
                "invalid HTTP port: {}",
                self.server.http_port
            )));
        }
        if self.server.ws_port == 0 {
            return Err(ConfigError::Invalid(format!(
                "invalid WebSocket port: {}",
                self.server.ws_port
            )));
        }
        if self.database.path.trim().is_empty() {
            return Err(ConfigError::Invalid("database path is required".to_string()));
        }
        for project in &self.projects {
            if project.name.trim().is_empty() {
                return Err(ConfigError::Invalid("project name is required".to_string()));
            }
            if project.path.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "project path is required for '{}'",
                    project.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.http_port, 8080);
        assert_eq!(config.server.ws_port, 8081);
        assert_eq!(config.database.path, "~/.mimir/mimir.db");
        assert_eq!(config.database.busy_timeout_ms, 5000);
        assert_eq!(config.opencode.default_model, "anthropic/claude-sonnet-4");
        assert!(config.database.encryption_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_parse_full_file() {
        let yaml = r#"
server:
  http_port: 9090
database:
  path: /var/lib/mimir/mimir.db
  encryption_key: from-file
projects:
  - name: demo
    path: /tmp/demo
    opencode_port: 4096
webhooks:
  sentry:
    secret: shh
    projects:
      - sentry_project: web
        mimir_project: demo
cron:
  - name: nightly
    schedule: "0 3 * * *"
    project: demo
    action: review
"#;
        let config = Config::parse(yaml).expect("Failed to parse config");

        assert_eq!(config.server.http_port, 9090);
        assert_eq!(config.server.ws_port, 8081, "Unset fields keep defaults");
        assert_eq!(config.database.path, "/var/lib/mimir/mimir.db");
        assert_eq!(
            config.database.encryption_key.as_ref().map(Secret::expose),
            Some("from-file")
        );
        assert_eq!(config.projects.len(), 1);
        assert_eq!(config.projects[0].opencode_port, 4096);
        assert_eq!(config.webhooks.sentry.projects[0].mimir_project, "demo");
        assert_eq!(config.cron[0].schedule, "0 3 * * *");
    }

    #[test]
    fn test_parse_error_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "server: [not, a, map").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_env_key_fills_missing_key_only() {
        let mut config = Config::default();
        config.apply_env(env(&[(DB_KEY_ENV, "from-env")]));
        assert_eq!(
            config.database.encryption_key.as_ref().map(Secret::expose),
            Some("from-env")
        );

        let mut config = Config::parse("database:\n  encryption_key: from-file\n").unwrap();
        config.apply_env(env(&[(DB_KEY_ENV, "from-env")]));
        assert_eq!(
            config.database.encryption_key.as_ref().map(Secret::expose),
            Some("from-file")
        );
    }

    #[test]
    fn test_env_overrides_db_path() {
        let mut config = Config::default();
        config.apply_env(env(&[(DB_PATH_ENV, "/tmp/other.db")]));
        assert_eq!(config.database.path, "/tmp/other.db");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.server.ws_port = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.database.path = String::new();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.projects.push(ProjectConfig {
            name: "demo".to_string(),
            path: String::new(),
            opencode_port: 4096,
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("demo"));
    }

    #[test]
    fn test_store_options_from_config() {
        let mut config = Config::default();
        config.database.busy_timeout_ms = 250;
        config.database.lock_timeout_ms = 750;

        let options = config.database.store_options();
        assert_eq!(options.busy_timeout, Duration::from_millis(250));
        assert_eq!(options.lock_timeout, Duration::from_millis(750));
    }

    #[test]
    fn test_debug_output_redacts_secrets() {
        let config = Config::parse("database:\n  encryption_key: hunter2\n").unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
    }
}
