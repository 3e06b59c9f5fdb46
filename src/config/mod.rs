//! Configuration management
//!
//! Configuration is read from `config.yml` and then overridden by `CASIPE_*`
//! environment variables. Missing values fall back to defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Live database settings
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Lookup cache settings
    #[serde(default)]
    pub cache: CacheConfig,
    /// Uploaded media (images, audio, covers)
    #[serde(default)]
    pub media: MediaConfig,
    /// Backup database used by the copy and import tools
    #[serde(default)]
    pub backup: BackupConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file path, `sqlite:` URL or `:memory:`
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/casipe.db".to_string()
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache TTL in seconds
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    /// Maximum number of cached entries
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            max_capacity: default_max_capacity(),
        }
    }
}

fn default_ttl() -> u64 {
    3600
}

fn default_max_capacity() -> u64 {
    10_000
}

/// Media configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Public URL prefix that `{{MEDIA:...}}` placeholders expand to
    #[serde(default = "default_media_url")]
    pub url: String,
    /// Directory served under the media URL
    #[serde(default = "default_media_path")]
    pub path: PathBuf,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            url: default_media_url(),
            path: default_media_path(),
        }
    }
}

fn default_media_url() -> String {
    "/media/".to_string()
}

fn default_media_path() -> PathBuf {
    PathBuf::from("media")
}

/// Backup database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Path to the backup SQLite file
    #[serde(default = "default_backup_path")]
    pub path: PathBuf,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            path: default_backup_path(),
        }
    }
}

fn default_backup_path() -> PathBuf {
    PathBuf::from("db.sqlite3.backup")
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file.
    ///
    /// A missing or empty file yields the default configuration. Invalid YAML
    /// is reported with its line and column.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file, then apply environment overrides:
    ///
    /// - CASIPE_SERVER_HOST
    /// - CASIPE_SERVER_PORT
    /// - CASIPE_SERVER_CORS_ORIGIN
    /// - CASIPE_DATABASE_URL
    /// - CASIPE_CACHE_TTL_SECONDS
    /// - CASIPE_MEDIA_URL
    /// - CASIPE_MEDIA_PATH
    /// - CASIPE_BACKUP_PATH
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("CASIPE_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("CASIPE_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("CASIPE_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }

        if let Ok(url) = std::env::var("CASIPE_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(ttl) = std::env::var("CASIPE_CACHE_TTL_SECONDS") {
            if let Ok(ttl) = ttl.parse::<u64>() {
                self.cache.ttl_seconds = ttl;
            }
        }

        if let Ok(url) = std::env::var("CASIPE_MEDIA_URL") {
            self.media.url = url;
        }
        if let Ok(path) = std::env::var("CASIPE_MEDIA_PATH") {
            self.media.path = PathBuf::from(path);
        }

        if let Ok(path) = std::env::var("CASIPE_BACKUP_PATH") {
            self.backup.path = PathBuf::from(path);
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "database.url must not be empty".to_string(),
            ));
        }
        if self.media.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "media.url must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared by every test that touches CASIPE_* variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const ENV_VARS: &[&str] = &[
    "CASIPE_SERVER_HOST",
    "CASIPE_SERVER_PORT",
    "CASIPE_SERVER_CORS_ORIGIN",
    "CASIPE_DATABASE_URL",
    "CASIPE_CACHE_TTL_SECONDS",
    "CASIPE_MEDIA_URL",
    "CASIPE_MEDIA_PATH",
    "CASIPE_BACKUP_PATH",
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        let guard = super::CONFIG_ENV_MUTEX
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        for var in super::ENV_VARS {
            std::env::remove_var(var);
        }
        guard
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let path = std::path::Path::new("nonexistent_casipe_config.yml");
        let config = Config::load(path).unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.database.url, "data/casipe.db");
        assert_eq!(config.cache.ttl_seconds, 3600);
        assert_eq!(config.media.url, "/media/");
        assert_eq!(config.media.path, PathBuf::from("media"));
        assert_eq!(config.backup.path, PathBuf::from("db.sqlite3.backup"));
    }

    #[test]
    fn test_load_empty_file_returns_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "   \n").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_load_partial_config_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "media:\n  url: \"https://cdn.example.com/media/\"\n").unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.media.url, "https://cdn.example.com/media/");
        assert_eq!(config.media.path, PathBuf::from("media"));
        assert_eq!(config.database.url, "data/casipe.db");
    }

    #[test]
    fn test_load_full_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
server:
  host: "127.0.0.1"
  port: 9000
  cors_origin: "https://casipe.example"
database:
  url: "sqlite:/srv/casipe/live.db"
cache:
  ttl_seconds: 60
  max_capacity: 500
media:
  url: "/files/"
  path: "/srv/casipe/media"
backup:
  path: "/srv/casipe/db.sqlite3.backup"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.cors_origin, "https://casipe.example");
        assert_eq!(config.database.url, "sqlite:/srv/casipe/live.db");
        assert_eq!(config.cache.ttl_seconds, 60);
        assert_eq!(config.cache.max_capacity, 500);
        assert_eq!(config.media.url, "/files/");
        assert_eq!(config.media.path, PathBuf::from("/srv/casipe/media"));
        assert_eq!(
            config.backup.path,
            PathBuf::from("/srv/casipe/db.sqlite3.backup")
        );
    }

    #[test]
    fn test_load_invalid_yaml_returns_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "server:\n  port: not_a_number\n").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("parse"));
    }

    #[test]
    fn test_load_empty_database_url_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "database:\n  url: \"\"\n").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("database.url"));
    }

    #[test]
    fn test_env_overrides() {
        let _guard = lock_env();

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "server:\n  port: 8000\n").unwrap();

        std::env::set_var("CASIPE_SERVER_PORT", "4000");
        std::env::set_var("CASIPE_DATABASE_URL", "/tmp/casipe.db");
        std::env::set_var("CASIPE_MEDIA_URL", "https://cdn.example.com/");
        std::env::set_var("CASIPE_BACKUP_PATH", "/tmp/backup.sqlite3");

        let config = Config::load_with_env(file.path()).unwrap();

        assert_eq!(config.server.port, 4000);
        assert_eq!(config.database.url, "/tmp/casipe.db");
        assert_eq!(config.media.url, "https://cdn.example.com/");
        assert_eq!(config.backup.path, PathBuf::from("/tmp/backup.sqlite3"));

        for var in super::ENV_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_env_override_invalid_numbers_ignored() {
        let _guard = lock_env();

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "cache:\n  ttl_seconds: 120\n").unwrap();

        std::env::set_var("CASIPE_SERVER_PORT", "not_a_number");
        std::env::set_var("CASIPE_CACHE_TTL_SECONDS", "-5");

        let config = Config::load_with_env(file.path()).unwrap();

        assert_eq!(config.server.port, 8000);
        assert_eq!(config.cache.ttl_seconds, 120);

        std::env::remove_var("CASIPE_SERVER_PORT");
        std::env::remove_var("CASIPE_CACHE_TTL_SECONDS");
    }
}
