//! Configuration management for techradar.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::lifecycle::DEFAULT_MAX_UPDATE_ATTEMPTS;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "techradar";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "radar.db";

/// Prefix of environment variables that override configuration.
const ENV_PREFIX: &str = "TECHRADAR_";

/// Origin wildcard accepted in `cors.allowed_origins`.
pub const ANY_ORIGIN: &str = "*";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `TECHRADAR_`, sections separated
///    by `__`, e.g. `TECHRADAR_SERVER__BIND`)
/// 2. TOML config file at `~/.config/techradar/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Cross-origin request configuration.
    pub cors: CorsConfig,
    /// Lifecycle configuration.
    pub lifecycle: LifecycleConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/techradar/radar.db`
    pub database_path: Option<PathBuf>,
    /// How long a statement waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub bind: String,
    /// Upper bound on handling a single request, in seconds.
    pub request_timeout_secs: u64,
}

/// Cross-origin resource sharing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Origins allowed to call the API. `["*"]` allows any origin, an empty
    /// list disables CORS headers entirely.
    pub allowed_origins: Vec<String>,
    /// How long browsers may cache a preflight response, in seconds.
    pub max_age_seconds: u64,
}

/// Lifecycle configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Read-modify-write rounds an update may take before giving up.
    pub max_update_attempts: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None, // Will be resolved to default at runtime
            busy_timeout_ms: 5_000,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![ANY_ORIGIN.to_string()],
            max_age_seconds: 3600,
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_update_attempts: DEFAULT_MAX_UPDATE_ATTEMPTS,
        }
    }
}

impl CorsConfig {
    /// How long browsers may cache a preflight response.
    #[must_use]
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_seconds)
    }

    /// Whether any origin is allowed.
    #[must_use]
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == ANY_ORIGIN)
    }

    /// Whether CORS headers are emitted at all.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.allowed_origins.is_empty()
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `TECHRADAR_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);
        let config: Config = Self::figment(config_file).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// The layered configuration sources, without extracting them.
    #[must_use]
    pub fn figment(config_file: PathBuf) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.lifecycle.max_update_attempts == 0 {
            return Err(Error::ConfigValidation {
                message: "max_update_attempts must be greater than 0".to_string(),
            });
        }

        if self.server.request_timeout_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "request_timeout_secs must be greater than 0".to_string(),
            });
        }

        self.bind_addr()?;

        if self.cors.allows_any_origin() && self.cors.allowed_origins.len() > 1 {
            return Err(Error::ConfigValidation {
                message: format!(
                    "allowed_origins cannot mix '{ANY_ORIGIN}' with explicit origins"
                ),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Parse the configured bind address.
    ///
    /// # Errors
    ///
    /// Returns an error if `server.bind` is not a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server
            .bind
            .parse()
            .map_err(|_| Error::ConfigValidation {
                message: format!("invalid bind address: {}", self.server.bind),
            })
    }

    /// Get the busy timeout as a Duration.
    #[must_use]
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.storage.busy_timeout_ms)
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.storage.database_path.is_none());
        assert_eq!(config.storage.busy_timeout_ms, 5_000);
        assert_eq!(config.server.bind, "127.0.0.1:8000");
        assert_eq!(config.server.request_timeout_secs, 30);
        assert_eq!(config.cors.allowed_origins, vec!["*".to_string()]);
        assert_eq!(config.lifecycle.max_update_attempts, 5);
    }

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_attempts() {
        let mut config = Config::default();
        config.lifecycle.max_update_attempts = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("max_update_attempts"));
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default();
        config.server.request_timeout_secs = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("request_timeout_secs"));
    }

    #[test]
    fn test_validate_bad_bind() {
        let mut config = Config::default();
        config.server.bind = "localhost".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("invalid bind address"));
    }

    #[test]
    fn test_validate_mixed_wildcard_origins() {
        let mut config = Config::default();
        config.cors.allowed_origins = vec!["*".to_string(), "https://radar.example".to_string()];

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("allowed_origins"));
    }

    #[test]
    fn test_cors_flags() {
        let mut cors = CorsConfig::default();
        assert!(cors.is_enabled());
        assert!(cors.allows_any_origin());

        cors.allowed_origins = vec!["https://radar.example".to_string()];
        assert!(cors.is_enabled());
        assert!(!cors.allows_any_origin());

        cors.allowed_origins.clear();
        assert!(!cors.is_enabled());
    }

    #[test]
    fn test_database_path_default() {
        let config = Config::default();
        let path = config.database_path();

        assert!(path.to_string_lossy().contains("radar.db"));
        assert!(path.to_string_lossy().contains("techradar"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/db.sqlite")
        );
    }

    #[test]
    fn test_durations() {
        let config = Config::default();
        assert_eq!(config.busy_timeout(), Duration::from_secs(5));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.cors.max_age(), Duration::from_secs(3600));
        assert_eq!(config.bind_addr().unwrap().port(), 8000);
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("techradar"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        Jail::expect_with(|_jail| {
            let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml")))
                .expect("defaults should load");
            assert_eq!(config, Config::default());
            Ok(())
        });
    }

    #[test]
    fn test_load_toml_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "radar.toml",
                r#"
                [server]
                bind = "0.0.0.0:9000"

                [lifecycle]
                max_update_attempts = 2
                "#,
            )?;

            let config = Config::load_from(Some(PathBuf::from("radar.toml")))
                .expect("config should load");
            assert_eq!(config.server.bind, "0.0.0.0:9000");
            assert_eq!(config.server.request_timeout_secs, 30);
            assert_eq!(config.lifecycle.max_update_attempts, 2);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("radar.toml", "[server]\nbind = \"0.0.0.0:9000\"\n")?;
            jail.set_env("TECHRADAR_SERVER__BIND", "127.0.0.1:7000");
            jail.set_env("TECHRADAR_STORAGE__BUSY_TIMEOUT_MS", "250");

            let config = Config::load_from(Some(PathBuf::from("radar.toml")))
                .expect("config should load");
            assert_eq!(config.server.bind, "127.0.0.1:7000");
            assert_eq!(config.storage.busy_timeout_ms, 250);
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        Jail::expect_with(|jail| {
            jail.create_file("radar.toml", "[lifecycle]\nmax_update_attempts = 0\n")?;

            let err = Config::load_from(Some(PathBuf::from("radar.toml"))).unwrap_err();
            assert!(matches!(err, Error::ConfigValidation { .. }));
            Ok(())
        });
    }

    #[test]
    fn test_config_serialize() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(json.contains("busy_timeout_ms"));
        assert!(json.contains("allowed_origins"));
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let json = r#"{"server": {"bind": "0.0.0.0:1"}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:1");
        assert_eq!(config.server.request_timeout_secs, 30);
        assert_eq!(config.lifecycle, LifecycleConfig::default());
    }
}
