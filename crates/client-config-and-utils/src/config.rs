//! Configuration management for the client.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default auth service URL (can be overridden at compile time via TUTORLINK_AUTH_HOST).
pub const DEFAULT_AUTH_HOST: &str = match option_env!("TUTORLINK_AUTH_HOST") {
    Some(url) => url,
    None => "https://auth-service-58sq.onrender.com",
};

/// Default user service URL (can be overridden at compile time via TUTORLINK_USER_HOST).
pub const DEFAULT_USER_HOST: &str = match option_env!("TUTORLINK_USER_HOST") {
    Some(url) => url,
    None => "https://user-service-jc2p.onrender.com",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Main client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Auth service base URL.
    #[serde(default = "default_auth_host")]
    pub auth_host: String,
    /// User service base URL (aggregated profile endpoints).
    #[serde(default = "default_user_host")]
    pub user_host: String,
}

fn default_auth_host() -> String {
    DEFAULT_AUTH_HOST.to_string()
}

fn default_user_host() -> String {
    DEFAULT_USER_HOST.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            auth_host: DEFAULT_AUTH_HOST.to_string(),
            user_host: DEFAULT_USER_HOST.to_string(),
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config.normalize_hosts();
        config
    }

    /// Load configuration from a file, falling back to defaults.
    /// Environment variables override file values.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.normalize_hosts();

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let config_path = paths.config_file();
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    /// Override configuration from environment variables.
    fn load_from_env(&mut self) {
        if let Ok(log_level) = std::env::var("TUTORLINK_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Ok(auth_host) = std::env::var("TUTORLINK_AUTH_HOST") {
            self.auth_host = auth_host;
        }
        if let Ok(user_host) = std::env::var("TUTORLINK_USER_HOST") {
            self.user_host = user_host;
        }
    }

    /// Strip trailing slashes so paths can be appended with a leading `/`.
    fn normalize_hosts(&mut self) {
        while self.auth_host.ends_with('/') {
            self.auth_host.pop();
        }
        while self.user_host.ends_with('/') {
            self.user_host.pop();
        }
    }

    /// Get the auth service URL as a parsed URL.
    pub fn auth_host_url(&self) -> CoreResult<Url> {
        Url::parse(&self.auth_host).map_err(CoreError::from)
    }

    /// Get the user service URL as a parsed URL.
    pub fn user_host_url(&self) -> CoreResult<Url> {
        Url::parse(&self.user_host).map_err(CoreError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.auth_host, DEFAULT_AUTH_HOST);
        assert_eq!(config.user_host, DEFAULT_USER_HOST);
    }

    #[test]
    fn test_config_load_from_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");

        let config_json = r#"{
            "log_level": "debug",
            "auth_host": "https://auth.example.com"
        }"#;

        std::fs::write(&config_path, config_json).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.auth_host, "https://auth.example.com");
        // Missing field falls back to the default
        assert_eq!(config.user_host, DEFAULT_USER_HOST);
    }

    #[test]
    fn test_config_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let mut config = Config::default();
        config.log_level = "trace".to_string();
        config.auth_host = "https://auth.local".to_string();

        config.save(&paths).unwrap();

        let loaded = Config::load(&paths).unwrap();
        assert_eq!(loaded.log_level, "trace");
        assert_eq!(loaded.auth_host, "https://auth.local");
    }

    #[test]
    fn test_config_load_nonexistent_uses_defaults() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config::load(&paths).unwrap();
        assert_eq!(config.auth_host, DEFAULT_AUTH_HOST);
    }

    #[test]
    fn test_config_trims_trailing_slash() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");

        let config_json = r#"{
            "log_level": "info",
            "auth_host": "https://auth.example.com/",
            "user_host": "https://users.example.com//"
        }"#;
        std::fs::write(&config_path, config_json).unwrap();

        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        let config = Config::load(&paths).unwrap();
        assert_eq!(config.auth_host, "https://auth.example.com");
        assert_eq!(config.user_host, "https://users.example.com");
    }

    #[test]
    fn test_config_auth_host_url_parse() {
        let config = Config::default();
        let url = config.auth_host_url().unwrap();
        assert_eq!(url.scheme(), "https");
    }

    #[test]
    fn test_config_invalid_url() {
        let mut config = Config::default();
        config.auth_host = "not a valid url".to_string();

        let result = config.auth_host_url();
        assert!(result.is_err());
    }

    #[test]
    fn test_default_constants() {
        assert!(!DEFAULT_LOG_LEVEL.is_empty());
        assert!(DEFAULT_AUTH_HOST.starts_with("https://"));
        assert!(DEFAULT_USER_HOST.starts_with("https://"));
        assert!(!DEFAULT_AUTH_HOST.ends_with('/'));
        assert!(!DEFAULT_USER_HOST.ends_with('/'));
    }
}
