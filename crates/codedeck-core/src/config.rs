//! Configuration management for the CodeDeck client.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default identity provider URL (can be overridden at compile time via CODEDECK_IDENTITY_URL).
pub const DEFAULT_IDENTITY_URL: &str = match option_env!("CODEDECK_IDENTITY_URL") {
    Some(url) => url,
    None => "https://auth.codedeck.dev",
};

/// Default dashboard API URL (can be overridden at compile time via CODEDECK_API_URL).
pub const DEFAULT_API_URL: &str = match option_env!("CODEDECK_API_URL") {
    Some(url) => url,
    None => "https://api.codedeck.dev",
};

/// Default port for the local OAuth callback receiver.
pub const DEFAULT_CALLBACK_PORT: u16 = 9847;

/// Default log level.
const DEFAULT_LOG_LEVEL: &str = "info";

/// Main client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Identity provider base URL.
    #[serde(default = "default_identity_url")]
    pub identity_url: String,
    /// Dashboard REST API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Port the local callback receiver listens on.
    #[serde(default = "default_callback_port")]
    pub callback_port: u16,
}

fn default_identity_url() -> String {
    DEFAULT_IDENTITY_URL.to_string()
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_callback_port() -> u16 {
    DEFAULT_CALLBACK_PORT
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            identity_url: DEFAULT_IDENTITY_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            callback_port: DEFAULT_CALLBACK_PORT,
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file, falling back to defaults.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override configuration from environment variables.
    fn load_from_env(&mut self) {
        if let Ok(log_level) = std::env::var("CODEDECK_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Ok(identity_url) = std::env::var("CODEDECK_IDENTITY_URL") {
            self.identity_url = identity_url;
        }
        if let Ok(api_url) = std::env::var("CODEDECK_API_URL") {
            self.api_url = api_url;
        }
        if let Ok(port) = std::env::var("CODEDECK_CALLBACK_PORT") {
            if let Ok(port) = port.parse() {
                self.callback_port = port;
            }
        }
    }

    /// Validate that the configured URLs parse.
    fn validate(&self) -> CoreResult<()> {
        Url::parse(&self.identity_url)
            .map_err(|e| CoreError::Config(format!("invalid identity_url: {}", e)))?;
        Url::parse(&self.api_url)
            .map_err(|e| CoreError::Config(format!("invalid api_url: {}", e)))?;
        Ok(())
    }

    /// Origin the identity provider should return to after logout
    /// (the callback receiver's host, without the callback path).
    pub fn app_origin(&self) -> String {
        format!("http://localhost:{}", self.callback_port)
    }

    /// Redirect URI for the OAuth authorization and token requests.
    pub fn callback_url(&self) -> String {
        format!("{}/auth/callback", self.app_origin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.identity_url, DEFAULT_IDENTITY_URL);
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.callback_port, DEFAULT_CALLBACK_PORT);
    }

    #[test]
    fn test_callback_urls_follow_port() {
        let config = Config {
            callback_port: 3000,
            ..Config::default()
        };
        assert_eq!(config.app_origin(), "http://localhost:3000");
        assert_eq!(config.callback_url(), "http://localhost:3000/auth/callback");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config {
            log_level: "debug".to_string(),
            identity_url: "https://auth.example.com".to_string(),
            api_url: "https://api.example.com".to_string(),
            callback_port: 4000,
        };
        config.save(&paths).unwrap();

        let loaded = Config::load_from_file(&paths.config_file()).unwrap();
        assert_eq!(loaded.log_level, "debug");
        assert_eq!(loaded.identity_url, "https://auth.example.com");
        assert_eq!(loaded.api_url, "https://api.example.com");
        assert_eq!(loaded.callback_port, 4000);
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let config: Config = serde_json::from_str(r#"{"log_level": "warn"}"#).unwrap();
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.identity_url, DEFAULT_IDENTITY_URL);
        assert_eq!(config.callback_port, DEFAULT_CALLBACK_PORT);
    }
}
