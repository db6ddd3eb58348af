use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub identity: IdentityConfig,
    pub api: ApiConfig,
    pub ui: UiConfig,
}

/// Identity-provider settings. Accounts are keyed by email but the UI
/// exposes bare usernames; `email_domain` is the fixed suffix appended
/// before any provider call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdentityConfig {
    pub api_key: String,
    pub email_domain: String,
    pub identity_url: String,
    pub token_url: String,
    pub token_cache: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UiConfig {
    pub date_format: String,
    pub time_format: String,
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::from)
    }

    pub fn load_or_create() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml(&content)
        } else {
            let config = Self::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sked")
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self).expect("Failed to serialize config");
        std::fs::write(&config_path, content)?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            identity: IdentityConfig {
                api_key: String::new(),
                email_domain: "@yourapp.com".to_string(),
                identity_url: "https://identitytoolkit.googleapis.com".to_string(),
                token_url: "https://securetoken.googleapis.com".to_string(),
                token_cache: Self::config_dir().join("token.json"),
            },
            api: ApiConfig {
                base_url: "http://localhost:5000".to_string(),
            },
            ui: UiConfig {
                date_format: "%Y-%m-%d".to_string(),
                time_format: "%H:%M".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_points_at_local_api() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "http://localhost:5000");
    }

    #[test]
    fn default_config_has_email_domain() {
        let config = Config::default();
        assert_eq!(config.identity.email_domain, "@yourapp.com");
    }

    #[test]
    fn parse_valid_toml_config() {
        let toml_content = r#"
            [identity]
            api_key = "test_key"
            email_domain = "@example.com"
            identity_url = "https://identitytoolkit.googleapis.com"
            token_url = "https://securetoken.googleapis.com"
            token_cache = "/tmp/token.json"

            [api]
            base_url = "https://scheduler.example.com"

            [ui]
            date_format = "%d/%m/%Y"
            time_format = "%I:%M %p"
        "#;

        let config = Config::from_toml(toml_content).unwrap();

        assert_eq!(config.identity.api_key, "test_key");
        assert_eq!(config.identity.email_domain, "@example.com");
        assert_eq!(config.api.base_url, "https://scheduler.example.com");
        assert_eq!(config.ui.time_format, "%I:%M %p");
    }

    #[test]
    fn parse_invalid_toml_returns_error() {
        let invalid_toml = "this is not valid toml";
        let result = Config::from_toml(invalid_toml);
        assert!(result.is_err());
    }
}
