//! Application configuration management.
//!
//! This module handles loading and saving the client configuration, which
//! includes the API base URL override and the last used email address.
//!
//! Configuration is stored at `~/.config/marquee/config.json`; durable
//! session state lives under the data directory (see [`Config::storage_dir`]).

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/storage directory paths
const APP_NAME: &str = "marquee";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Base URL for the Marquee REST API when no override is configured
const DEFAULT_API_BASE_URL: &str = "https://api.marquee.events";

/// Environment variable that overrides the API base URL
const BASE_URL_ENV: &str = "MARQUEE_API_URL";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub last_email: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Resolve the API base URL. Precedence: environment variable, then the
    /// configured override, then the built-in default. A trailing slash is
    /// stripped so endpoint paths can always start with `/`.
    pub fn base_url(&self) -> String {
        let url = std::env::var(BASE_URL_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| self.api_base_url.clone())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        url.trim_end_matches('/').to_string()
    }

    /// Directory holding the durable session files (refresh credential and
    /// cached user profile).
    pub fn storage_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_strips_trailing_slash() {
        let config = Config {
            api_base_url: Some("https://staging.marquee.events/".to_string()),
            last_email: None,
        };
        assert_eq!(config.base_url(), "https://staging.marquee.events");
    }

    #[test]
    fn test_base_url_configured_override() {
        let config = Config {
            api_base_url: Some("http://localhost:8080".to_string()),
            last_email: None,
        };
        assert_eq!(config.base_url(), "http://localhost:8080");
    }
}
