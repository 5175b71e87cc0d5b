// src/config.rs

//! Application configuration structures.
//!
//! Settings load from a TOML file; channel credentials are merged in from
//! the environment and never live in the versioned file.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Environment variable holding the SMTP username.
pub const ENV_SMTP_USERNAME: &str = "VIGIE_SMTP_USERNAME";
/// Environment variable holding the SMTP password.
pub const ENV_SMTP_PASSWORD: &str = "VIGIE_SMTP_PASSWORD";
/// Environment variables holding the four feed API credential strings.
pub const ENV_FEED_API_KEY: &str = "VIGIE_FEED_API_KEY";
pub const ENV_FEED_API_SECRET: &str = "VIGIE_FEED_API_SECRET";
pub const ENV_FEED_ACCESS_TOKEN: &str = "VIGIE_FEED_ACCESS_TOKEN";
pub const ENV_FEED_ACCESS_TOKEN_SECRET: &str = "VIGIE_FEED_ACCESS_TOKEN_SECRET";

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Source dataset settings
    #[serde(default)]
    pub source: SourceConfig,

    /// Local storage paths
    #[serde(default)]
    pub storage: StorageConfig,

    /// Mail channel settings (channel is skipped when the section is absent)
    #[serde(default)]
    pub mail: Option<MailConfig>,

    /// Feed channel settings (channel is skipped when the section is absent)
    #[serde(default)]
    pub feed: Option<FeedConfig>,
}

impl Config {
    /// Load configuration from a TOML file and merge in environment secrets.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.merge_env();
        Ok(config)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            let mut config = Self::default();
            config.merge_env();
            config
        })
    }

    /// Overlay channel credentials from the environment.
    fn merge_env(&mut self) {
        if let Some(mail) = self.mail.as_mut() {
            if let Ok(v) = env::var(ENV_SMTP_USERNAME) {
                mail.username = Some(v);
            }
            if let Ok(v) = env::var(ENV_SMTP_PASSWORD) {
                mail.password = Some(v);
            }
        }
        if let Some(feed) = self.feed.as_mut() {
            if let Ok(v) = env::var(ENV_FEED_API_KEY) {
                feed.api_key = Some(v);
            }
            if let Ok(v) = env::var(ENV_FEED_API_SECRET) {
                feed.api_secret = Some(v);
            }
            if let Ok(v) = env::var(ENV_FEED_ACCESS_TOKEN) {
                feed.access_token = Some(v);
            }
            if let Ok(v) = env::var(ENV_FEED_ACCESS_TOKEN_SECRET) {
                feed.access_token_secret = Some(v);
            }
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.source.user_agent.trim().is_empty() {
            return Err(AppError::validation("source.user_agent is empty"));
        }
        if self.source.timeout_secs == 0 {
            return Err(AppError::validation("source.timeout_secs must be > 0"));
        }
        url::Url::parse(&self.source.url)
            .map_err(|e| AppError::validation(format!("source.url is invalid: {}", e)))?;

        if let Some(mail) = &self.mail {
            if mail.recipient.trim().is_empty() {
                return Err(AppError::validation("mail.recipient is empty"));
            }
            if mail.host.trim().is_empty() {
                return Err(AppError::validation("mail.host is empty"));
            }
            if mail.port == 0 {
                return Err(AppError::validation("mail.port must be > 0"));
            }
        }
        if let Some(feed) = &self.feed {
            url::Url::parse(&feed.endpoint)
                .map_err(|e| AppError::validation(format!("feed.endpoint is invalid: {}", e)))?;
        }
        Ok(())
    }
}

/// Source dataset download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// URL of the published violations CSV
    #[serde(default = "defaults::source_url")]
    pub url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds; a hung download fails the run
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: defaults::source_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Local storage locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file holding the full current dataset
    #[serde(default = "defaults::database_path")]
    pub database: PathBuf,

    /// Plain-text checkpoint of known identity keys, one per line
    #[serde(default = "defaults::known_ids_path")]
    pub known_ids: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: defaults::database_path(),
            known_ids: defaults::known_ids_path(),
        }
    }
}

/// Mail notification channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Notification recipient address; when blank the channel reports
    /// itself incomplete and is skipped
    #[serde(default)]
    pub recipient: String,

    /// SMTP server host
    #[serde(default)]
    pub host: String,

    /// SMTP server port
    #[serde(default = "defaults::smtp_port")]
    pub port: u16,

    /// Upgrade the connection with STARTTLS
    #[serde(default)]
    pub use_tls: bool,

    /// SMTP username; sourced from VIGIE_SMTP_USERNAME, never from the file
    #[serde(skip)]
    pub username: Option<String>,

    /// SMTP password; sourced from VIGIE_SMTP_PASSWORD, never from the file
    #[serde(skip)]
    pub password: Option<String>,
}

/// Feed notification channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Post-creation endpoint
    #[serde(default = "defaults::feed_endpoint")]
    pub endpoint: String,

    /// API credentials; sourced from VIGIE_FEED_* variables, never from the file
    #[serde(skip)]
    pub api_key: Option<String>,
    #[serde(skip)]
    pub api_secret: Option<String>,
    #[serde(skip)]
    pub access_token: Option<String>,
    #[serde(skip)]
    pub access_token_secret: Option<String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::feed_endpoint(),
            api_key: None,
            api_secret: None,
            access_token: None,
            access_token_secret: None,
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Source defaults
    pub fn source_url() -> String {
        "https://data.montreal.ca/dataset/05a9e718-6810-4e73-8bb9-5955efeb91a0/resource/7f939a08-be8a-45e1-b208-d8744dca8fc6/download/violations.csv"
            .into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; vigie/1.0)".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Storage defaults
    pub fn database_path() -> PathBuf {
        PathBuf::from("db/violations.db")
    }
    pub fn known_ids_path() -> PathBuf {
        PathBuf::from("db/known_ids.txt")
    }

    // Mail defaults
    pub fn smtp_port() -> u16 {
        587
    }

    // Feed defaults
    pub fn feed_endpoint() -> String {
        "https://api.twitter.com/2/tweets".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.source.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_invalid_source_url() {
        let mut config = Config::default();
        config.source.url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn channels_absent_by_default() {
        let config = Config::default();
        assert!(config.mail.is_none());
        assert!(config.feed.is_none());
    }

    #[test]
    fn parse_minimal_document_with_channels() {
        let doc = r#"
            [source]
            timeout_secs = 10

            [mail]
            recipient = "sante@example.org"
            host = "smtp.example.org"
            use_tls = true

            [feed]
        "#;
        let config: Config = toml::from_str(doc).unwrap();
        assert_eq!(config.source.timeout_secs, 10);

        let mail = config.mail.as_ref().unwrap();
        assert_eq!(mail.recipient, "sante@example.org");
        assert_eq!(mail.port, 587);
        assert!(mail.use_tls);
        assert!(mail.username.is_none());

        let feed = config.feed.as_ref().unwrap();
        assert_eq!(feed.endpoint, defaults::feed_endpoint());
        assert!(feed.api_key.is_none());

        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_mail_host() {
        let mut config = Config::default();
        config.mail = Some(MailConfig {
            recipient: "a@b.c".into(),
            host: " ".into(),
            port: 587,
            use_tls: false,
            username: None,
            password: None,
        });
        assert!(config.validate().is_err());
    }
}
