use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Remote API
    pub api_base_url: String,
    pub bearer_token: String,
    pub user_access_token: Option<String>,
    pub target_username: String,
    pub page_size: u32,

    // Database
    pub database_path: PathBuf,

    // Media
    pub media_dir: PathBuf,

    // Network behaviour
    pub request_interval: Duration,
    pub http_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Remote API
            api_base_url: env_or_default("API_BASE_URL", "https://api.twitter.com"),
            bearer_token: required_env("BEARER_TOKEN")?,
            user_access_token: optional_env("USER_ACCESS_TOKEN"),
            target_username: required_env("TARGET_USERNAME")?,
            page_size: parse_env_u32("PAGE_SIZE", 100)?,

            // Database
            database_path: Self::database_path_from_env(),

            // Media
            media_dir: PathBuf::from(env_or_default("MEDIA_DIR", "./imgs")),

            // Network behaviour
            request_interval: Duration::from_millis(parse_env_u64("REQUEST_INTERVAL_MS", 1000)?),
            http_timeout: Duration::from_secs(parse_env_u64("HTTP_TIMEOUT_SECS", 30)?),
        })
    }

    /// Database location alone, for commands that never reach the API.
    #[must_use]
    pub fn database_path_from_env() -> PathBuf {
        PathBuf::from(env_or_default("DATABASE_PATH", "./data/likes.sqlite"))
    }

    /// Configuration pointing at local paths with no politeness delay.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:0".to_string(),
            bearer_token: "test-token".to_string(),
            user_access_token: None,
            target_username: "tester".to_string(),
            page_size: 100,
            database_path: PathBuf::from("./data/test.sqlite"),
            media_dir: PathBuf::from("./data/imgs"),
            request_interval: Duration::ZERO,
            http_timeout: Duration::from_secs(10),
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bearer_token.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "BEARER_TOKEN".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        if self.target_username.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "TARGET_USERNAME".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        if !(10..=100).contains(&self.page_size) {
            return Err(ConfigError::InvalidValue {
                name: "PAGE_SIZE".to_string(),
                message: format!("must be between 10 and 100, got {}", self.page_size),
            });
        }
        if url::Url::parse(&self.api_base_url).is_err() {
            return Err(ConfigError::InvalidValue {
                name: "API_BASE_URL".to_string(),
                message: format!("not a valid URL: '{}'", self.api_base_url),
            });
        }
        Ok(())
    }
}

fn required_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}
