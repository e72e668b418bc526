//! Application configuration structures
//!
//! This module contains the main configuration structures for the application.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

use crate::config::validation::ConfigValidator;
use crate::shared::error::AppError;

/// Bank account API configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ApiConfig {
    /// Base URL of the account API (e.g., "http://127.0.0.1:8000/api")
    #[validate(url)]
    pub base_url: String,

    /// Request timeout in seconds
    #[validate(range(min = 1, max = 300))]
    pub timeout_seconds: u64,

    /// Session cookie forwarded with every request
    pub session_cookie: Option<String>,
}

/// Deposit flow configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DepositConfig {
    /// Interval between settlement status checks
    #[validate(range(min = 100, max = 60000))]
    pub poll_interval_ms: u64,

    /// Give up polling after this long; unset polls until the backend
    /// reports the quote paid or expired
    #[validate(range(min = 1, max = 86400))]
    pub max_poll_duration_seconds: Option<u64>,
}

impl DepositConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_poll_duration(&self) -> Option<Duration> {
        self.max_poll_duration_seconds.map(Duration::from_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoggingConfig {
    /// Log level
    #[validate(length(min = 1))]
    pub level: String,

    /// Log format ("text" or "compact")
    #[validate(length(min = 1))]
    pub format: String,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    /// Account API configuration
    #[validate(nested)]
    pub api: ApiConfig,

    /// Deposit flow configuration
    #[validate(nested)]
    pub deposit: DepositConfig,

    /// Logging configuration
    #[validate(nested)]
    pub logging: LoggingConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/api".to_string(),
            timeout_seconds: 30,
            session_cookie: None,
        }
    }
}

impl Default for DepositConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 3000,
            max_poll_duration_seconds: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            deposit: DepositConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, `Coinbank.toml` and `COINBANK__*`
    /// environment variables, in that order of precedence (last wins)
    pub fn load() -> crate::Result<Self> {
        let defaults = config::Config::try_from(&AppConfig::default())
            .map_err(|e| AppError::Config(format!("Failed to build default configuration: {}", e)))?;

        let config = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::with_name("Coinbank").required(false))
            .add_source(config::Environment::with_prefix("COINBANK").separator("__"))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build configuration: {}", e)))?;

        let config: AppConfig = config
            .try_deserialize()
            .map_err(|e| AppError::Config(format!("Failed to deserialize configuration: {}", e)))?;

        config.validate_config()?;

        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate_config(&self) -> crate::Result<()> {
        self.validate()
            .map_err(|e| AppError::Validation(format!("Configuration validation failed: {}", e)))?;
        ConfigValidator::validate_config(self)
    }
}
