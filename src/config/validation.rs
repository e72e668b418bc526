//! Configuration validation module
//!
//! This module provides additional validation logic for configuration
//! beyond the basic validator crate validation.

use crate::config::AppConfig;
use crate::shared::error::AppError;

/// Configuration validator for cross-field checks
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the complete configuration
    pub fn validate_config(config: &AppConfig) -> crate::Result<()> {
        Self::validate_api_url(&config.api.base_url)?;
        Self::validate_deposit_config(&config.deposit)?;
        Ok(())
    }

    /// Validate the account API base URL
    fn validate_api_url(url: &str) -> crate::Result<()> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(AppError::Validation(
                "API base URL must start with http:// or https://".to_string(),
            ));
        }

        if url.ends_with('/') {
            return Err(AppError::Validation(
                "API base URL must not end with '/'".to_string(),
            ));
        }

        if url.starts_with("http://") && !(url.contains("localhost") || url.contains("127.0.0.1")) {
            // Session cookies travel with every request
            tracing::warn!(url = %url, "Account API is reached over plain HTTP");
        }

        Ok(())
    }

    /// Validate deposit polling settings
    fn validate_deposit_config(deposit: &crate::config::app_config::DepositConfig) -> crate::Result<()> {
        if let Some(max_seconds) = deposit.max_poll_duration_seconds {
            if max_seconds.saturating_mul(1000) < deposit.poll_interval_ms {
                return Err(AppError::Validation(format!(
                    "max_poll_duration_seconds ({}) is shorter than one poll interval ({} ms)",
                    max_seconds, deposit.poll_interval_ms
                )));
            }
        }
        Ok(())
    }
}
