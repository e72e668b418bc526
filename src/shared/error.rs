//! Error handling module
//!
//! This module provides centralized error handling for the application.
//! `SettlementError` is the structured failure vocabulary of the settlement
//! port; `AppError` is what the rest of the crate returns.

use thiserror::Error;

/// Structured failure reasons reported by a `SettlementClient`.
///
/// These never carry presentation text of their own beyond what the backend
/// sent; translating them into user-facing messages is the state machine's job.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(u64),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Backend error ({status}): {message}")]
    Backend { status: u16, message: String },
}

impl SettlementError {
    /// Whether the failure came from the transport rather than the service
    pub fn is_transport(&self) -> bool {
        matches!(self, SettlementError::Network(_))
    }
}

impl From<reqwest::Error> for SettlementError {
    fn from(err: reqwest::Error) -> Self {
        SettlementError::Network(err.to_string())
    }
}

/// Application error types
#[derive(Error, Debug, Clone)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Cannot {action} while {from}")]
    InvalidTransition { from: String, action: String },

    #[error("Settlement error: {0}")]
    Settlement(#[from] SettlementError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Application result type
pub type AppResult<T> = Result<T, AppError>;

impl From<prometheus::Error> for AppError {
    fn from(err: prometheus::Error) -> Self {
        AppError::Internal(format!("metrics: {}", err))
    }
}
