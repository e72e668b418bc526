//! Shared utilities and common functionality
//!
//! This module contains error handling and logging used across the
//! application.

pub mod error;
pub mod logging;

pub use error::{AppError, AppResult, SettlementError};
pub use logging::LoggingUtils;
