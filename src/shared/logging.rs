//! Logging utilities module
//!
//! This module provides centralized logging functionality and the structured
//! log events emitted by the deposit flow.

use tracing::{debug, info, warn};

use crate::shared::error::{AppError, SettlementError};

/// Logging utilities for the application
pub struct LoggingUtils;

impl LoggingUtils {
    /// Initialize logging with the specified level and format.
    ///
    /// `RUST_LOG` takes precedence over `level` when set. `format` accepts
    /// `"compact"`; anything else uses the full text formatter.
    pub fn initialize(level: &str, format: &str) -> crate::Result<()> {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level));

        let builder = fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false);

        let result = if format.eq_ignore_ascii_case("compact") {
            tracing::subscriber::set_global_default(builder.compact().finish())
        } else {
            tracing::subscriber::set_global_default(builder.finish())
        };

        result.map_err(|e| AppError::Internal(format!("Failed to initialize logging: {}", e)))
    }

    /// Log a step change of a deposit session
    pub fn log_transition(session_id: &str, epoch: u64, from: &str, to: &str) {
        info!(
            session_id = %session_id,
            epoch = epoch,
            from = %from,
            to = %to,
            "Deposit session transitioned"
        );
    }

    /// Log a quote issued by the settlement network
    pub fn log_quote_created(session_id: &str, quote_id: &str, amount: u64) {
        info!(
            session_id = %session_id,
            quote_id = %quote_id,
            amount = amount,
            "Deposit quote created"
        );
    }

    /// Log a failed status check; polling continues
    pub fn log_poll_failure(session_id: &str, quote_id: &str, error: &SettlementError) {
        warn!(
            session_id = %session_id,
            quote_id = %quote_id,
            transport = error.is_transport(),
            error = %error,
            "Deposit status check failed, retrying on next tick"
        );
    }

    /// Log a response that arrived for a superseded session
    pub fn log_stale_response(operation: &str, response_epoch: u64, current_epoch: u64) {
        debug!(
            operation = %operation,
            response_epoch = response_epoch,
            current_epoch = current_epoch,
            "Discarding response for superseded deposit session"
        );
    }

    /// Log a confirmed settlement
    pub fn log_settlement(session_id: &str, settled_amount: u64, new_balance: u64) {
        info!(
            session_id = %session_id,
            settled_amount = settled_amount,
            new_balance = new_balance,
            "Deposit settled"
        );
    }
}
