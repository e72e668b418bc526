//! Coinbank - deposit flow for a custodial ledger
//!
//! This library drives the "add funds" flow of a coinbank account: a deposit
//! is either a network payment request polled until settled or a bearer
//! token redeemed in one call. Confirmed settlements are pushed into the
//! account view and broadcast to anything showing balances.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod shared;


pub use application::{AccountView, BalanceEvent, DepositService, StatsNotifier};
pub use config::AppConfig;
pub use domain::{DepositMethod, DepositStep, PaymentSession, SettlementClient};
pub use infrastructure::{BankApiAdapter, DepositMonitor};
pub use shared::error::{AppError, AppResult};

/// Application result type
pub type Result<T> = std::result::Result<T, shared::error::AppError>;
