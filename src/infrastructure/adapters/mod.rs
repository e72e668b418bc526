//! Infrastructure adapters module
//!
//! This module contains adapters for external services and infrastructure concerns.

pub mod bank_api;
pub mod monitoring;

pub use bank_api::BankApiAdapter;
pub use monitoring::DepositMonitor;
