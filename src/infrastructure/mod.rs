//! Infrastructure layer - External concerns and adapters
//!
//! This module contains the HTTP client for the account API and the
//! metrics adapter.

pub mod adapters;

pub use adapters::{BankApiAdapter, DepositMonitor};
