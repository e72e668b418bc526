//! Settlement domain models and the client port
//!
//! A `SettlementClient` is a stateless request/response wrapper around the
//! backend's deposit endpoints. It owns no lifecycle and performs no retries;
//! polling and failure translation belong to the deposit flow.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::SettlementError;

/// A time-bounded network payment request issued by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub quote_id: String,
    /// Encoded payment request shown to the payer (invoice text)
    pub payment_request: String,
    /// Advisory only; the backend's `expired` flag is authoritative
    pub expires_at: DateTime<Utc>,
}

/// Result of a single settlement status check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteStatus {
    pub paid: bool,
    pub expired: bool,
    pub settled_amount: Option<u64>,
    pub new_balance: Option<u64>,
}

impl QuoteStatus {
    pub fn pending() -> Self {
        Self { paid: false, expired: false, settled_amount: None, new_balance: None }
    }

    pub fn paid(settled_amount: u64, new_balance: u64) -> Self {
        Self {
            paid: true,
            expired: false,
            settled_amount: Some(settled_amount),
            new_balance: Some(new_balance),
        }
    }

    pub fn expired() -> Self {
        Self { paid: false, expired: true, settled_amount: None, new_balance: None }
    }
}

/// Outcome of redeeming a bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redemption {
    pub success: bool,
    pub settled_amount: u64,
    pub new_balance: u64,
}

/// Server-confirmed settlement applied to the account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub settled_amount: u64,
    pub new_balance: u64,
}

/// Port to the backend's settlement operations
#[async_trait]
pub trait SettlementClient: Send + Sync {
    /// Request a payment quote for `amount` units of the house currency
    async fn create_quote(&self, amount: u64) -> Result<Quote, SettlementError>;

    /// Check whether a quote has been paid or has expired
    async fn check_status(&self, quote_id: &str) -> Result<QuoteStatus, SettlementError>;

    /// Redeem a bearer token into the account
    async fn redeem_token(&self, token: &str) -> Result<Redemption, SettlementError>;
}
