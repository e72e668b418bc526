//! Dashboard-side account state
//!
//! Holds the last known account snapshot and applies server-confirmed
//! balances from deposit settlements.

use std::sync::{PoisonError, RwLock};

use tracing::info;

use crate::domain::account::AccountSnapshot;
use crate::domain::reconciliation::ReconciliationSink;
use crate::infrastructure::adapters::BankApiAdapter;
use crate::shared::error::AppResult;

#[derive(Debug, Default)]
pub struct AccountView {
    snapshot: RwLock<Option<AccountSnapshot>>,
}

impl AccountView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: AccountSnapshot) -> Self {
        Self { snapshot: RwLock::new(Some(snapshot)) }
    }

    pub fn snapshot(&self) -> Option<AccountSnapshot> {
        self.snapshot.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn balance(&self) -> Option<u64> {
        self.snapshot().map(|s| s.balance)
    }

    pub fn replace(&self, snapshot: AccountSnapshot) {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
    }

    /// Reload the snapshot from the account API
    pub async fn refresh(&self, api: &BankApiAdapter) -> AppResult<AccountSnapshot> {
        let snapshot = api.get_account_snapshot().await?;
        self.replace(snapshot.clone());
        Ok(snapshot)
    }
}

impl ReconciliationSink for AccountView {
    fn on_settled(&self, settled_amount: u64, new_balance: u64) {
        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(snapshot) = guard.as_mut() {
            // Server-confirmed figure, never local arithmetic
            snapshot.balance = new_balance;
            info!(
                username = %snapshot.username,
                settled_amount = settled_amount,
                balance = new_balance,
                "Account balance updated from settlement"
            );
        }
    }
}
