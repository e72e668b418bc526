//! Common test utilities and mock implementations
//!
//! This module provides a scripted settlement client, a sink that records
//! every reconciliation, and a harness wiring both into a `DepositService`.

use crate::{
    application::services::{DepositService, StatsNotifier},
    config::AppConfig,
    domain::{
        reconciliation::ReconciliationSink,
        settlement::{Quote, QuoteStatus, Redemption, SettlementClient},
    },
    infrastructure::adapters::DepositMonitor,
    shared::error::SettlementError,
};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted settlement client.
///
/// Each operation pops the next scripted response. With nothing scripted,
/// quotes get a fresh `q<n>`, status checks report pending and redemptions
/// fail.
pub struct MockSettlementClient {
    quotes: Mutex<VecDeque<Result<Quote, SettlementError>>>,
    statuses: Mutex<VecDeque<Result<QuoteStatus, SettlementError>>>,
    redemptions: Mutex<VecDeque<Result<Redemption, SettlementError>>>,
    fallback_status: Mutex<QuoteStatus>,
    call_count: Mutex<HashMap<&'static str, u32>>,
    checked_quotes: Mutex<Vec<String>>,
    delay: Mutex<Option<Duration>>,
}

impl MockSettlementClient {
    /// Create a new mock client
    pub fn new() -> Self {
        Self {
            quotes: Mutex::new(VecDeque::new()),
            statuses: Mutex::new(VecDeque::new()),
            redemptions: Mutex::new(VecDeque::new()),
            fallback_status: Mutex::new(QuoteStatus::pending()),
            call_count: Mutex::new(HashMap::new()),
            checked_quotes: Mutex::new(Vec::new()),
            delay: Mutex::new(None),
        }
    }

    pub fn push_quote(&self, quote: Result<Quote, SettlementError>) {
        self.quotes.lock().unwrap().push_back(quote);
    }

    pub fn push_status(&self, status: Result<QuoteStatus, SettlementError>) {
        self.statuses.lock().unwrap().push_back(status);
    }

    pub fn push_redemption(&self, redemption: Result<Redemption, SettlementError>) {
        self.redemptions.lock().unwrap().push_back(redemption);
    }

    /// Status reported once the scripted statuses run out
    pub fn set_fallback_status(&self, status: QuoteStatus) {
        *self.fallback_status.lock().unwrap() = status;
    }

    /// Delay every response by `delay`
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Get call count for an operation
    pub fn get_call_count(&self, operation: &str) -> u32 {
        *self.call_count.lock().unwrap().get(operation).unwrap_or(&0)
    }

    /// Quote ids passed to `check_status`, in order
    pub fn checked_quotes(&self) -> Vec<String> {
        self.checked_quotes.lock().unwrap().clone()
    }

    fn record(&self, operation: &'static str) -> u32 {
        let mut calls = self.call_count.lock().unwrap();
        let count = calls.entry(operation).or_insert(0);
        *count += 1;
        *count
    }

    async fn respond(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl SettlementClient for MockSettlementClient {
    async fn create_quote(&self, amount: u64) -> Result<Quote, SettlementError> {
        let n = self.record("create_quote");
        self.respond().await;
        if amount == 0 {
            return Err(SettlementError::InvalidAmount(amount));
        }
        let scripted = self.quotes.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(fixtures::quote(&format!("q{}", n))))
    }

    async fn check_status(&self, quote_id: &str) -> Result<QuoteStatus, SettlementError> {
        self.record("check_status");
        self.checked_quotes.lock().unwrap().push(quote_id.to_string());
        self.respond().await;
        let scripted = self.statuses.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(self.fallback_status.lock().unwrap().clone()))
    }

    async fn redeem_token(&self, _token: &str) -> Result<Redemption, SettlementError> {
        self.record("redeem_token");
        self.respond().await;
        let scripted = self.redemptions.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Err(SettlementError::InvalidToken("Token already spent".to_string())))
    }
}

/// Sink that records every reconciliation it receives
#[derive(Default)]
pub struct RecordingSink {
    settled: Mutex<Vec<(u64, u64)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn settled(&self) -> Vec<(u64, u64)> {
        self.settled.lock().unwrap().clone()
    }
}

impl ReconciliationSink for RecordingSink {
    fn on_settled(&self, settled_amount: u64, new_balance: u64) {
        self.settled.lock().unwrap().push((settled_amount, new_balance));
    }
}

/// A deposit service wired to mocks
pub struct TestHarness {
    pub service: Arc<DepositService>,
    pub client: Arc<MockSettlementClient>,
    pub sink: Arc<RecordingSink>,
    pub notifier: StatsNotifier,
    pub monitor: Arc<DepositMonitor>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(&super::config::test_config())
    }

    pub fn with_config(config: &AppConfig) -> Self {
        super::config::init();
        let client = Arc::new(MockSettlementClient::new());
        let sink = Arc::new(RecordingSink::new());
        let notifier = StatsNotifier::default();
        let monitor = Arc::new(DepositMonitor::new().unwrap());
        let service = Arc::new(DepositService::new(
            &config.deposit,
            client.clone(),
            sink.clone(),
            notifier.clone(),
            monitor.clone(),
        ));
        Self { service, client, sink, notifier, monitor }
    }
}

/// Test data
pub mod fixtures {
    use super::*;

    pub fn quote(id: &str) -> Quote {
        Quote {
            quote_id: id.to_string(),
            payment_request: format!("lnbc10u1p{}{}", id, "q".repeat(60)),
            expires_at: Utc::now() + ChronoDuration::minutes(10),
        }
    }

    pub fn redemption(settled_amount: u64, new_balance: u64) -> Redemption {
        Redemption { success: true, settled_amount, new_balance }
    }
}
