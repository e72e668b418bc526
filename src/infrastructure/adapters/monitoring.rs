//! Monitoring adapter for deposit flow metrics
//!
//! This adapter keeps Prometheus counters for quotes, redemptions, poll
//! ticks and settlements, plus a histogram of status-check latency.

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};

use crate::shared::error::{AppError, AppResult};

pub struct DepositMonitor {
    registry: Registry,
    quotes_created: IntCounter,
    redemptions: IntCounter,
    poll_ticks: IntCounter,
    poll_failures: IntCounter,
    settlements: IntCounter,
    expirations: IntCounter,
    stale_responses: IntCounter,
    status_check_seconds: Histogram,
}

impl DepositMonitor {
    /// Create a monitor with its own registry
    pub fn new() -> AppResult<Self> {
        let registry = Registry::new();

        let counter = |name: &str, help: &str| -> AppResult<IntCounter> {
            let counter = IntCounter::new(name, help)?;
            registry.register(Box::new(counter.clone()))?;
            Ok(counter)
        };

        let quotes_created = counter("deposit_quotes_created_total", "Network deposit quotes created")?;
        let redemptions = counter("deposit_token_redemptions_total", "Bearer tokens redeemed")?;
        let poll_ticks = counter("deposit_poll_ticks_total", "Settlement status checks issued")?;
        let poll_failures = counter("deposit_poll_failures_total", "Settlement status checks that failed")?;
        let settlements = counter("deposit_settlements_total", "Deposits reconciled")?;
        let expirations = counter("deposit_expirations_total", "Deposit quotes that expired")?;
        let stale_responses = counter(
            "deposit_stale_responses_total",
            "Responses discarded because their session was superseded",
        )?;

        let status_check_seconds = Histogram::with_opts(HistogramOpts::new(
            "deposit_status_check_seconds",
            "Settlement status check latency in seconds",
        ))?;
        registry.register(Box::new(status_check_seconds.clone()))?;

        Ok(Self {
            registry,
            quotes_created,
            redemptions,
            poll_ticks,
            poll_failures,
            settlements,
            expirations,
            stale_responses,
            status_check_seconds,
        })
    }

    pub fn record_quote_created(&self) {
        self.quotes_created.inc();
    }

    pub fn record_redemption(&self) {
        self.redemptions.inc();
    }

    pub fn record_poll_tick(&self, elapsed_seconds: f64) {
        self.poll_ticks.inc();
        self.status_check_seconds.observe(elapsed_seconds);
    }

    pub fn record_poll_failure(&self) {
        self.poll_failures.inc();
    }

    pub fn record_settlement(&self) {
        self.settlements.inc();
    }

    pub fn record_expiration(&self) {
        self.expirations.inc();
    }

    pub fn record_stale_response(&self) {
        self.stale_responses.inc();
    }

    pub fn poll_ticks(&self) -> u64 {
        self.poll_ticks.get()
    }

    pub fn settlements(&self) -> u64 {
        self.settlements.get()
    }

    pub fn stale_responses(&self) -> u64 {
        self.stale_responses.get()
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn render(&self) -> AppResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| AppError::Internal(format!("metrics are not UTF-8: {}", e)))
    }
}
