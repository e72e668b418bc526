//! Integration tests for complete deposit sessions
//!
//! Polling runs on the real scheduler with tokio's clock paused, so a
//! `sleep` advances time deterministically across poll ticks.

use crate::{
    domain::{
        deposit::{DepositMethod, DepositStep},
        settlement::QuoteStatus,
    },
    shared::error::SettlementError,
    tests::{
        common::{fixtures, TestHarness},
        config, TestResult,
    },
};
use std::time::Duration;
use tokio::time::sleep;

const POLL: Duration = Duration::from_millis(3000);

/// Let spawned work for the current instant run
async fn settle() {
    sleep(Duration::from_millis(10)).await;
}

async fn awaiting_quote(harness: &TestHarness, amount: &str) -> TestResult<()> {
    harness.service.choose_method(DepositMethod::Network)?;
    let session = harness.service.submit_amount(amount).await?;
    assert!(matches!(session.step, DepositStep::AwaitingNetworkSettlement { .. }));
    Ok(())
}

/// Network deposit sessions driven through polling
pub mod network_deposit {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn pending_then_paid_settles_exactly_once() -> TestResult<()> {
        let harness = TestHarness::new();
        let mut events = harness.notifier.subscribe();
        harness.client.push_quote(Ok(fixtures::quote("q1")));
        harness.client.push_status(Ok(QuoteStatus::pending()));
        harness.client.push_status(Ok(QuoteStatus::paid(1000, 5000)));

        awaiting_quote(&harness, "1000").await?;

        // First check fires immediately on activation
        settle().await;
        assert_eq!(harness.client.get_call_count("check_status"), 1);
        assert!(harness.sink.settled().is_empty());

        sleep(POLL).await;
        let session = harness.service.session();
        assert_eq!(session.settlement().map(|s| (s.settled_amount, s.new_balance)), Some((1000, 5000)));
        assert_eq!(harness.sink.settled(), vec![(1000, 5000)]);
        assert!(!harness.service.is_polling());

        let event = events.recv().await?;
        assert_eq!(event.new_balance, 5000);

        // No further checks once settled
        sleep(POLL * 5).await;
        assert_eq!(harness.client.get_call_count("check_status"), 2);
        assert_eq!(harness.client.checked_quotes(), vec!["q1", "q1"]);
        assert_eq!(harness.sink.settled().len(), 1);
        assert_eq!(harness.monitor.settlements(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_paid_reports_do_not_reconcile_twice() -> TestResult<()> {
        let harness = TestHarness::new();
        harness.client.set_fallback_status(QuoteStatus::paid(1000, 5000));

        awaiting_quote(&harness, "1000").await?;
        sleep(POLL * 4).await;

        assert_eq!(harness.sink.settled(), vec![(1000, 5000)]);
        assert_eq!(harness.client.get_call_count("check_status"), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn paid_without_amount_uses_requested_amount() -> TestResult<()> {
        let harness = TestHarness::new();
        harness.client.push_status(Ok(QuoteStatus {
            paid: true,
            expired: false,
            settled_amount: None,
            new_balance: Some(2500),
        }));

        awaiting_quote(&harness, "1500").await?;
        settle().await;

        assert_eq!(harness.sink.settled(), vec![(1500, 2500)]);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn paid_without_new_balance_keeps_polling() -> TestResult<()> {
        let harness = TestHarness::new();
        harness.client.push_status(Ok(QuoteStatus {
            paid: true,
            expired: false,
            settled_amount: Some(1000),
            new_balance: None,
        }));
        harness.client.push_status(Ok(QuoteStatus::paid(1000, 6000)));

        awaiting_quote(&harness, "1000").await?;
        settle().await;
        assert!(harness.sink.settled().is_empty());
        assert!(harness.service.is_polling());

        sleep(POLL).await;
        assert_eq!(harness.sink.settled(), vec![(1000, 6000)]);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn expired_quote_stops_polling() -> TestResult<()> {
        let harness = TestHarness::new();
        harness.client.push_status(Ok(QuoteStatus::pending()));
        harness.client.push_status(Ok(QuoteStatus::expired()));

        awaiting_quote(&harness, "1000").await?;
        settle().await;
        sleep(POLL).await;

        let session = harness.service.session();
        assert_eq!(session.step, DepositStep::Expired);
        assert_eq!(session.step.title(), "Invoice Expired");
        assert!(!harness.service.is_polling());
        assert!(harness.sink.settled().is_empty());

        sleep(POLL * 3).await;
        assert_eq!(harness.client.get_call_count("check_status"), 2);
        assert!(harness.monitor.render()?.contains("deposit_expirations_total 1"));

        let session = harness.service.retry()?;
        assert_eq!(session.step, DepositStep::EnteringAmount);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn failed_checks_are_swallowed_and_polling_continues() -> TestResult<()> {
        let harness = TestHarness::new();
        harness.client.push_status(Err(SettlementError::Network("connection reset".to_string())));
        harness.client.push_status(Err(SettlementError::Backend {
            status: 502,
            message: "An error occurred".to_string(),
        }));
        harness.client.push_status(Ok(QuoteStatus::paid(1000, 5000)));

        awaiting_quote(&harness, "1000").await?;
        settle().await;

        let session = harness.service.session();
        assert!(matches!(session.step, DepositStep::AwaitingNetworkSettlement { .. }));
        assert_eq!(session.last_error, None);

        sleep(POLL * 2).await;
        assert_eq!(harness.sink.settled(), vec![(1000, 5000)]);
        assert!(harness.monitor.render()?.contains("deposit_poll_failures_total 2"));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn slow_checks_never_overlap() -> TestResult<()> {
        let harness = TestHarness::new();
        awaiting_quote(&harness, "1000").await?;
        harness.client.set_delay(Duration::from_millis(5000));

        // Each check takes longer than the interval
        sleep(Duration::from_secs(16)).await;
        let checks = harness.client.get_call_count("check_status");
        assert!(checks <= 4, "expected at most 4 sequential checks, got {}", checks);
        assert!(harness.service.is_polling());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn max_poll_duration_expires_locally() -> TestResult<()> {
        let harness = TestHarness::with_config(&config::bounded_poll_config(1000, 5));
        awaiting_quote(&harness, "1000").await?;

        sleep(Duration::from_millis(6500)).await;
        let session = harness.service.session();
        assert_eq!(session.step, DepositStep::Expired);
        assert!(!harness.service.is_polling());
        assert!(harness.client.get_call_count("check_status") <= 5);
        Ok(())
    }
}

/// Cancelling, closing and stepping back while requests are in flight
pub mod superseded_sessions {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn cancel_during_quote_request_discards_the_quote() -> TestResult<()> {
        let harness = TestHarness::new();
        harness.client.set_delay(Duration::from_secs(2));
        harness.service.choose_method(DepositMethod::Network)?;

        let service = harness.service.clone();
        let pending = tokio::spawn(async move { service.submit_amount("1000").await });

        settle().await;
        assert!(harness.service.session().step.is_in_flight());
        let cancelled = harness.service.cancel()?;
        assert_eq!(cancelled.step, DepositStep::ChoosingMethod);

        let session = pending.await??;
        assert_eq!(session.step, DepositStep::ChoosingMethod);
        assert_eq!(session.epoch, cancelled.epoch);
        assert!(!harness.service.is_polling());

        sleep(POLL * 2).await;
        assert_eq!(harness.client.get_call_count("check_status"), 0);
        assert_eq!(harness.monitor.stale_responses(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_status_check_never_settles() -> TestResult<()> {
        let harness = TestHarness::new();
        awaiting_quote(&harness, "1000").await?;
        harness.client.set_delay(Duration::from_secs(1));
        harness.client.set_fallback_status(QuoteStatus::paid(1000, 5000));

        // The immediate check is now waiting on its response
        settle().await;
        assert_eq!(harness.client.get_call_count("check_status"), 1);
        harness.service.cancel()?;

        sleep(POLL * 3).await;
        assert_eq!(harness.service.session().step, DepositStep::ChoosingMethod);
        assert!(harness.sink.settled().is_empty());
        assert_eq!(harness.client.get_call_count("check_status"), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn back_from_invoice_returns_to_amount_entry() -> TestResult<()> {
        let harness = TestHarness::new();
        awaiting_quote(&harness, "1000").await?;
        settle().await;

        let session = harness.service.back()?;
        assert_eq!(session.step, DepositStep::EnteringAmount);
        assert_eq!(session.method, Some(DepositMethod::Network));
        assert!(!harness.service.is_polling());

        sleep(POLL * 2).await;
        assert_eq!(harness.client.get_call_count("check_status"), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn close_twice_leaves_nothing_running() -> TestResult<()> {
        let harness = TestHarness::new();
        awaiting_quote(&harness, "1000").await?;
        settle().await;

        let first = harness.service.close();
        let second = harness.service.close();
        assert_eq!(first.step, DepositStep::ChoosingMethod);
        assert_eq!(first.epoch, second.epoch);
        assert!(!harness.service.is_polling());

        sleep(POLL * 3).await;
        assert_eq!(harness.client.get_call_count("check_status"), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn new_quote_after_close_polls_only_the_new_quote() -> TestResult<()> {
        let harness = TestHarness::new();
        awaiting_quote(&harness, "1000").await?;
        settle().await;
        harness.service.close();

        awaiting_quote(&harness, "2000").await?;
        settle().await;
        sleep(POLL).await;

        assert_eq!(harness.client.checked_quotes(), vec!["q1", "q2", "q2"]);
        Ok(())
    }
}

/// Session updates as seen by a subscriber
pub mod observers {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn watch_subscriber_sees_settlement() -> TestResult<()> {
        let harness = TestHarness::new();
        let mut updates = harness.service.subscribe();
        harness.client.push_status(Ok(QuoteStatus::paid(1000, 5000)));

        awaiting_quote(&harness, "1000").await?;

        let settled = tokio::time::timeout(POLL, async {
            loop {
                if updates.changed().await.is_err() {
                    return None;
                }
                let session = updates.borrow_and_update().clone();
                if session.step.is_terminal() {
                    return Some(session);
                }
            }
        })
        .await?;

        let session = settled.ok_or("update channel closed")?;
        assert_eq!(session.settlement().map(|s| s.new_balance), Some(5000));
        Ok(())
    }
}
