//! Deposit service that drives the deposit state machine
//!
//! The service owns the live `PaymentSession` (inside a `DepositMachine`),
//! the settlement client, the poll scheduler and the reconciliation sink.
//! Every transition runs under one lock, so transitions are serialized no
//! matter which task issues them; network calls happen outside the lock and
//! their responses are applied with the epoch that started them.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{instrument, warn};

use crate::application::services::poll_scheduler::{PollControl, PollScheduler};
use crate::application::services::stats_notifier::StatsNotifier;
use crate::config::DepositConfig;
use crate::domain::deposit::{DepositMachine, DepositMethod, DepositStep, Effect, Epoch, PaymentSession, TransitionError};
use crate::domain::reconciliation::ReconciliationSink;
use crate::domain::settlement::{Settlement, SettlementClient};
use crate::infrastructure::adapters::DepositMonitor;
use crate::shared::error::{AppError, AppResult};
use crate::shared::logging::LoggingUtils;

struct FlowState {
    machine: DepositMachine,
    scheduler: PollScheduler,
}

struct FlowShared {
    state: Mutex<FlowState>,
    client: Arc<dyn SettlementClient>,
    sink: Arc<dyn ReconciliationSink>,
    notifier: StatsNotifier,
    monitor: Arc<DepositMonitor>,
    updates: watch::Sender<PaymentSession>,
    max_poll_duration: Option<Duration>,
}

impl FlowShared {
    fn lock(&self) -> MutexGuard<'_, FlowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one transition under the lock and carry out its effects.
    ///
    /// Scheduler effects run under the lock so that a stopped poll can never
    /// observe the state it was stopped for. Reconciliation runs after the
    /// lock is released.
    fn transition<T, F>(self: &Arc<Self>, f: F) -> Result<(T, PaymentSession), TransitionError>
    where
        F: FnOnce(&mut DepositMachine) -> Result<(T, Vec<Effect>), TransitionError>,
    {
        let (value, session, reconcile) = {
            let mut state = self.lock();
            let before = state.machine.session().step.name();
            let result = f(&mut state.machine);
            let session = state.machine.session().clone();
            self.publish(&session);
            let (value, effects) = result?;

            let mut reconcile = None;
            for effect in effects {
                match effect {
                    Effect::StartPolling { quote_id } => self.start_polling(&mut state, &session, quote_id),
                    Effect::StopPolling => {
                        state.scheduler.stop();
                    }
                    Effect::Reconcile(settlement) => reconcile = Some(settlement),
                }
            }

            if session.step.name() != before {
                LoggingUtils::log_transition(&session.id.to_string(), session.epoch, before, session.step.name());
                if session.step == DepositStep::Expired {
                    self.monitor.record_expiration();
                }
            }
            (value, session, reconcile)
        };

        if let Some(settlement) = reconcile {
            self.reconcile(&session, settlement);
        }
        Ok((value, session))
    }

    fn publish(&self, session: &PaymentSession) {
        self.updates.send_if_modified(|current| {
            if current == session {
                false
            } else {
                *current = session.clone();
                true
            }
        });
    }

    fn start_polling(self: &Arc<Self>, state: &mut FlowState, session: &PaymentSession, quote_id: String) {
        let weak = Arc::downgrade(self);
        let epoch = session.epoch;
        let started = Instant::now();

        let started_now = state.scheduler.start(move || {
            let weak = weak.clone();
            async move {
                match weak.upgrade() {
                    Some(shared) => shared.poll_once(epoch, started).await,
                    None => PollControl::Stop,
                }
            }
        });

        if started_now {
            LoggingUtils::log_quote_created(&session.id.to_string(), &quote_id, session.requested_amount.unwrap_or(0));
        } else {
            warn!(quote_id = %quote_id, "Poll already running, not starting another");
        }
    }

    /// One poll tick: a single status check applied to the session it was
    /// started for
    async fn poll_once(self: Arc<Self>, epoch: Epoch, started: Instant) -> PollControl {
        let target = self.lock().machine.poll_target();
        let Some((current, quote_id)) = target else {
            return PollControl::Stop;
        };
        if current != epoch {
            return PollControl::Stop;
        }

        if let Some(max) = self.max_poll_duration {
            if started.elapsed() >= max {
                warn!(
                    quote_id = %quote_id,
                    max_seconds = max.as_secs(),
                    "Giving up on deposit quote after maximum poll duration"
                );
                let outcome = self.transition(|m| Ok(((), m.expire_locally(epoch)?)));
                self.discard_if_stale("expire", epoch, outcome.err());
                return PollControl::Stop;
            }
        }

        let checked_at = Instant::now();
        let result = self.client.check_status(&quote_id).await;
        self.monitor.record_poll_tick(checked_at.elapsed().as_secs_f64());

        if let Err(err) = &result {
            let session_id = self.lock().machine.session().id.to_string();
            LoggingUtils::log_poll_failure(&session_id, &quote_id, err);
            self.monitor.record_poll_failure();
        }

        match self.transition(|m| Ok(((), m.apply_status(epoch, result)?))) {
            Ok((_, session)) if matches!(session.step, DepositStep::AwaitingNetworkSettlement { .. }) => {
                PollControl::Continue
            }
            Ok(_) => PollControl::Stop,
            Err(err) => {
                self.discard_if_stale("check_status", epoch, Some(err));
                PollControl::Stop
            }
        }
    }

    fn discard_if_stale(&self, operation: &str, epoch: Epoch, err: Option<TransitionError>) {
        if err.is_some() {
            let current = self.lock().machine.epoch();
            LoggingUtils::log_stale_response(operation, epoch, current);
            self.monitor.record_stale_response();
        }
    }

    fn reconcile(&self, session: &PaymentSession, settlement: Settlement) {
        LoggingUtils::log_settlement(&session.id.to_string(), settlement.settled_amount, settlement.new_balance);
        self.monitor.record_settlement();
        self.sink.on_settled(settlement.settled_amount, settlement.new_balance);
        self.notifier.notify(settlement);
    }
}

/// Drives one deposit modal: exactly one live session at a time.
///
/// Dropping the service closes the session and cancels any poll.
pub struct DepositService {
    shared: Arc<FlowShared>,
}

impl DepositService {
    pub fn new(
        config: &DepositConfig,
        client: Arc<dyn SettlementClient>,
        sink: Arc<dyn ReconciliationSink>,
        notifier: StatsNotifier,
        monitor: Arc<DepositMonitor>,
    ) -> Self {
        let machine = DepositMachine::new();
        let (updates, _) = watch::channel(machine.session().clone());
        let shared = FlowShared {
            state: Mutex::new(FlowState {
                machine,
                scheduler: PollScheduler::new(config.poll_interval()),
            }),
            client,
            sink,
            notifier,
            monitor,
            updates,
            max_poll_duration: config.max_poll_duration(),
        };
        Self { shared: Arc::new(shared) }
    }

    /// Current session
    pub fn session(&self) -> PaymentSession {
        self.shared.lock().machine.session().clone()
    }

    /// Receive every session change; the UI renders from this
    pub fn subscribe(&self) -> watch::Receiver<PaymentSession> {
        self.shared.updates.subscribe()
    }

    pub fn is_polling(&self) -> bool {
        self.shared.lock().scheduler.is_running()
    }

    pub fn choose_method(&self, method: DepositMethod) -> AppResult<PaymentSession> {
        let (_, session) = self.shared.transition(|m| Ok(((), m.choose_method(method)?)))?;
        Ok(session)
    }

    /// Validate the amount, request a quote and start polling for it.
    ///
    /// Invalid input returns `AppError::Validation` and leaves the session at
    /// `EnteringAmount`. A failed quote request is not an error of this call:
    /// the session moves to `Error` and the returned snapshot says so.
    #[instrument(skip(self, input))]
    pub async fn submit_amount(&self, input: &str) -> AppResult<PaymentSession> {
        let ((epoch, amount), _) = self.shared.transition(|m| Ok((m.begin_quote(input)?, Vec::new())))?;

        let result = self.shared.client.create_quote(amount).await;
        if result.is_ok() {
            self.shared.monitor.record_quote_created();
        }

        self.complete("create_quote", epoch, |m| Ok(((), m.apply_quote(epoch, result)?)))
    }

    /// Validate and redeem a bearer token.
    ///
    /// Empty input returns `AppError::Validation` without contacting the
    /// network. A rejected token moves the session to `Error`.
    #[instrument(skip(self, input))]
    pub async fn submit_token(&self, input: &str) -> AppResult<PaymentSession> {
        let ((epoch, token), _) = self.shared.transition(|m| Ok((m.begin_redeem(input)?, Vec::new())))?;

        let result = self.shared.client.redeem_token(&token).await;
        if matches!(&result, Ok(r) if r.success) {
            self.shared.monitor.record_redemption();
        }

        self.complete("redeem_token", epoch, |m| Ok(((), m.apply_redemption(epoch, result)?)))
    }

    /// Apply a network response; a response for a superseded session is
    /// dropped and the current session returned
    fn complete<F>(&self, operation: &str, epoch: Epoch, f: F) -> AppResult<PaymentSession>
    where
        F: FnOnce(&mut DepositMachine) -> Result<((), Vec<Effect>), TransitionError>,
    {
        match self.shared.transition(f) {
            Ok((_, session)) => Ok(session),
            Err(TransitionError::Validation(msg)) => Err(AppError::Validation(msg)),
            Err(err) => {
                self.shared.discard_if_stale(operation, epoch, Some(err));
                Ok(self.session())
            }
        }
    }

    pub fn cancel(&self) -> AppResult<PaymentSession> {
        let (_, session) = self.shared.transition(|m| Ok(((), m.cancel()?)))?;
        Ok(session)
    }

    pub fn back(&self) -> AppResult<PaymentSession> {
        let (_, session) = self.shared.transition(|m| Ok(((), m.back()?)))?;
        Ok(session)
    }

    /// Tear down the session and any poll. Safe to call repeatedly.
    pub fn close(&self) -> PaymentSession {
        match self.shared.transition(|m| Ok(((), m.close()))) {
            Ok((_, session)) => session,
            Err(_) => self.session(),
        }
    }

    pub fn retry(&self) -> AppResult<PaymentSession> {
        let (_, session) = self.shared.transition(|m| Ok(((), m.retry()?)))?;
        Ok(session)
    }

    pub fn start_over(&self) -> AppResult<PaymentSession> {
        let (_, session) = self.shared.transition(|m| Ok(((), m.start_over()?)))?;
        Ok(session)
    }
}

impl Drop for DepositService {
    fn drop(&mut self) {
        self.close();
    }
}
