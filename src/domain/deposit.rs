//! Deposit session state machine
//!
//! A deposit session moves through the following steps:
//!
//! ```text
//!                      ChoosingMethod
//!                 Network /        \ Token
//!                        v          v
//!            EnteringAmount        EnteringToken
//!                   |                    |
//!                   v                    v
//!           RequestingQuote        RedeemingToken
//!                   |                 /      \
//!                   v                /        \
//!   AwaitingNetworkSettlement       /          \
//!        |         |        \      /            \
//!        v         v         v    v              v
//!     Expired    Error       Success           Error
//! ```
//!
//! The machine is pure: every operation mutates the session synchronously
//! and returns the side effects the driver must perform (start or stop the
//! poll, reconcile a settlement). Asynchronous completions are applied with
//! the epoch of the session that started them; a completion whose epoch is
//! not current belongs to a superseded session and is rejected as stale.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::settlement::{Quote, QuoteStatus, Redemption, Settlement};
use crate::shared::error::{AppError, SettlementError};

/// Monotonic identity of a session within one machine
pub type Epoch = u64;

pub const INVALID_AMOUNT_MESSAGE: &str = "Please enter a valid amount";
pub const EMPTY_TOKEN_MESSAGE: &str = "Please paste a cashu token";
pub const REDEEM_FAILED_MESSAGE: &str = "Failed to redeem token";
pub const NETWORK_ERROR_MESSAGE: &str = "Network error";

/// How value enters the account. Fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepositMethod {
    /// Pay a quote on the Lightning-style settlement network
    Network,
    /// Redeem a cashu bearer token
    Token,
}

impl DepositMethod {
    /// The step where the user enters input for this method
    pub fn entry_step(&self) -> DepositStep {
        match self {
            DepositMethod::Network => DepositStep::EnteringAmount,
            DepositMethod::Token => DepositStep::EnteringToken,
        }
    }
}

impl std::str::FromStr for DepositMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "network" | "lightning" => Ok(DepositMethod::Network),
            "token" | "cashu" => Ok(DepositMethod::Token),
            _ => Err(format!("unsupported deposit method: {}", s)),
        }
    }
}

/// Current step of a session, with the data that only exists in that step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum DepositStep {
    ChoosingMethod,
    EnteringAmount,
    EnteringToken,
    RequestingQuote { amount: u64 },
    AwaitingNetworkSettlement { amount: u64, quote: Quote },
    RedeemingToken,
    Success(Settlement),
    Expired,
    Error,
}

impl DepositStep {
    pub fn name(&self) -> &'static str {
        match self {
            DepositStep::ChoosingMethod => "ChoosingMethod",
            DepositStep::EnteringAmount => "EnteringAmount",
            DepositStep::EnteringToken => "EnteringToken",
            DepositStep::RequestingQuote { .. } => "RequestingQuote",
            DepositStep::AwaitingNetworkSettlement { .. } => "AwaitingNetworkSettlement",
            DepositStep::RedeemingToken => "RedeemingToken",
            DepositStep::Success(_) => "Success",
            DepositStep::Expired => "Expired",
            DepositStep::Error => "Error",
        }
    }

    /// Heading shown above the step
    pub fn title(&self) -> &'static str {
        match self {
            DepositStep::ChoosingMethod => "Deposit",
            DepositStep::EnteringAmount | DepositStep::RequestingQuote { .. } => "Deposit Lightning",
            DepositStep::EnteringToken | DepositStep::RedeemingToken => "Deposit Token",
            DepositStep::AwaitingNetworkSettlement { .. } => "Pay Invoice",
            DepositStep::Success(_) => "Deposit Received!",
            DepositStep::Expired => "Invoice Expired",
            DepositStep::Error => "Error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DepositStep::Success(_) | DepositStep::Expired | DepositStep::Error)
    }

    /// A request to the settlement network is outstanding
    pub fn is_in_flight(&self) -> bool {
        matches!(self, DepositStep::RequestingQuote { .. } | DepositStep::RedeemingToken)
    }
}

impl std::fmt::Display for DepositStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One deposit attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentSession {
    pub id: Uuid,
    pub epoch: Epoch,
    pub method: Option<DepositMethod>,
    pub step: DepositStep,
    /// Amount asked for on the network path, or redeemed on the token path
    pub requested_amount: Option<u64>,
    pub last_error: Option<String>,
}

impl PaymentSession {
    fn new(epoch: Epoch, method: Option<DepositMethod>, step: DepositStep) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            method,
            step,
            requested_amount: None,
            last_error: None,
        }
    }

    fn quote(&self) -> Option<&Quote> {
        match &self.step {
            DepositStep::AwaitingNetworkSettlement { quote, .. } => Some(quote),
            _ => None,
        }
    }

    pub fn quote_id(&self) -> Option<&str> {
        self.quote().map(|q| q.quote_id.as_str())
    }

    pub fn payment_request(&self) -> Option<&str> {
        self.quote().map(|q| q.payment_request.as_str())
    }

    pub fn expires_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.quote().map(|q| q.expires_at)
    }

    pub fn settlement(&self) -> Option<Settlement> {
        match self.step {
            DepositStep::Success(settlement) => Some(settlement),
            _ => None,
        }
    }

    /// Nothing has happened in this session yet
    fn is_pristine(&self) -> bool {
        self.step == DepositStep::ChoosingMethod && self.method.is_none() && self.last_error.is_none()
    }
}

/// Side effects requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartPolling { quote_id: String },
    StopPolling,
    Reconcile(Settlement),
}

/// Why a transition was refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("{0}")]
    Validation(String),

    #[error("cannot {action} while {from}")]
    Invalid { from: &'static str, action: &'static str },

    #[error("response for superseded session (epoch {response}, current {current})")]
    Stale { response: Epoch, current: Epoch },
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::Validation(msg) => AppError::Validation(msg),
            TransitionError::Invalid { from, action } => AppError::InvalidTransition {
                from: from.to_string(),
                action: action.to_string(),
            },
            TransitionError::Stale { .. } => AppError::Internal(err.to_string()),
        }
    }
}

/// Parse user input as a positive whole amount
pub fn parse_amount(input: &str) -> Option<u64> {
    match input.trim().parse::<u64>() {
        Ok(amount) if amount > 0 => Some(amount),
        _ => None,
    }
}

/// User-facing text for a failed settlement call
pub fn failure_message(err: &SettlementError) -> String {
    match err {
        SettlementError::InvalidAmount(_) => INVALID_AMOUNT_MESSAGE.to_string(),
        SettlementError::InvalidToken(message) => message.clone(),
        SettlementError::Backend { message, .. } => message.clone(),
        SettlementError::Network(_) => NETWORK_ERROR_MESSAGE.to_string(),
    }
}

/// Explicit transition table for deposit sessions.
///
/// Exactly one session is live at a time. Every operation that starts a new
/// session bumps the epoch, which makes any response still in flight for the
/// previous session stale.
#[derive(Debug)]
pub struct DepositMachine {
    session: PaymentSession,
}

impl Default for DepositMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl DepositMachine {
    pub fn new() -> Self {
        Self { session: PaymentSession::new(0, None, DepositStep::ChoosingMethod) }
    }

    pub fn session(&self) -> &PaymentSession {
        &self.session
    }

    pub fn epoch(&self) -> Epoch {
        self.session.epoch
    }

    fn supersede(&mut self, method: Option<DepositMethod>, step: DepositStep) {
        self.session = PaymentSession::new(self.session.epoch + 1, method, step);
    }

    fn invalid(&self, action: &'static str) -> TransitionError {
        TransitionError::Invalid { from: self.session.step.name(), action }
    }

    fn ensure_current(&self, epoch: Epoch) -> Result<(), TransitionError> {
        if epoch == self.session.epoch {
            Ok(())
        } else {
            Err(TransitionError::Stale { response: epoch, current: self.session.epoch })
        }
    }

    /// `ChoosingMethod` → `EnteringAmount` | `EnteringToken`
    pub fn choose_method(&mut self, method: DepositMethod) -> Result<Vec<Effect>, TransitionError> {
        if self.session.step != DepositStep::ChoosingMethod {
            return Err(self.invalid("choose a method"));
        }
        self.supersede(Some(method), method.entry_step());
        Ok(Vec::new())
    }

    /// `EnteringAmount` → `RequestingQuote`.
    ///
    /// Invalid input leaves the step unchanged with `last_error` set. On
    /// success returns the epoch and amount the quote must be requested with.
    pub fn begin_quote(&mut self, input: &str) -> Result<(Epoch, u64), TransitionError> {
        if self.session.step != DepositStep::EnteringAmount {
            return Err(self.invalid("submit an amount"));
        }
        let Some(amount) = parse_amount(input) else {
            self.session.last_error = Some(INVALID_AMOUNT_MESSAGE.to_string());
            return Err(TransitionError::Validation(INVALID_AMOUNT_MESSAGE.to_string()));
        };
        self.session.last_error = None;
        self.session.requested_amount = Some(amount);
        self.session.step = DepositStep::RequestingQuote { amount };
        Ok((self.session.epoch, amount))
    }

    /// `RequestingQuote` → `AwaitingNetworkSettlement` | `Error`
    pub fn apply_quote(
        &mut self,
        epoch: Epoch,
        result: Result<Quote, SettlementError>,
    ) -> Result<Vec<Effect>, TransitionError> {
        self.ensure_current(epoch)?;
        let DepositStep::RequestingQuote { amount } = self.session.step else {
            return Err(self.invalid("apply a quote"));
        };
        match result {
            Ok(quote) => {
                let quote_id = quote.quote_id.clone();
                self.session.step = DepositStep::AwaitingNetworkSettlement { amount, quote };
                Ok(vec![Effect::StartPolling { quote_id }])
            }
            Err(err) => {
                self.session.last_error = Some(failure_message(&err));
                self.session.step = DepositStep::Error;
                Ok(Vec::new())
            }
        }
    }

    /// `EnteringToken` → `RedeemingToken`.
    ///
    /// Empty or whitespace-only input leaves the step unchanged with
    /// `last_error` set. On success returns the epoch and the trimmed token.
    pub fn begin_redeem(&mut self, input: &str) -> Result<(Epoch, String), TransitionError> {
        if self.session.step != DepositStep::EnteringToken {
            return Err(self.invalid("submit a token"));
        }
        let token = input.trim();
        if token.is_empty() {
            self.session.last_error = Some(EMPTY_TOKEN_MESSAGE.to_string());
            return Err(TransitionError::Validation(EMPTY_TOKEN_MESSAGE.to_string()));
        }
        self.session.last_error = None;
        self.session.step = DepositStep::RedeemingToken;
        Ok((self.session.epoch, token.to_string()))
    }

    /// `RedeemingToken` → `Success` | `Error`
    pub fn apply_redemption(
        &mut self,
        epoch: Epoch,
        result: Result<Redemption, SettlementError>,
    ) -> Result<Vec<Effect>, TransitionError> {
        self.ensure_current(epoch)?;
        if self.session.step != DepositStep::RedeemingToken {
            return Err(self.invalid("apply a redemption"));
        }
        match result {
            Ok(redemption) if redemption.success => {
                let settlement = Settlement {
                    settled_amount: redemption.settled_amount,
                    new_balance: redemption.new_balance,
                };
                self.session.requested_amount = Some(redemption.settled_amount);
                self.session.step = DepositStep::Success(settlement);
                Ok(vec![Effect::Reconcile(settlement)])
            }
            Ok(_) => {
                self.session.last_error = Some(REDEEM_FAILED_MESSAGE.to_string());
                self.session.step = DepositStep::Error;
                Ok(Vec::new())
            }
            Err(err) => {
                self.session.last_error = Some(failure_message(&err));
                self.session.step = DepositStep::Error;
                Ok(Vec::new())
            }
        }
    }

    /// The quote to check on the next poll tick, if polling should continue
    pub fn poll_target(&self) -> Option<(Epoch, String)> {
        self.session.quote_id().map(|id| (self.session.epoch, id.to_string()))
    }

    /// Apply one status check to `AwaitingNetworkSettlement`.
    ///
    /// Paid wins over expired. A failed check or a pending quote leaves the
    /// session untouched. Once the session has left the awaiting step any
    /// later status for it is refused, so `Success` is written at most once.
    pub fn apply_status(
        &mut self,
        epoch: Epoch,
        result: Result<QuoteStatus, SettlementError>,
    ) -> Result<Vec<Effect>, TransitionError> {
        self.ensure_current(epoch)?;
        let DepositStep::AwaitingNetworkSettlement { amount, .. } = self.session.step else {
            return Err(self.invalid("apply a status check"));
        };
        let status = match result {
            Ok(status) => status,
            Err(_) => return Ok(Vec::new()),
        };

        if status.paid {
            // A paid report without the confirmed balance is not authoritative yet
            let Some(new_balance) = status.new_balance else {
                return Ok(Vec::new());
            };
            let settlement = Settlement {
                settled_amount: status.settled_amount.unwrap_or(amount),
                new_balance,
            };
            self.session.step = DepositStep::Success(settlement);
            return Ok(vec![Effect::StopPolling, Effect::Reconcile(settlement)]);
        }

        if status.expired {
            self.session.step = DepositStep::Expired;
            return Ok(vec![Effect::StopPolling]);
        }

        Ok(Vec::new())
    }

    /// Local give-up once the configured maximum poll duration has elapsed
    pub fn expire_locally(&mut self, epoch: Epoch) -> Result<Vec<Effect>, TransitionError> {
        self.ensure_current(epoch)?;
        if !matches!(self.session.step, DepositStep::AwaitingNetworkSettlement { .. }) {
            return Err(self.invalid("expire the quote"));
        }
        self.session.step = DepositStep::Expired;
        Ok(vec![Effect::StopPolling])
    }

    /// Abandon the current attempt and return to `ChoosingMethod`
    pub fn cancel(&mut self) -> Result<Vec<Effect>, TransitionError> {
        if self.session.step.is_terminal() {
            return Err(self.invalid("cancel"));
        }
        if !self.session.is_pristine() {
            self.supersede(None, DepositStep::ChoosingMethod);
        }
        Ok(vec![Effect::StopPolling])
    }

    /// Step back one level, keeping the method where there is one to keep
    pub fn back(&mut self) -> Result<Vec<Effect>, TransitionError> {
        let target = match self.session.step {
            DepositStep::ChoosingMethod => return Ok(Vec::new()),
            DepositStep::EnteringAmount | DepositStep::EnteringToken => {
                self.supersede(None, DepositStep::ChoosingMethod);
                return Ok(vec![Effect::StopPolling]);
            }
            DepositStep::RequestingQuote { .. } | DepositStep::AwaitingNetworkSettlement { .. } => {
                DepositMethod::Network
            }
            DepositStep::RedeemingToken => DepositMethod::Token,
            DepositStep::Success(_) | DepositStep::Expired | DepositStep::Error => {
                return Err(self.invalid("go back"));
            }
        };
        self.supersede(Some(target), target.entry_step());
        Ok(vec![Effect::StopPolling])
    }

    /// Tear everything down. Valid from any step and idempotent.
    pub fn close(&mut self) -> Vec<Effect> {
        if !self.session.is_pristine() {
            self.supersede(None, DepositStep::ChoosingMethod);
        }
        vec![Effect::StopPolling]
    }

    /// From `Error` or `Expired`, start a fresh session at the entry step
    /// of the same method
    pub fn retry(&mut self) -> Result<Vec<Effect>, TransitionError> {
        if !matches!(self.session.step, DepositStep::Error | DepositStep::Expired) {
            return Err(self.invalid("retry"));
        }
        match self.session.method {
            Some(method) => self.supersede(Some(method), method.entry_step()),
            None => self.supersede(None, DepositStep::ChoosingMethod),
        }
        Ok(vec![Effect::StopPolling])
    }

    /// From `Success`, start a fresh session at `ChoosingMethod`
    pub fn start_over(&mut self) -> Result<Vec<Effect>, TransitionError> {
        if !matches!(self.session.step, DepositStep::Success(_)) {
            return Err(self.invalid("start over"));
        }
        self.supersede(None, DepositStep::ChoosingMethod);
        Ok(Vec::new())
    }
}
