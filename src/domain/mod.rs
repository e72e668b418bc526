//! Domain layer - Core deposit logic and domain models
//!
//! This module contains the deposit state machine, the settlement and
//! reconciliation ports, and account models. Nothing here performs I/O.

pub mod account;
pub mod deposit;
pub mod reconciliation;
pub mod settlement;

pub use account::{format_amount, truncate_payment_request, AccountSnapshot, BankStats, MintInfo};
pub use deposit::{
    DepositMachine, DepositMethod, DepositStep, Effect, Epoch, PaymentSession, TransitionError,
};
pub use reconciliation::ReconciliationSink;
pub use settlement::{Quote, QuoteStatus, Redemption, Settlement, SettlementClient};
