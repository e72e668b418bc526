//! Application services - Orchestration of the deposit flow

pub mod account_view;
pub mod deposit_service;
pub mod poll_scheduler;
pub mod stats_notifier;

pub use account_view::AccountView;
pub use deposit_service::DepositService;
pub use poll_scheduler::{PollControl, PollScheduler};
pub use stats_notifier::{BalanceEvent, StatsNotifier};
