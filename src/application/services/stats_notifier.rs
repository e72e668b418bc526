//! "Balances changed" notification channel
//!
//! Owned by the host application and handed to whatever publishes
//! settlements. Display components subscribe explicitly instead of
//! listening on an ambient event bus.

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::domain::settlement::Settlement;

/// Broadcast after every confirmed settlement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceEvent {
    pub settled_amount: u64,
    pub new_balance: u64,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StatsNotifier {
    sender: broadcast::Sender<BalanceEvent>,
}

impl StatsNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BalanceEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publish a settlement; returns how many subscribers received it
    pub fn notify(&self, settlement: Settlement) -> usize {
        let event = BalanceEvent {
            settled_amount: settlement.settled_amount,
            new_balance: settlement.new_balance,
            at: Utc::now(),
        };
        // No subscribers is not an error
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for StatsNotifier {
    fn default() -> Self {
        Self::new(16)
    }
}
