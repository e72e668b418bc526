//! Reconciliation port
//!
//! The deposit flow never mutates a balance itself. It forwards the
//! server-confirmed figures to a sink owned by the host application.

/// Receives confirmed settlements from a deposit session.
///
/// Called exactly once per successful session and never while the flow
/// holds its internal state lock, so implementations may call back into the
/// flow.
pub trait ReconciliationSink: Send + Sync {
    fn on_settled(&self, settled_amount: u64, new_balance: u64);
}

impl<F> ReconciliationSink for F
where
    F: Fn(u64, u64) + Send + Sync,
{
    fn on_settled(&self, settled_amount: u64, new_balance: u64) {
        self(settled_amount, new_balance)
    }
}
