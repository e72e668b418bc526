//! Fixed-interval poll driver for outstanding quotes

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

/// What the poll loop should do after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollControl {
    Continue,
    Stop,
}

struct ActivePoll {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Fires a tick immediately on start and then every `interval` until stopped.
///
/// Ticks are single-flight: the loop awaits each tick before arming the next
/// one, and a tick that overruns the interval delays the schedule rather than
/// bursting. At most one loop exists per scheduler. Dropping the scheduler
/// stops it.
pub struct PollScheduler {
    interval: Duration,
    active: Option<ActivePoll>,
}

impl PollScheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval, active: None }
    }

    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.running.load(Ordering::Acquire) && !active.handle.is_finished())
    }

    /// Start polling. Returns `false` without doing anything if a loop is
    /// already running. Must be called from within a tokio runtime.
    pub fn start<F, Fut>(&mut self, mut tick: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = PollControl> + Send + 'static,
    {
        if self.is_running() {
            return false;
        }
        // Clear a loop that ended on its own
        self.stop();

        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let period = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !flag.load(Ordering::Acquire) {
                    break;
                }
                if tick().await == PollControl::Stop {
                    break;
                }
            }
            flag.store(false, Ordering::Release);
            debug!("Poll loop finished");
        });

        self.active = Some(ActivePoll { running, handle });
        true
    }

    /// Stop polling. Safe to call when nothing is running; returns whether
    /// a loop was stopped.
    ///
    /// No tick starts after this returns. A tick already awaiting its
    /// response is cancelled at its next suspension point.
    pub fn stop(&mut self) -> bool {
        match self.active.take() {
            Some(active) => {
                active.running.store(false, Ordering::Release);
                active.handle.abort();
                true
            }
            None => false,
        }
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
