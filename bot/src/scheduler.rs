use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::warn;

/// Decides when the next run happens.
#[async_trait]
pub trait TickSource: Send {
    async fn tick(&mut self);
}

/// Work run once per tick. A run is never interrupted by [`Scheduler::stop`].
#[async_trait]
pub trait Task: Send {
    async fn run(&mut self);
}

/// Fires immediately, then every `period`. Late ticks are delayed rather than bunched.
pub struct IntervalTicker(Interval);

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self(interval)
    }
}

#[async_trait]
impl TickSource for IntervalTicker {
    async fn tick(&mut self) {
        self.0.tick().await;
    }
}

/// Drives a [`Task`] from a [`TickSource`] on its own tokio task until stopped.
pub struct Scheduler<T> {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<T>,
}

impl<T: Task + 'static> Scheduler<T> {
    pub fn start(mut ticks: impl TickSource + 'static, mut task: T) -> Self {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    // Also fires if the scheduler handle is dropped.
                    _ = stop_rx.changed() => break,
                    () = ticks.tick() => task.run().await,
                }
            }
            task
        });
        Self { stop_tx, handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Signals the loop, waits for any in-progress run, and hands the task back.
    pub async fn stop(self) -> Option<T> {
        let _ = self.stop_tx.send(true);
        match self.handle.await {
            Ok(task) => Some(task),
            Err(e) => {
                warn!(error = %e, "scheduler task ended abnormally");
                None
            }
        }
    }
}
