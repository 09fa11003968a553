//! Wall-clock budget for one unit of work.
//!
//! The work runs on its own task and races a timer. When the timer wins the task is
//! aborted: its future is dropped at the next await point, and with it any child
//! process handle (spawned with `kill_on_drop`), so a runaway submission is killed
//! rather than left running in the background. Work that blocks a runtime thread
//! without ever awaiting cannot be preempted this way; submissions therefore only run
//! out of process.

use std::future::Future;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeadlineError {
    #[error("deadline of {budget:?} exceeded")]
    Exceeded { budget: Duration },

    #[error("work panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Clone, Copy)]
pub struct DeadlineExecutor {
    budget: Duration,
}

impl DeadlineExecutor {
    pub fn new(budget: Duration) -> Self {
        Self { budget }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Run `work` under the budget. Exactly one outcome is reported per call.
    pub async fn run<F, T>(&self, work: F) -> Result<T, DeadlineError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let started = Instant::now();
        let mut handle: JoinHandle<T> = tokio::spawn(work);

        tokio::select! {
            joined = &mut handle => {
                tracing::debug!(elapsed_ms = started.elapsed().as_millis() as u64, "work finished within deadline");
                joined.map_err(|e| DeadlineError::Panicked(e.to_string()))
            }
            _ = tokio::time::sleep(self.budget) => {
                handle.abort();
                tracing::debug!(budget_ms = self.budget.as_millis() as u64, "deadline exceeded, work aborted");
                Err(DeadlineError::Exceeded { budget: self.budget })
            }
        }
    }
}
