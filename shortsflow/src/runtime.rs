//! Run-wide time budget and timed execution helpers.
//!
//! Provider calls never outlive the run deadline: every call is wrapped in a
//! timeout equal to the remaining budget, or the per-call timeout if that is
//! shorter.

use std::future::Future;
use std::time::Duration;
use tokio::time::{timeout, Instant};

/// The time budget of one pipeline run, fixed at run start.
#[derive(Debug, Clone, Copy)]
pub struct RunDeadline {
    started: Instant,
    budget: Duration,
}

impl RunDeadline {
    /// Starts a budget now.
    #[must_use]
    pub fn start(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    /// The total budget.
    #[must_use]
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Time spent since the run started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Elapsed time in whole milliseconds.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }

    /// Time left, or `None` once the budget is spent.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.budget
            .checked_sub(self.elapsed())
            .filter(|left| !left.is_zero())
    }

    /// Returns true once the budget is spent.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining().is_none()
    }

    /// The timeout for a single call: the remaining budget, capped by `call_timeout`.
    #[must_use]
    pub fn call_budget(&self, call_timeout: Option<Duration>) -> Option<Duration> {
        let remaining = self.remaining()?;
        Some(call_timeout.map_or(remaining, |limit| limit.min(remaining)))
    }
}

/// Result of a timed operation.
#[derive(Debug)]
pub enum TimedResult<T, E> {
    /// Operation completed successfully.
    Ok(T),
    /// Operation failed with an error.
    Err(E),
    /// Operation timed out.
    Timeout,
}

impl<T, E> TimedResult<T, E> {
    /// Returns true if the operation timed out.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, TimedResult::Timeout)
    }

    /// Converts to a standard Result, mapping a timeout through `on_timeout`.
    pub fn into_result(self, on_timeout: impl FnOnce() -> E) -> Result<T, E> {
        match self {
            TimedResult::Ok(v) => Ok(v),
            TimedResult::Err(e) => Err(e),
            TimedResult::Timeout => Err(on_timeout()),
        }
    }
}

/// Runs a future with a timeout. The future is dropped if it runs over.
pub async fn run_with_timeout<T, E, F>(duration: Duration, future: F) -> TimedResult<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    match timeout(duration, future).await {
        Ok(Ok(value)) => TimedResult::Ok(value),
        Ok(Err(error)) => TimedResult::Err(error),
        Err(_) => TimedResult::Timeout,
    }
}
