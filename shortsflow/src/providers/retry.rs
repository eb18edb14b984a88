//! Retry policy for a single provider, with configurable backoff and jitter.
//!
//! Only transient errors are retried. Every call and every backoff sleep is
//! bounded by what is left of the run deadline.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::errors::ProviderError;
use crate::runtime::{run_with_timeout, RunDeadline, TimedResult};

/// Backoff strategy for retry delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// delay = base * 2^attempt
    #[default]
    Exponential,
    /// delay = base * (attempt + 1)
    Linear,
    /// delay = base (constant)
    Constant,
}

/// Jitter strategy to prevent thundering herd.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter
    None,
    /// Random from 0 to delay
    #[default]
    Full,
    /// Half fixed, half random
    Equal,
    /// min(max, random(base, prev * 3))
    Decorrelated,
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum calls per provider, including the first.
    pub max_attempts: usize,
    /// Base delay between retries in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    pub max_delay_ms: u64,
    /// Backoff strategy.
    pub backoff_strategy: BackoffStrategy,
    /// Jitter strategy.
    pub jitter_strategy: JitterStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_strategy: BackoffStrategy::Exponential,
            jitter_strategy: JitterStrategy::Full,
        }
    }
}

impl RetryConfig {
    /// Creates a new retry config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the backoff strategy.
    #[must_use]
    pub fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff_strategy = strategy;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, strategy: JitterStrategy) -> Self {
        self.jitter_strategy = strategy;
        self
    }
}

impl RetryConfig {
    /// Un-jittered delay before retry number `retry` (0 for the first retry),
    /// capped at `max_delay_ms`.
    #[must_use]
    pub fn backoff_delay_ms(&self, retry: u32) -> u64 {
        let base = self.base_delay_ms;
        let delay = match self.backoff_strategy {
            BackoffStrategy::Exponential => base.saturating_mul(2u64.saturating_pow(retry)),
            BackoffStrategy::Linear => base.saturating_mul(u64::from(retry) + 1),
            BackoffStrategy::Constant => base,
        };
        delay.min(self.max_delay_ms)
    }
}

/// The delay sequence for one provider's retries.
#[derive(Debug, Clone, Default)]
pub struct Backoff {
    retries: u32,
    last_delay_ms: Option<u64>,
}

impl Backoff {
    /// A sequence that has not slept yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays handed out so far.
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Delay before the next retry. Advances the sequence.
    pub fn next_delay(&mut self, config: &RetryConfig) -> Duration {
        let delay = config.backoff_delay_ms(self.retries);
        let slept = match config.jitter_strategy {
            JitterStrategy::None => delay,
            JitterStrategy::Full => random_up_to(delay),
            JitterStrategy::Equal => {
                let half = delay / 2;
                half + random_up_to(delay - half)
            }
            JitterStrategy::Decorrelated => {
                let floor = config.base_delay_ms.min(config.max_delay_ms);
                let ceiling = self
                    .last_delay_ms
                    .unwrap_or(floor)
                    .saturating_mul(3)
                    .min(config.max_delay_ms);
                if ceiling <= floor {
                    floor
                } else {
                    rand::thread_rng().gen_range(floor..=ceiling)
                }
            }
        };
        self.retries += 1;
        self.last_delay_ms = Some(slept);
        Duration::from_millis(slept)
    }
}

fn random_up_to(ms: u64) -> u64 {
    if ms == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..=ms)
    }
}

/// Why a provider produced no value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryFailure {
    /// A non-retryable error ended the series.
    Permanent {
        /// The error.
        error: ProviderError,
        /// Calls issued.
        calls: u32,
    },
    /// The attempt budget ran out, or the limiter refused a retry.
    Exhausted {
        /// The last error seen.
        last_error: ProviderError,
        /// Calls issued.
        calls: u32,
    },
    /// The run deadline expired.
    Deadline {
        /// Calls issued.
        calls: u32,
    },
}

impl RetryFailure {
    /// Calls issued before the failure.
    #[must_use]
    pub fn calls(&self) -> u32 {
        match self {
            Self::Permanent { calls, .. } | Self::Exhausted { calls, .. } | Self::Deadline { calls } => {
                *calls
            }
        }
    }
}

/// Retries one provider's calls according to a [`RetryConfig`].
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
    call_timeout: Option<Duration>,
}

impl RetryPolicy {
    /// Creates a policy.
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            call_timeout: None,
        }
    }

    /// Caps each individual call.
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// The underlying config.
    #[must_use]
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Runs `operation` until it succeeds, fails permanently, runs out of
    /// attempts or runs out of time.
    ///
    /// `permit` is consulted before every retry (not before the first call);
    /// a refusal ends the series as exhausted. On success the value is
    /// returned with the number of calls issued.
    pub async fn execute<T, F, Fut, P>(
        &self,
        key: &str,
        deadline: &RunDeadline,
        mut permit: P,
        mut operation: F,
    ) -> Result<(T, u32), RetryFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
        P: FnMut() -> bool,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut backoff = Backoff::new();
        let mut calls: u32 = 0;

        loop {
            let Some(budget) = deadline.call_budget(self.call_timeout) else {
                return Err(RetryFailure::Deadline { calls });
            };
            if calls > 0 && !permit() {
                return Err(RetryFailure::Exhausted {
                    last_error: ProviderError::rate_limited(key),
                    calls,
                });
            }

            calls += 1;
            let error = match run_with_timeout(budget, operation()).await {
                TimedResult::Ok(value) => return Ok((value, calls)),
                TimedResult::Err(error) => error,
                TimedResult::Timeout if deadline.is_expired() => {
                    return Err(RetryFailure::Deadline { calls });
                }
                TimedResult::Timeout => ProviderError::timeout(budget),
            };

            if !error.is_transient() {
                return Err(RetryFailure::Permanent { error, calls });
            }
            if calls as usize >= max_attempts {
                return Err(RetryFailure::Exhausted {
                    last_error: error,
                    calls,
                });
            }

            let delay = backoff.next_delay(&self.config);
            let Some(left) = deadline.remaining() else {
                return Err(RetryFailure::Deadline { calls });
            };
            debug!(
                provider = key,
                attempt = calls,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying after transient error"
            );
            tokio::time::sleep(delay.min(left)).await;
        }
    }
}
