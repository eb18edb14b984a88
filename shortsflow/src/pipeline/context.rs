//! Process-scoped shared state and per-run context.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::cache::{InMemoryResultCache, ResultCache};
use crate::config::PipelineConfig;
use crate::events::{EventSink, NoOpEventSink};
use crate::providers::{RateLimiter, RetryPolicy};
use crate::runtime::RunDeadline;

/// State shared by every run in the process.
///
/// Created once at startup and handed to each pipeline. Rate-limit counters
/// and cache entries outlive individual runs.
#[derive(Clone)]
pub struct SharedState {
    /// Per-provider quotas.
    pub rate_limiter: Arc<RateLimiter>,
    /// Provider result cache.
    pub cache: Arc<dyn ResultCache>,
}

impl SharedState {
    /// Shared state over the given cache.
    pub fn new(cache: Arc<dyn ResultCache>) -> Self {
        Self {
            rate_limiter: Arc::new(RateLimiter::new()),
            cache,
        }
    }

    /// Shared state with an in-memory cache.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryResultCache::new()))
    }

    /// Registers every configured quota. Already-registered providers keep
    /// their counters.
    pub fn register_quotas(&self, config: &PipelineConfig) {
        for (name, provider) in &config.providers {
            if let Some(quota) = provider.rate_limit {
                self.rate_limiter.register(name, quota);
            }
        }
    }
}

impl fmt::Debug for SharedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedState")
            .field("rate_limiter", &self.rate_limiter)
            .finish_non_exhaustive()
    }
}

/// Caller-supplied input for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunInput {
    /// Overrides the configured script style.
    #[serde(default)]
    pub style: Option<String>,
    /// Whether to run the publish stage. `false` is a dry run.
    #[serde(default = "default_publish")]
    pub publish: bool,
}

fn default_publish() -> bool {
    true
}

impl Default for RunInput {
    fn default() -> Self {
        Self {
            style: None,
            publish: default_publish(),
        }
    }
}

impl RunInput {
    /// A run that stops before publishing.
    #[must_use]
    pub fn dry_run() -> Self {
        Self {
            style: None,
            publish: false,
        }
    }

    /// Sets the script style.
    #[must_use]
    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }
}

/// Everything a stage needs from its run.
#[derive(Clone)]
pub struct RunContext {
    run_id: Uuid,
    deadline: RunDeadline,
    shared: SharedState,
    retry: RetryPolicy,
    events: Arc<dyn EventSink>,
}

impl RunContext {
    /// Creates a context whose deadline starts now.
    pub fn new(
        run_id: Uuid,
        deadline: RunDeadline,
        shared: SharedState,
        retry: RetryPolicy,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            run_id,
            deadline,
            shared,
            retry,
            events,
        }
    }

    /// A context with no event sink, for driving executors directly.
    pub fn detached(deadline: RunDeadline, shared: SharedState, retry: RetryPolicy) -> Self {
        Self::new(Uuid::new_v4(), deadline, shared, retry, Arc::new(NoOpEventSink))
    }

    /// Run identifier.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Run time budget.
    pub fn deadline(&self) -> &RunDeadline {
        &self.deadline
    }

    /// Rate limiter.
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.shared.rate_limiter
    }

    /// Result cache.
    pub fn cache(&self) -> &dyn ResultCache {
        self.shared.cache.as_ref()
    }

    /// Retry policy.
    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Event sink.
    pub fn events(&self) -> &dyn EventSink {
        self.events.as_ref()
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("run_id", &self.run_id)
            .field("deadline", &self.deadline)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
