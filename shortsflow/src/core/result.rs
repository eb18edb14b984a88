//! Stage outcome types.

use serde::{Deserialize, Serialize};

use super::StageStatus;
use crate::errors::{ErrorKind, ProviderError};

/// What happened when the fallback chain reached a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    /// The provider produced an accepted artifact.
    Succeeded,
    /// The rate limiter denied the provider; it was never called.
    RateLimited,
    /// The provider was called and did not produce an accepted artifact.
    Failed,
}

/// Diagnostic record of one provider in a fallback chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderAttempt {
    /// Provider name.
    pub provider: String,
    /// Outcome.
    pub status: AttemptStatus,
    /// Classification of the final error, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Final error message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Number of calls issued to the provider.
    pub calls: u32,
}

impl ProviderAttempt {
    /// A successful attempt.
    #[must_use]
    pub fn succeeded(provider: impl Into<String>, calls: u32) -> Self {
        Self {
            provider: provider.into(),
            status: AttemptStatus::Succeeded,
            error_kind: None,
            reason: None,
            calls,
        }
    }

    /// A provider skipped by the rate limiter.
    #[must_use]
    pub fn rate_limited(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            status: AttemptStatus::RateLimited,
            error_kind: None,
            reason: Some("rate limit exhausted".to_string()),
            calls: 0,
        }
    }

    /// A provider that failed after `calls` calls.
    #[must_use]
    pub fn failed(provider: impl Into<String>, error: &ProviderError, calls: u32) -> Self {
        Self {
            provider: provider.into(),
            status: AttemptStatus::Failed,
            error_kind: Some(error.kind()),
            reason: Some(error.message().to_string()),
            calls,
        }
    }

    /// A provider abandoned because the run deadline expired.
    #[must_use]
    pub fn deadline(provider: impl Into<String>, calls: u32) -> Self {
        Self {
            provider: provider.into(),
            status: AttemptStatus::Failed,
            error_kind: Some(ErrorKind::Deadline),
            reason: Some("run deadline exceeded".to_string()),
            calls,
        }
    }

    /// One-line summary for failure reasons.
    #[must_use]
    pub fn describe(&self) -> String {
        match (&self.status, &self.reason) {
            (AttemptStatus::Succeeded, _) => format!("{}: succeeded", self.provider),
            (_, Some(reason)) => format!("{}: {reason}", self.provider),
            (_, None) => format!("{}: failed", self.provider),
        }
    }
}

/// The typed outcome of one stage execution. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub enum StageResult<A> {
    /// A provider, or the cache, produced the artifact.
    Success {
        /// The produced artifact.
        artifact: A,
        /// The provider that produced it (for cache hits, the original producer).
        provider_used: String,
        /// Stage wall time.
        duration_ms: u64,
        /// Whether the artifact came from the result cache.
        cached: bool,
        /// Chain attempts, in order. Empty for cache hits.
        attempts: Vec<ProviderAttempt>,
    },
    /// The chain was exhausted and a substitute artifact was used.
    Degraded {
        /// The substitute artifact.
        artifact: A,
        /// Why the substitute was needed.
        reason: String,
        /// Chain attempts, in order.
        attempts: Vec<ProviderAttempt>,
    },
    /// No artifact was produced.
    Failed {
        /// Why the stage failed.
        reason: String,
        /// Chain attempts, in order.
        attempted_providers: Vec<ProviderAttempt>,
    },
}

impl<A> StageResult<A> {
    /// Returns the status recorded for this outcome.
    #[must_use]
    pub fn status(&self) -> StageStatus {
        match self {
            Self::Success { .. } => StageStatus::Success,
            Self::Degraded { .. } => StageStatus::Degraded,
            Self::Failed { .. } => StageStatus::Failed,
        }
    }

    /// Returns the artifact, if the outcome has one.
    #[must_use]
    pub fn artifact(&self) -> Option<&A> {
        match self {
            Self::Success { artifact, .. } | Self::Degraded { artifact, .. } => Some(artifact),
            Self::Failed { .. } => None,
        }
    }

    /// Returns the provider that produced the artifact.
    #[must_use]
    pub fn provider_used(&self) -> Option<&str> {
        match self {
            Self::Success { provider_used, .. } => Some(provider_used),
            _ => None,
        }
    }

    /// Returns the chain attempts in order.
    #[must_use]
    pub fn attempts(&self) -> &[ProviderAttempt] {
        match self {
            Self::Success { attempts, .. } | Self::Degraded { attempts, .. } => attempts,
            Self::Failed {
                attempted_providers,
                ..
            } => attempted_providers,
        }
    }

    /// Names of the providers the chain reached, in order.
    #[must_use]
    pub fn attempted_provider_names(&self) -> Vec<&str> {
        self.attempts().iter().map(|a| a.provider.as_str()).collect()
    }
}

/// Joins attempt summaries into a failure reason.
#[must_use]
pub fn summarize_attempts(attempts: &[ProviderAttempt]) -> String {
    if attempts.is_empty() {
        return "no providers configured".to_string();
    }
    let parts: Vec<String> = attempts.iter().map(ProviderAttempt::describe).collect();
    format!("all providers exhausted ({})", parts.join("; "))
}
