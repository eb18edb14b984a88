//! Error types for the shortsflow pipeline core.
//!
//! Provider calls return classified [`ProviderError`] values instead of
//! unwinding, so the retry policy can branch on the classification and the
//! fallback chain can decide whether to move on to the next provider.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::core::StageKind;

/// Classification of a failure as it appears in run reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Retry-eligible: timeouts, provider throttling, 5xx-style failures.
    Transient,
    /// Not retry-eligible: bad credentials, malformed input, content rejected.
    Permanent,
    /// Every provider in a chain failed or was rate-limited.
    Exhausted,
    /// The run-wide time budget ran out.
    Deadline,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::Permanent => write!(f, "permanent"),
            Self::Exhausted => write!(f, "exhausted"),
            Self::Deadline => write!(f, "deadline"),
        }
    }
}

/// A classified error raised by a single provider invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The call may succeed if repeated.
    #[error("transient provider error: {message}")]
    Transient {
        /// What went wrong.
        message: String,
    },

    /// The call will keep failing no matter how often it is repeated.
    #[error("permanent provider error: {message}")]
    Permanent {
        /// What went wrong.
        message: String,
    },
}

impl ProviderError {
    /// Creates a transient error.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Creates a permanent error.
    #[must_use]
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent {
            message: message.into(),
        }
    }

    /// An abandoned call that ran past its time budget.
    #[must_use]
    pub fn timeout(after: Duration) -> Self {
        Self::transient(format!("call abandoned after {}ms", after.as_millis()))
    }

    /// The provider signalled (or the local limiter decided) that it is throttled.
    #[must_use]
    pub fn rate_limited(provider: &str) -> Self {
        Self::transient(format!("provider '{provider}' is rate limited"))
    }

    /// Returns true if the error is retry-eligible.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Returns the report classification.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transient { .. } => ErrorKind::Transient,
            Self::Permanent { .. } => ErrorKind::Permanent,
        }
    }

    /// Returns the bare message.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Transient { message } | Self::Permanent { message } => message,
        }
    }
}

/// The run-wide deadline expired while a stage was executing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("run deadline exceeded during stage '{stage}' after {elapsed_ms}ms")]
pub struct DeadlineExceeded {
    /// The stage that was running.
    pub stage: StageKind,
    /// Time spent in the run so far.
    pub elapsed_ms: u64,
    /// Providers attempted by the stage before the budget ran out.
    pub attempted_providers: Vec<crate::core::ProviderAttempt>,
}

/// Failures of the result cache backend.
///
/// The stage executor never propagates these; a failing cache is a miss.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The store could not be reached.
    #[error("cache store unavailable: {0}")]
    Unavailable(String),

    /// A stored entry could not be decoded.
    #[error("corrupt cache entry {fingerprint}: {reason}")]
    Corrupt {
        /// The fingerprint of the bad entry.
        fingerprint: String,
        /// Decoder message.
        reason: String,
    },

    /// Filesystem error from a disk-backed store.
    #[error("cache IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The main error type for shortsflow operations outside a provider call.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The configuration is not usable.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The run-wide deadline expired.
    #[error("{0}")]
    Deadline(#[from] DeadlineExceeded),

    /// A cache backend failed.
    #[error("{0}")]
    Cache(#[from] CacheError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_classification() {
        assert!(ProviderError::transient("503").is_transient());
        assert!(!ProviderError::permanent("401").is_transient());
        assert_eq!(ProviderError::permanent("401").kind(), ErrorKind::Permanent);
        assert_eq!(
            ProviderError::timeout(Duration::from_millis(250)).kind(),
            ErrorKind::Transient
        );
    }

    #[test]
    fn test_provider_error_message() {
        let err = ProviderError::rate_limited("pexels");
        assert_eq!(err.message(), "provider 'pexels' is rate limited");
        assert!(err.to_string().starts_with("transient provider error"));
    }

    #[test]
    fn test_error_kind_serialize() {
        let json = serde_json::to_string(&ErrorKind::Exhausted).unwrap();
        assert_eq!(json, r#""exhausted""#);
    }

    #[test]
    fn test_deadline_display() {
        let err = DeadlineExceeded {
            stage: StageKind::Voice,
            elapsed_ms: 1200,
            attempted_providers: Vec::new(),
        };
        assert_eq!(
            err.to_string(),
            "run deadline exceeded during stage 'voice' after 1200ms"
        );
    }

    #[test]
    fn test_pipeline_error_from_cache_error() {
        let err: PipelineError = CacheError::Unavailable("redis down".into()).into();
        assert!(err.to_string().contains("redis down"));
    }
}
