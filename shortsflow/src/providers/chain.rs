//! Priority-ordered provider fallback for one capability.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{ProviderDescriptor, ProviderGateway, RateLimiter, RetryFailure, RetryPolicy};
use crate::capabilities::{Capability, Provider};
use crate::core::ProviderAttempt;
use crate::errors::ProviderError;
use crate::runtime::RunDeadline;

/// How a chain resolution ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainOutcome<A> {
    /// A provider produced an accepted artifact.
    Resolved {
        /// The artifact.
        artifact: A,
        /// Who produced it.
        provider: String,
        /// Every provider reached, in order, ending with the winner.
        attempts: Vec<ProviderAttempt>,
    },
    /// Every provider failed or was rate-limited.
    Exhausted {
        /// Every provider reached, in order.
        attempts: Vec<ProviderAttempt>,
    },
    /// The run deadline expired mid-chain.
    DeadlineExceeded {
        /// Providers reached before the budget ran out.
        attempts: Vec<ProviderAttempt>,
    },
}

/// Ordered providers for one capability.
///
/// Order is fixed when providers are added: ascending priority, ties in
/// insertion order. Resolution never reorders; it only skips providers the
/// rate limiter denies.
pub struct FallbackChain<C: Capability> {
    gateways: Vec<ProviderGateway<C>>,
}

impl<C: Capability> Default for FallbackChain<C> {
    fn default() -> Self {
        Self {
            gateways: Vec::new(),
        }
    }
}

impl<C: Capability> FallbackChain<C> {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a provider at the given priority.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn Provider<C>>, priority: u32) -> Self {
        self.push(provider, priority);
        self
    }

    /// Adds a provider at the given priority.
    pub fn push(&mut self, provider: Arc<dyn Provider<C>>, priority: u32) {
        self.gateways.push(ProviderGateway::new(provider, priority));
        self.gateways.sort_by_key(ProviderGateway::priority);
    }

    /// Number of providers.
    pub fn len(&self) -> usize {
        self.gateways.len()
    }

    /// Returns true if no provider is configured.
    pub fn is_empty(&self) -> bool {
        self.gateways.is_empty()
    }

    /// Provider names in resolution order.
    pub fn provider_names(&self) -> Vec<&str> {
        self.gateways.iter().map(ProviderGateway::name).collect()
    }

    /// Diagnostic snapshots in resolution order.
    pub fn descriptors(&self, limiter: &RateLimiter) -> Vec<ProviderDescriptor> {
        self.gateways.iter().map(|g| g.descriptor(limiter)).collect()
    }

    /// Tries each provider in order until one yields an artifact that passes
    /// the stage's acceptance rules.
    ///
    /// A rate-limited provider is skipped without being called. A rejected
    /// artifact counts as a permanent failure of that provider.
    pub async fn resolve(
        &self,
        request: &C::Request,
        limiter: &RateLimiter,
        retry: &RetryPolicy,
        deadline: &RunDeadline,
    ) -> ChainOutcome<C::Artifact> {
        let mut attempts = Vec::with_capacity(self.gateways.len());

        for gateway in &self.gateways {
            let name = gateway.name();
            if deadline.is_expired() {
                return ChainOutcome::DeadlineExceeded { attempts };
            }
            if !limiter.try_acquire(name) {
                info!(stage = %C::KIND, provider = name, "Skipping rate-limited provider");
                attempts.push(ProviderAttempt::rate_limited(name));
                continue;
            }

            debug!(stage = %C::KIND, provider = name, "Invoking provider");
            let outcome = retry
                .execute(
                    name,
                    deadline,
                    move || limiter.try_acquire(name),
                    move || async move {
                        let artifact = gateway.invoke(request).await?;
                        C::accept(request, &artifact).map_err(|reason| {
                            ProviderError::permanent(format!("rejected by {} rules: {reason}", C::KIND))
                        })?;
                        Ok::<_, ProviderError>(artifact)
                    },
                )
                .await;

            match outcome {
                Ok((artifact, calls)) => {
                    attempts.push(ProviderAttempt::succeeded(name, calls));
                    return ChainOutcome::Resolved {
                        artifact,
                        provider: name.to_string(),
                        attempts,
                    };
                }
                Err(RetryFailure::Permanent { error, calls }) => {
                    warn!(stage = %C::KIND, provider = name, calls, error = %error, "Provider failed permanently");
                    attempts.push(ProviderAttempt::failed(name, &error, calls));
                }
                Err(RetryFailure::Exhausted { last_error, calls }) => {
                    warn!(stage = %C::KIND, provider = name, calls, error = %last_error, "Provider retries exhausted");
                    attempts.push(ProviderAttempt::failed(name, &last_error, calls));
                }
                Err(RetryFailure::Deadline { calls }) => {
                    warn!(stage = %C::KIND, provider = name, calls, "Run deadline reached during provider call");
                    attempts.push(ProviderAttempt::deadline(name, calls));
                    return ChainOutcome::DeadlineExceeded { attempts };
                }
            }
        }

        ChainOutcome::Exhausted { attempts }
    }
}

impl<C: Capability> fmt::Debug for FallbackChain<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackChain")
            .field("capability", &C::KIND)
            .field("providers", &self.provider_names())
            .finish()
    }
}
