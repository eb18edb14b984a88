//! Capability-typed wrapper around a single provider.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use super::{RateLimitState, RateLimiter};
use crate::capabilities::{Capability, Provider};
use crate::core::StageKind;
use crate::errors::ProviderError;

/// What a chain knows about one of its providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// The stage the provider serves.
    pub capability: StageKind,
    /// Provider name.
    pub name: String,
    /// Rank within the chain; lower runs first.
    pub priority: u32,
    /// Limiter state, `None` when the provider has no quota.
    pub rate_limit: Option<RateLimitState>,
}

/// A provider plus its static priority. Output shape is checked on every call.
pub struct ProviderGateway<C: Capability> {
    provider: Arc<dyn Provider<C>>,
    priority: u32,
}

impl<C: Capability> ProviderGateway<C> {
    /// Wraps a provider.
    pub fn new(provider: Arc<dyn Provider<C>>, priority: u32) -> Self {
        Self { provider, priority }
    }

    /// Provider name.
    pub fn name(&self) -> &str {
        self.provider.name()
    }

    /// Static priority.
    pub fn priority(&self) -> u32 {
        self.priority
    }

    /// Calls the provider once. A malformed artifact is a permanent error.
    pub async fn invoke(&self, request: &C::Request) -> Result<C::Artifact, ProviderError> {
        let artifact = self.provider.invoke(request).await?;
        if let Err(reason) = C::validate_shape(&artifact) {
            warn!(
                provider = self.name(),
                stage = %C::KIND,
                reason = %reason,
                "Provider returned malformed output"
            );
            return Err(ProviderError::permanent(format!(
                "malformed {} output: {reason}",
                C::KIND
            )));
        }
        Ok(artifact)
    }

    /// Snapshot for diagnostics.
    pub fn descriptor(&self, limiter: &RateLimiter) -> ProviderDescriptor {
        ProviderDescriptor {
            capability: C::KIND,
            name: self.name().to_string(),
            priority: self.priority,
            rate_limit: limiter.state(self.name()),
        }
    }
}

impl<C: Capability> Clone for ProviderGateway<C> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            priority: self.priority,
        }
    }
}

impl<C: Capability> fmt::Debug for ProviderGateway<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderGateway")
            .field("capability", &C::KIND)
            .field("provider", &self.name())
            .field("priority", &self.priority)
            .finish()
    }
}
