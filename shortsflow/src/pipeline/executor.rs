//! Runs a single stage: cache lookup, fallback chain, degradation.

use std::fmt;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::RunContext;
use crate::cache::CacheEntry;
use crate::capabilities::Capability;
use crate::config::StageConfig;
use crate::core::{summarize_attempts, Fingerprint, StageResult};
use crate::errors::DeadlineExceeded;
use crate::providers::{ChainOutcome, FallbackChain};

/// Executes one stage of the pipeline.
pub struct StageExecutor<C: Capability> {
    settings: StageConfig,
    chain: FallbackChain<C>,
}

impl<C: Capability> StageExecutor<C> {
    /// Creates an executor.
    pub fn new(settings: StageConfig, chain: FallbackChain<C>) -> Self {
        Self { settings, chain }
    }

    /// Stage settings.
    pub fn settings(&self) -> &StageConfig {
        &self.settings
    }

    /// The provider chain.
    pub fn chain(&self) -> &FallbackChain<C> {
        &self.chain
    }

    /// Produces the stage outcome for `request`.
    ///
    /// A fresh cache entry short-circuits the chain. Cache failures are
    /// treated as misses. An exhausted chain degrades an optional stage to its
    /// substitute artifact; otherwise the stage fails. Only the run deadline
    /// escapes as an error.
    pub async fn execute(
        &self,
        request: &C::Request,
        ctx: &RunContext,
    ) -> Result<StageResult<C::Artifact>, DeadlineExceeded> {
        let started = Instant::now();
        let stage = C::KIND;

        let fingerprint = match Fingerprint::of(stage, request) {
            Ok(fp) => Some(fp),
            Err(err) => {
                warn!(%stage, error = %err, "Request not fingerprintable, bypassing cache");
                None
            }
        };

        if let Some(fp) = &fingerprint {
            if let Some((artifact, provider)) = self.lookup(fp, ctx).await {
                info!(%stage, provider = %provider, fingerprint = fp.short(), "Cache hit");
                return Ok(StageResult::Success {
                    artifact,
                    provider_used: provider,
                    duration_ms: elapsed_ms(started),
                    cached: true,
                    attempts: Vec::new(),
                });
            }
        }

        let outcome = self
            .chain
            .resolve(request, ctx.rate_limiter(), ctx.retry(), ctx.deadline())
            .await;

        match outcome {
            ChainOutcome::Resolved {
                artifact,
                provider,
                attempts,
            } => {
                if let Some(fp) = fingerprint {
                    self.store(fp, &provider, &artifact, ctx).await;
                }
                Ok(StageResult::Success {
                    artifact,
                    provider_used: provider,
                    duration_ms: elapsed_ms(started),
                    cached: false,
                    attempts,
                })
            }
            ChainOutcome::Exhausted { attempts } => {
                let reason = summarize_attempts(&attempts);
                if !self.settings.required {
                    if let Some(artifact) = C::substitute(request) {
                        return Ok(StageResult::Degraded {
                            artifact,
                            reason,
                            attempts,
                        });
                    }
                }
                Ok(StageResult::Failed {
                    reason,
                    attempted_providers: attempts,
                })
            }
            ChainOutcome::DeadlineExceeded { attempts } => Err(DeadlineExceeded {
                stage,
                elapsed_ms: ctx.deadline().elapsed_ms(),
                attempted_providers: attempts,
            }),
        }
    }

    async fn lookup(&self, fp: &Fingerprint, ctx: &RunContext) -> Option<(C::Artifact, String)> {
        let entry = match ctx.cache().get(fp).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(err) => {
                warn!(stage = %C::KIND, error = %err, "Cache lookup failed, treating as miss");
                return None;
            }
        };
        if entry.stage != C::KIND || entry.is_expired() {
            return None;
        }
        match serde_json::from_str(&entry.payload) {
            Ok(artifact) => Some((artifact, entry.provider)),
            Err(err) => {
                warn!(stage = %C::KIND, error = %err, "Cached artifact unreadable, treating as miss");
                None
            }
        }
    }

    async fn store(&self, fp: Fingerprint, provider: &str, artifact: &C::Artifact, ctx: &RunContext) {
        let Some(ttl) = self.settings.cache_ttl() else {
            return;
        };
        let payload = match serde_json::to_string(artifact) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(stage = %C::KIND, error = %err, "Artifact not serializable, not caching");
                return;
            }
        };
        let entry = CacheEntry::new(fp, C::KIND, provider, payload, ttl);
        match ctx.cache().put(entry).await {
            Ok(()) => debug!(stage = %C::KIND, provider, "Cached provider result"),
            Err(err) => warn!(stage = %C::KIND, error = %err, "Cache store failed"),
        }
    }
}

impl<C: Capability> fmt::Debug for StageExecutor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageExecutor")
            .field("stage", &C::KIND)
            .field("settings", &self.settings)
            .field("chain", &self.chain)
            .finish()
    }
}

#[allow(clippy::cast_possible_truncation)]
fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
