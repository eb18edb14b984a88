//! Provider plumbing: rate limiting, retries, gateways and fallback chains.

mod chain;
mod gateway;
mod rate_limit;
mod retry;

pub use chain::{ChainOutcome, FallbackChain};
pub use gateway::{ProviderDescriptor, ProviderGateway};
pub use rate_limit::{RateLimitState, RateLimiter, RateQuota};
pub use retry::{Backoff, BackoffStrategy, JitterStrategy, RetryConfig, RetryFailure, RetryPolicy};
