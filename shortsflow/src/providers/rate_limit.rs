//! Per-provider call quotas.
//!
//! Each registered provider gets a fixed window of `max_calls` per
//! `window_secs`. Acquisition never waits: a denied provider is simply
//! unavailable until its window rolls over. Counters live as long as the
//! limiter, so quotas persist across runs that share it.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// A provider's call quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateQuota {
    /// Calls allowed per window.
    pub max_calls: u32,
    /// Window length in seconds.
    pub window_secs: u64,
}

impl RateQuota {
    /// Creates a quota.
    #[must_use]
    pub const fn new(max_calls: u32, window_secs: u64) -> Self {
        Self {
            max_calls,
            window_secs,
        }
    }

    /// `max_calls` per minute.
    #[must_use]
    pub const fn per_minute(max_calls: u32) -> Self {
        Self::new(max_calls, 60)
    }

    /// The window as a duration.
    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Snapshot of a provider's limiter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitState {
    /// Calls still allowed in the current window.
    pub remaining: u32,
    /// Time until the window resets.
    pub resets_in_ms: u64,
}

#[derive(Debug)]
struct Window {
    quota: RateQuota,
    started: Instant,
    used: u32,
}

impl Window {
    fn new(quota: RateQuota) -> Self {
        Self {
            quota,
            started: Instant::now(),
            used: 0,
        }
    }

    fn roll(&mut self, now: Instant) {
        if now.duration_since(self.started) >= self.quota.window() {
            self.started = now;
            self.used = 0;
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn state(&self, now: Instant) -> RateLimitState {
        let reset_at = self.started + self.quota.window();
        RateLimitState {
            remaining: self.quota.max_calls.saturating_sub(self.used),
            resets_in_ms: reset_at.saturating_duration_since(now).as_millis() as u64,
        }
    }
}

/// Process-wide call gate keyed by provider name.
///
/// Providers without a registered quota are unlimited.
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: DashMap<String, Window>,
}

impl RateLimiter {
    /// Creates an empty limiter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a quota. Re-registering an existing provider keeps its
    /// counters and quota; returns false in that case.
    pub fn register(&self, provider: &str, quota: RateQuota) -> bool {
        let mut inserted = false;
        self.windows.entry(provider.to_string()).or_insert_with(|| {
            inserted = true;
            Window::new(quota)
        });
        if inserted {
            debug!(
                provider,
                max_calls = quota.max_calls,
                window_secs = quota.window_secs,
                "Registered rate quota"
            );
        }
        inserted
    }

    /// Takes one call token if available. Never waits.
    pub fn try_acquire(&self, provider: &str) -> bool {
        let Some(mut window) = self.windows.get_mut(provider) else {
            return true;
        };
        window.roll(Instant::now());
        if window.used < window.quota.max_calls {
            window.used += 1;
            true
        } else {
            false
        }
    }

    /// Current state, or `None` for unlimited providers.
    pub fn state(&self, provider: &str) -> Option<RateLimitState> {
        let mut window = self.windows.get_mut(provider)?;
        let now = Instant::now();
        window.roll(now);
        Some(window.state(now))
    }

    /// Returns true if the provider has a registered quota.
    pub fn is_registered(&self, provider: &str) -> bool {
        self.windows.contains_key(provider)
    }
}
