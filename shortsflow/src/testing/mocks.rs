//! Scripted providers for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::capabilities::{Capability, Provider};
use crate::errors::ProviderError;

/// A provider that replays scripted responses and counts its calls.
///
/// Queued responses are returned first, in order. Once the queue is empty
/// every call returns the fallback response.
pub struct ScriptedProvider<C: Capability> {
    name: String,
    queue: Mutex<VecDeque<Result<C::Artifact, ProviderError>>>,
    fallback: Result<C::Artifact, ProviderError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    _capability: PhantomData<fn() -> C>,
}

impl<C: Capability> ScriptedProvider<C> {
    fn with_fallback(name: impl Into<String>, fallback: Result<C::Artifact, ProviderError>) -> Self {
        Self {
            name: name.into(),
            queue: Mutex::new(VecDeque::new()),
            fallback,
            delay: None,
            calls: AtomicUsize::new(0),
            _capability: PhantomData,
        }
    }

    /// A provider that always returns `artifact`.
    #[must_use]
    pub fn always_ok(name: impl Into<String>, artifact: C::Artifact) -> Self {
        Self::with_fallback(name, Ok(artifact))
    }

    /// A provider that always fails with `error`.
    #[must_use]
    pub fn always_err(name: impl Into<String>, error: ProviderError) -> Self {
        Self::with_fallback(name, Err(error))
    }

    /// Queues a response ahead of the fallback.
    #[must_use]
    pub fn then(self, response: Result<C::Artifact, ProviderError>) -> Self {
        self.queue.lock().push_back(response);
        self
    }

    /// Sleeps before every response.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of times the provider was invoked.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<C: Capability> fmt::Debug for ScriptedProvider<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedProvider")
            .field("name", &self.name)
            .field("stage", &C::KIND)
            .field("calls", &self.calls())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<C: Capability> Provider<C> for ScriptedProvider<C> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, _request: &C::Request) -> Result<C::Artifact, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let queued = self.queue.lock().pop_front();
        queued.unwrap_or_else(|| self.fallback.clone())
    }
}
