//! Run lifecycle events.
//!
//! The orchestrator reports stage and provider transitions to an
//! [`EventSink`] supplied by the caller, in addition to its `tracing` output.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// A run began.
pub const PIPELINE_STARTED: &str = "pipeline.started";
/// A run ended; carries the overall status.
pub const PIPELINE_FINISHED: &str = "pipeline.finished";
/// A stage was entered.
pub const STAGE_STARTED: &str = "stage.started";
/// A stage produced an artifact from a provider or the cache.
pub const STAGE_COMPLETED: &str = "stage.completed";
/// A stage fell back to a substitute artifact.
pub const STAGE_DEGRADED: &str = "stage.degraded";
/// A stage produced nothing.
pub const STAGE_FAILED: &str = "stage.failed";
/// The rate limiter kept a provider out of a chain.
pub const PROVIDER_SKIPPED: &str = "provider.skipped";
