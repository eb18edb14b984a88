//! # Shortsflow
//!
//! The orchestration core of a short-form video production pipeline.
//!
//! A run walks a fixed sequence of stages (topics, script, voice, visuals,
//! assembly, metadata, publish). Each stage is served by a priority-ordered
//! chain of interchangeable providers with:
//!
//! - **Provider fallback**: the first provider whose output passes the stage's rules wins
//! - **Rate limiting**: process-wide quotas; an exhausted provider is skipped, never awaited
//! - **Retries**: exponential backoff with jitter for transient errors only
//! - **Result caching**: content-addressed by request fingerprint, best-effort
//! - **Degradation**: optional stages fall back to substitute artifacts
//!
//! Every run, successful or not, yields a sealed [`RunReport`](pipeline::RunReport).
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shortsflow::prelude::*;
//!
//! let shared = SharedState::in_memory();
//! let pipeline = PipelineBuilder::new(PipelineConfig::from_file("pipeline.json")?, shared)
//!     .topic_source(Arc::new(GoogleTrends::new()))
//!     .script_writer(Arc::new(OpenAiWriter::new(key)))
//!     .assembler(Arc::new(FfmpegAssembler::new()))
//!     .build()?;
//!
//! let report = pipeline.run(&RunInput::dry_run()).await;
//! println!("{}", report.to_json()?);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cache;
pub mod capabilities;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod providers;
pub mod runtime;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cache::{CacheEntry, FileResultCache, InMemoryResultCache, ResultCache};
    pub use crate::capabilities::{
        Capability, MetadataGeneration, Provider, Publishing, ScriptWriting, TopicDiscovery,
        VideoAssembly, VisualSearch, VoiceSynthesis,
    };
    pub use crate::config::{ContentConfig, PipelineConfig, ProviderConfig, StageConfig};
    pub use crate::core::{Fingerprint, RunStatus, StageKind, StageResult, StageStatus};
    pub use crate::errors::{CacheError, DeadlineExceeded, ErrorKind, PipelineError, ProviderError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::{Pipeline, PipelineBuilder, RunInput, RunReport, SharedState};
    pub use crate::providers::{RateQuota, RetryConfig};
}
