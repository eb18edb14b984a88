//! Pipeline execution.
//!
//! This module provides:
//! - Process-scoped shared state and per-run context
//! - The stage executor (cache, fallback chain, degradation)
//! - The orchestrator running the fixed stage sequence
//! - The sealed run report

mod context;
mod executor;
mod orchestrator;
mod report;

#[cfg(test)]
mod integration_tests;

pub use context::{RunContext, RunInput, SharedState};
pub use executor::StageExecutor;
pub use orchestrator::{Pipeline, PipelineBuilder};
pub use report::{RunReport, RunReportBuilder, StageRecord};
