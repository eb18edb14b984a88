//! Testing utilities for shortsflow pipelines.
//!
//! This module provides:
//! - Scripted providers with call counting
//! - Fixture requests, artifacts and a healthy provider set

pub mod fixtures;
mod mocks;

pub use fixtures::FixtureProviders;
pub use mocks::ScriptedProvider;
