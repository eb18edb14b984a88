//! Core domain model types for shortsflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Stage identity, stage status and run status enums
//! - Typed stage outcomes and provider attempt records
//! - Request fingerprints

mod fingerprint;
mod result;
mod status;

pub use fingerprint::{content_reference, to_canonical_json, Fingerprint};
pub use result::{summarize_attempts, AttemptStatus, ProviderAttempt, StageResult};
pub use status::{RunStatus, StageKind, StageStatus};
