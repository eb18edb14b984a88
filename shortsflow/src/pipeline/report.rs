//! Run report: the persisted record of one pipeline execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::capabilities::Capability;
use crate::core::{ProviderAttempt, RunStatus, StageKind, StageResult, StageStatus};
use crate::errors::{ErrorKind, PipelineError};

/// Outcome of one executed stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    /// Stage name.
    pub name: StageKind,
    /// Stage outcome.
    pub status: StageStatus,
    /// Provider that produced the artifact. Absent for degraded and failed stages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_used: Option<String>,
    /// When the stage was entered.
    pub started_at: DateTime<Utc>,
    /// Stage wall time.
    pub duration_ms: u64,
    /// Whether the artifact came from the result cache.
    #[serde(default)]
    pub cached: bool,
    /// Reference to the produced artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_ref: Option<String>,
    /// Why the stage failed or degraded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Stage-level failure class: `exhausted` for a spent chain, `deadline`
    /// for a stage cut off by the run budget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Providers reached by the fallback chain, in order.
    #[serde(default)]
    pub attempts: Vec<ProviderAttempt>,
}

impl StageRecord {
    /// Builds the record for a stage outcome.
    pub fn from_result<C: Capability>(
        result: &StageResult<C::Artifact>,
        started_at: DateTime<Utc>,
        duration_ms: u64,
    ) -> Self {
        let (provider_used, cached, failure_reason, error_kind) = match result {
            StageResult::Success {
                provider_used,
                cached,
                ..
            } => (Some(provider_used.clone()), *cached, None, None),
            StageResult::Degraded { reason, .. } | StageResult::Failed { reason, .. } => {
                (None, false, Some(reason.clone()), Some(ErrorKind::Exhausted))
            }
        };
        Self {
            name: C::KIND,
            status: result.status(),
            provider_used,
            started_at,
            duration_ms,
            cached,
            artifact_ref: result.artifact().map(C::reference),
            failure_reason,
            error_kind,
            attempts: result.attempts().to_vec(),
        }
    }

    /// Record for a stage cut off by the run deadline. Nothing it produced
    /// counts as committed.
    pub fn deadline(
        name: StageKind,
        started_at: DateTime<Utc>,
        duration_ms: u64,
        attempts: Vec<ProviderAttempt>,
    ) -> Self {
        Self {
            name,
            status: StageStatus::Failed,
            provider_used: None,
            started_at,
            duration_ms,
            cached: false,
            artifact_ref: None,
            failure_reason: Some("run deadline exceeded".to_string()),
            error_kind: Some(ErrorKind::Deadline),
            attempts,
        }
    }
}

/// Accumulates stage records while a run is in progress.
#[derive(Debug)]
pub struct RunReportBuilder {
    run_id: Uuid,
    plan: Vec<StageKind>,
    dry_run: bool,
    started_at: DateTime<Utc>,
    stages: Vec<StageRecord>,
}

impl RunReportBuilder {
    /// Starts a report for the planned stage sequence.
    pub fn new(run_id: Uuid, plan: Vec<StageKind>, dry_run: bool) -> Self {
        Self {
            run_id,
            plan,
            dry_run,
            started_at: Utc::now(),
            stages: Vec::with_capacity(StageKind::ALL.len()),
        }
    }

    /// The run identifier.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Stages planned for this run, in order.
    pub fn plan(&self) -> &[StageKind] {
        &self.plan
    }

    /// Appends a stage record.
    pub fn record(&mut self, record: StageRecord) {
        self.stages.push(record);
    }

    /// Number of records so far.
    pub fn recorded(&self) -> usize {
        self.stages.len()
    }

    /// Seals a run that completed every planned stage.
    pub fn finish(self) -> RunReport {
        self.seal(RunStatus::Finished, None)
    }

    /// Seals a run stopped by a failed required stage.
    pub fn abort(self, reason: impl Into<String>) -> RunReport {
        self.seal(RunStatus::Aborted, Some(reason.into()))
    }

    /// Seals a run stopped by the run deadline.
    pub fn deadline_exceeded(self, reason: impl Into<String>) -> RunReport {
        self.seal(RunStatus::DeadlineExceeded, Some(reason.into()))
    }

    fn seal(self, status: RunStatus, failure_reason: Option<String>) -> RunReport {
        let skipped = self
            .plan
            .iter()
            .copied()
            .filter(|kind| !self.stages.iter().any(|r| r.name == *kind))
            .collect();
        RunReport {
            run_id: self.run_id,
            status,
            dry_run: self.dry_run,
            started_at: self.started_at,
            ended_at: Utc::now(),
            stages: self.stages,
            skipped,
            failure_reason,
        }
    }
}

/// The sealed record of one run. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    run_id: Uuid,
    status: RunStatus,
    #[serde(default)]
    dry_run: bool,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    stages: Vec<StageRecord>,
    #[serde(default)]
    skipped: Vec<StageKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    failure_reason: Option<String>,
}

impl RunReport {
    /// Run identifier.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Overall status.
    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Whether publishing was left out of the plan.
    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Run start time.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Run end time.
    pub fn ended_at(&self) -> DateTime<Utc> {
        self.ended_at
    }

    /// Executed stages in execution order.
    pub fn stages(&self) -> &[StageRecord] {
        &self.stages
    }

    /// Record for one stage, if it executed.
    pub fn stage(&self, kind: StageKind) -> Option<&StageRecord> {
        self.stages.iter().find(|r| r.name == kind)
    }

    /// Planned stages that never executed.
    pub fn skipped(&self) -> &[StageKind] {
        &self.skipped
    }

    /// Why the run did not finish.
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Artifact reference of one stage.
    pub fn artifact_ref(&self, kind: StageKind) -> Option<&str> {
        self.stage(kind).and_then(|r| r.artifact_ref.as_deref())
    }

    /// Serializes the report as pretty JSON.
    pub fn to_json(&self) -> Result<String, PipelineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a report produced by [`RunReport::to_json`].
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        Ok(serde_json::from_str(json)?)
    }

    /// File name used by [`RunReport::write_to_dir`].
    pub fn file_name(&self) -> String {
        format!("run_report_{}.json", self.run_id)
    }

    /// Writes the report into `dir`, creating it if needed. Returns the path written.
    pub async fn write_to_dir(&self, dir: impl AsRef<Path>) -> Result<PathBuf, PipelineError> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(self.file_name());
        tokio::fs::write(&path, self.to_json()?).await?;
        Ok(path)
    }
}
