//! Stage identity and status enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of the fixed production pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Gather trending topics.
    Topics,
    /// Write the narration script.
    Script,
    /// Synthesize the voiceover.
    Voice,
    /// Collect visuals for the video.
    Visuals,
    /// Assemble voice and visuals into a video file.
    Assemble,
    /// Generate title, description and tags.
    Metadata,
    /// Upload the finished video.
    Publish,
}

impl StageKind {
    /// All stages in execution order.
    pub const ALL: [Self; 7] = [
        Self::Topics,
        Self::Script,
        Self::Voice,
        Self::Visuals,
        Self::Assemble,
        Self::Metadata,
        Self::Publish,
    ];

    /// Returns the stable lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Topics => "topics",
            Self::Script => "script",
            Self::Voice => "voice",
            Self::Visuals => "visuals",
            Self::Assemble => "assemble",
            Self::Metadata => "metadata",
            Self::Publish => "publish",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome status recorded for an executed stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// A provider (or the cache) produced an accepted artifact.
    Success,
    /// Every provider failed and a substitute artifact was used.
    Degraded,
    /// The stage produced no artifact.
    Failed,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Degraded => write!(f, "degraded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl StageStatus {
    /// Returns true if downstream stages may consume the output.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Success | Self::Degraded)
    }
}

/// Overall status of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created, no stage entered yet.
    #[default]
    Pending,
    /// A stage is executing.
    Running,
    /// Every planned stage finished with success or degraded output.
    Finished,
    /// A stage failed and downstream stages were not executed.
    Aborted,
    /// The run-wide time budget ran out.
    DeadlineExceeded,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Finished => write!(f, "finished"),
            Self::Aborted => write!(f, "aborted"),
            Self::DeadlineExceeded => write!(f, "deadline_exceeded"),
        }
    }
}

impl RunStatus {
    /// Returns true if the status is final.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Aborted | Self::DeadlineExceeded)
    }
}
