//! Capability interfaces for the pipeline stages.
//!
//! Each stage is served by exactly one capability. A capability fixes the
//! typed request and artifact for the stage and the rules an artifact must
//! satisfy; concrete integrations implement [`Provider`] for it and are
//! interchangeable inside that stage's fallback chain.

mod assembly;
mod metadata;
mod publish;
mod script;
mod topics;
mod visuals;
mod voice;

pub use assembly::{AssemblyRequest, Resolution, VideoAssembly, VideoFile};
pub use metadata::{MetadataGeneration, MetadataRequest, VideoMetadata};
pub use publish::{PublishReceipt, PublishRequest, PublishStatus, Publishing};
pub use script::{Script, ScriptRequest, ScriptWriting, WORDS_PER_SECOND};
pub use topics::{
    extract_keywords, select_topic, ContentType, MergedTopicSource, SelectedTopic, TopicDiscovery,
    TopicFilter, TopicList, TopicsRequest, TrendingTopic,
};
pub use visuals::{VisualAsset, VisualRequest, VisualSearch, VisualSet};
pub use voice::{VoiceRequest, VoiceSynthesis, Voiceover};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

use crate::core::{content_reference, StageKind};
use crate::errors::ProviderError;

/// The contract of one pipeline stage.
pub trait Capability: Send + Sync + 'static {
    /// Input built from earlier artifacts and run configuration.
    type Request: Serialize + Debug + Send + Sync;
    /// Output handed to downstream stages.
    type Artifact: Serialize + DeserializeOwned + Clone + Debug + Send + Sync;

    /// The stage this capability serves.
    const KIND: StageKind;

    /// Whether [`Capability::substitute`] can produce a degraded artifact.
    const HAS_SUBSTITUTE: bool = false;

    /// Checks the artifact's own shape. Violations are permanent provider errors.
    fn validate_shape(artifact: &Self::Artifact) -> Result<(), String>;

    /// Stage acceptance rules, evaluated against the request.
    fn accept(_request: &Self::Request, _artifact: &Self::Artifact) -> Result<(), String> {
        Ok(())
    }

    /// Predefined artifact used when every provider failed on an optional stage.
    fn substitute(_request: &Self::Request) -> Option<Self::Artifact> {
        None
    }

    /// Reference recorded in the run report.
    fn reference(artifact: &Self::Artifact) -> String {
        content_reference(artifact).unwrap_or_else(|_| "unreferenced".to_string())
    }
}

/// A concrete external integration able to perform one capability.
#[async_trait]
pub trait Provider<C: Capability>: Send + Sync + Debug {
    /// Stable provider identity, also the rate-limit key.
    fn name(&self) -> &str;

    /// Performs the work.
    async fn invoke(&self, request: &C::Request) -> Result<C::Artifact, ProviderError>;
}

/// Returns true if the stage can fall back to a substitute artifact.
#[must_use]
pub fn has_substitute(kind: StageKind) -> bool {
    match kind {
        StageKind::Topics => TopicDiscovery::HAS_SUBSTITUTE,
        StageKind::Script => ScriptWriting::HAS_SUBSTITUTE,
        StageKind::Voice => VoiceSynthesis::HAS_SUBSTITUTE,
        StageKind::Visuals => VisualSearch::HAS_SUBSTITUTE,
        StageKind::Assemble => VideoAssembly::HAS_SUBSTITUTE,
        StageKind::Metadata => MetadataGeneration::HAS_SUBSTITUTE,
        StageKind::Publish => Publishing::HAS_SUBSTITUTE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assembly_has_no_substitute() {
        assert!(!has_substitute(StageKind::Assemble));
        assert!(has_substitute(StageKind::Voice));
        assert!(has_substitute(StageKind::Visuals));
        assert!(has_substitute(StageKind::Metadata));
    }

    #[test]
    fn test_capability_kinds() {
        assert_eq!(TopicDiscovery::KIND, StageKind::Topics);
        assert_eq!(ScriptWriting::KIND, StageKind::Script);
        assert_eq!(VoiceSynthesis::KIND, StageKind::Voice);
        assert_eq!(VisualSearch::KIND, StageKind::Visuals);
        assert_eq!(VideoAssembly::KIND, StageKind::Assemble);
        assert_eq!(MetadataGeneration::KIND, StageKind::Metadata);
        assert_eq!(Publishing::KIND, StageKind::Publish);
    }
}
