//! Canned requests, artifacts and a healthy provider set.

use std::sync::Arc;

use crate::capabilities::{
    ContentType, MetadataGeneration, PublishReceipt, PublishStatus, Publishing, Script,
    ScriptRequest, ScriptWriting, SelectedTopic, TopicDiscovery, TopicList, TrendingTopic,
    VideoAssembly, VideoFile, VideoMetadata, VisualAsset, VisualSearch, VisualSet,
    VoiceRequest, VoiceSynthesis, Voiceover,
};
use crate::pipeline::PipelineBuilder;

use super::ScriptedProvider;

/// A topic that passes the default filter.
#[must_use]
pub fn selected_topic() -> SelectedTopic {
    SelectedTopic {
        title: "Why Honey Never Spoils In Ancient Tombs".to_string(),
        description: "Archaeologists keep finding edible honey".to_string(),
        content_type: ContentType::Educational,
        keywords: vec!["honey".to_string(), "spoils".to_string(), "ancient".to_string()],
    }
}

/// Default script request: 20 to 75 words, at most 60 seconds.
#[must_use]
pub fn script_request() -> ScriptRequest {
    ScriptRequest {
        topic: selected_topic(),
        style: "informative".to_string(),
        min_words: 20,
        max_words: 75,
        max_duration_secs: 60,
    }
}

/// A script that satisfies [`script_request`].
#[must_use]
pub fn script() -> Script {
    Script {
        hook: "Did you know honey can outlast empires?".to_string(),
        body: "Sealed jars found in Egyptian tombs were still edible after three thousand \
               years. Low moisture and natural acidity keep bacteria from ever growing."
            .to_string(),
        call_to_action: "Follow for more food history!".to_string(),
    }
}

/// Voice request for [`script`].
#[must_use]
pub fn voice_request() -> VoiceRequest {
    VoiceRequest {
        text: script().full_text(),
        voice_id: "default".to_string(),
        language: "en".to_string(),
    }
}

/// Trending topics with one clear winner.
#[must_use]
pub fn topic_list() -> TopicList {
    TopicList {
        topics: vec![
            TrendingTopic::new("Why Honey Never Spoils In Ancient Tombs", "google_trends", 92.0)
                .with_description("Archaeologists keep finding edible honey"),
            TrendingTopic::new("Octopus Dreams Change Their Skin Color", "reddit", 71.0),
        ],
    }
}

/// A synthesized voiceover.
#[must_use]
pub fn voiceover() -> Voiceover {
    Voiceover {
        uri: "file:///tmp/shortsflow/voice.mp3".to_string(),
        duration_ms: 14_000,
        format: "mp3".to_string(),
    }
}

/// Two portrait stock clips.
#[must_use]
pub fn visual_set() -> VisualSet {
    VisualSet {
        assets: vec![
            VisualAsset {
                uri: "https://stock.example/honey.mp4".to_string(),
                source: "stock".to_string(),
                width: 720,
                height: 1280,
            },
            VisualAsset {
                uri: "https://stock.example/tomb.mp4".to_string(),
                source: "stock".to_string(),
                width: 720,
                height: 1280,
            },
        ],
    }
}

/// A rendered video at the default resolution.
#[must_use]
pub fn video_file() -> VideoFile {
    VideoFile {
        uri: "file:///tmp/shortsflow/short.mp4".to_string(),
        duration_ms: 14_000,
        width: 720,
        height: 1280,
    }
}

/// Valid upload metadata.
#[must_use]
pub fn video_metadata() -> VideoMetadata {
    VideoMetadata {
        title: "Why Honey Never Spoils".to_string(),
        description: "Edible honey from ancient tombs.\n\n#shorts #honey".to_string(),
        tags: vec!["honey".to_string(), "history".to_string(), "shorts".to_string()],
        category: ContentType::Educational.category_id().to_string(),
        privacy: "public".to_string(),
    }
}

/// A successful upload.
#[must_use]
pub fn publish_receipt() -> PublishReceipt {
    PublishReceipt {
        status: PublishStatus::Published,
        video_id: Some("abc123XYZ".to_string()),
        url: Some("https://youtube.com/shorts/abc123XYZ".to_string()),
    }
}

/// One scripted provider per stage, each answering with its fixture.
#[derive(Debug, Clone)]
pub struct FixtureProviders {
    /// Topic discovery.
    pub topics: Arc<ScriptedProvider<TopicDiscovery>>,
    /// Script writing.
    pub script: Arc<ScriptedProvider<ScriptWriting>>,
    /// Voice synthesis.
    pub voice: Arc<ScriptedProvider<VoiceSynthesis>>,
    /// Visual search.
    pub visuals: Arc<ScriptedProvider<VisualSearch>>,
    /// Video assembly.
    pub assembler: Arc<ScriptedProvider<VideoAssembly>>,
    /// Metadata generation.
    pub metadata: Arc<ScriptedProvider<MetadataGeneration>>,
    /// Publishing.
    pub publisher: Arc<ScriptedProvider<Publishing>>,
}

impl FixtureProviders {
    /// Providers that all succeed on the first call.
    #[must_use]
    pub fn healthy() -> Self {
        Self {
            topics: Arc::new(ScriptedProvider::always_ok("trends", topic_list())),
            script: Arc::new(ScriptedProvider::always_ok("llm", script())),
            voice: Arc::new(ScriptedProvider::always_ok("tts", voiceover())),
            visuals: Arc::new(ScriptedProvider::always_ok("stock", visual_set())),
            assembler: Arc::new(ScriptedProvider::always_ok("renderer", video_file())),
            metadata: Arc::new(ScriptedProvider::always_ok("meta-llm", video_metadata())),
            publisher: Arc::new(ScriptedProvider::always_ok("uploader", publish_receipt())),
        }
    }

    /// Registers every provider with `builder`.
    #[must_use]
    pub fn install(&self, builder: PipelineBuilder) -> PipelineBuilder {
        builder
            .topic_source(self.topics.clone())
            .script_writer(self.script.clone())
            .voice_synthesizer(self.voice.clone())
            .visual_source(self.visuals.clone())
            .assembler(self.assembler.clone())
            .metadata_generator(self.metadata.clone())
            .publisher(self.publisher.clone())
    }

    /// Total calls across all providers.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.topics.calls()
            + self.script.calls()
            + self.voice.calls()
            + self.visuals.calls()
            + self.assembler.calls()
            + self.metadata.calls()
            + self.publisher.calls()
    }
}
