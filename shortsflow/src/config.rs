//! Pipeline configuration.
//!
//! Everything is optional in the serialized form; omitted fields take the
//! defaults below. Call [`PipelineConfig::validate`] (the pipeline builder
//! does) before running.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capabilities::{has_substitute, Resolution, TopicFilter};
use crate::core::StageKind;
use crate::errors::PipelineError;
use crate::providers::{RateQuota, RetryConfig};

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Per-stage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageConfig {
    /// Whether a failure aborts the run.
    #[serde(default = "default_required")]
    pub required: bool,
    /// Cache lifetime for results. `None` disables caching for the stage.
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,
    /// Bound on concurrent sub-requests within the stage.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_required() -> bool {
    true
}

fn default_concurrency() -> usize {
    4
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            required: default_required(),
            cache_ttl_secs: None,
            concurrency: default_concurrency(),
        }
    }
}

impl StageConfig {
    /// Built-in settings for a stage.
    #[must_use]
    pub fn defaults_for(stage: StageKind) -> Self {
        let (required, ttl) = match stage {
            StageKind::Topics => (true, 15 * MINUTE),
            StageKind::Script => (true, DAY),
            StageKind::Voice | StageKind::Visuals => (false, 7 * DAY),
            StageKind::Assemble => (true, 7 * DAY),
            StageKind::Metadata => (false, DAY),
            StageKind::Publish => (true, 30 * DAY),
        };
        Self {
            required,
            cache_ttl_secs: Some(ttl),
            concurrency: default_concurrency(),
        }
    }

    /// Marks the stage required or optional.
    #[must_use]
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Sets the cache lifetime.
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.cache_ttl_secs = ttl.map(|t| t.as_secs());
        self
    }

    /// Cache lifetime as a duration.
    #[must_use]
    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_secs.map(Duration::from_secs)
    }
}

/// Serialized stage settings. Omitted fields keep the stage's built-in value;
/// an explicit `"cache_ttl_secs": null` disables caching.
#[derive(Debug, Deserialize)]
struct StageOverride {
    #[serde(default)]
    required: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    cache_ttl_secs: Option<Option<u64>>,
    #[serde(default)]
    concurrency: Option<usize>,
}

impl StageOverride {
    fn apply(self, stage: StageKind) -> StageConfig {
        let mut config = StageConfig::defaults_for(stage);
        if let Some(required) = self.required {
            config.required = required;
        }
        if let Some(ttl) = self.cache_ttl_secs {
            config.cache_ttl_secs = ttl;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        config
    }
}

/// Distinguishes a present field (even `null`) from an absent one.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

fn stage_overrides<'de, D>(deserializer: D) -> Result<HashMap<StageKind, StageConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = HashMap::<StageKind, StageOverride>::deserialize(deserializer)?;
    Ok(overrides
        .into_iter()
        .map(|(stage, partial)| (stage, partial.apply(stage)))
        .collect())
}

/// Per-provider settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Rank in its chain; lower runs first.
    #[serde(default = "default_priority")]
    pub priority: u32,
    /// Call quota. `None` means unlimited.
    #[serde(default)]
    pub rate_limit: Option<RateQuota>,
}

fn default_priority() -> u32 {
    100
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            priority: default_priority(),
            rate_limit: None,
        }
    }
}

impl ProviderConfig {
    /// A provider at the given priority with no quota.
    #[must_use]
    pub fn with_priority(priority: u32) -> Self {
        Self {
            priority,
            rate_limit: None,
        }
    }

    /// Sets the quota.
    #[must_use]
    pub fn with_rate_limit(mut self, quota: RateQuota) -> Self {
        self.rate_limit = Some(quota);
        self
    }
}

/// What the produced video should look like.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Region queried for trends.
    pub region: String,
    /// Topics requested from discovery.
    pub topic_limit: usize,
    /// Topic content rules.
    pub filter: TopicFilter,
    /// Evergreen titles used when discovery fails.
    pub fallback_topics: Vec<String>,
    /// Script style hint.
    pub style: String,
    /// Minimum script words.
    pub min_script_words: usize,
    /// Maximum script words.
    pub max_script_words: usize,
    /// Maximum narration time.
    pub video_duration_secs: u64,
    /// Voice identifier.
    pub voice_id: String,
    /// Language code.
    pub language: String,
    /// Output geometry.
    pub resolution: Resolution,
    /// Visual assets requested.
    pub visual_count: usize,
    /// Upload privacy.
    pub privacy: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            region: "united_states".to_string(),
            topic_limit: 10,
            filter: TopicFilter::default(),
            fallback_topics: vec![
                "Surprising Facts About Octopus Intelligence".to_string(),
                "How Black Holes Bend Light".to_string(),
                "Why Honey Never Spoils".to_string(),
            ],
            style: "informative".to_string(),
            min_script_words: 20,
            max_script_words: 75,
            video_duration_secs: 60,
            voice_id: "default".to_string(),
            language: "en".to_string(),
            resolution: Resolution::default(),
            visual_count: 5,
            privacy: "public".to_string(),
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Time budget for a whole run.
    #[serde(default = "default_run_deadline_ms")]
    pub run_deadline_ms: u64,
    /// Cap on any single provider call.
    #[serde(default)]
    pub provider_timeout_ms: Option<u64>,
    /// Per-provider retry behaviour.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Stage overrides, merged field by field over [`StageConfig::defaults_for`].
    #[serde(default, deserialize_with = "stage_overrides")]
    pub stages: HashMap<StageKind, StageConfig>,
    /// Provider priorities and quotas, keyed by provider name.
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    /// Content settings.
    #[serde(default)]
    pub content: ContentConfig,
    /// Where sealed run reports are written, if anywhere.
    #[serde(default)]
    pub report_dir: Option<PathBuf>,
}

fn default_run_deadline_ms() -> u64 {
    15 * MINUTE * 1000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            run_deadline_ms: default_run_deadline_ms(),
            provider_timeout_ms: None,
            retry: RetryConfig::default(),
            stages: HashMap::new(),
            providers: HashMap::new(),
            content: ContentConfig::default(),
            report_dir: None,
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses JSON.
    pub fn from_json_str(json: &str) -> Result<Self, PipelineError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Sets the run deadline.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn with_run_deadline(mut self, deadline: Duration) -> Self {
        self.run_deadline_ms = deadline.as_millis() as u64;
        self
    }

    /// Sets the per-call timeout.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Sets the retry behaviour.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Overrides a stage's settings.
    #[must_use]
    pub fn with_stage(mut self, stage: StageKind, config: StageConfig) -> Self {
        self.stages.insert(stage, config);
        self
    }

    /// Sets a provider's priority and quota.
    #[must_use]
    pub fn with_provider(mut self, name: impl Into<String>, config: ProviderConfig) -> Self {
        self.providers.insert(name.into(), config);
        self
    }

    /// Sets the report directory.
    #[must_use]
    pub fn with_report_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.report_dir = Some(dir.into());
        self
    }

    /// Effective settings for a stage.
    #[must_use]
    pub fn stage(&self, stage: StageKind) -> StageConfig {
        self.stages
            .get(&stage)
            .cloned()
            .unwrap_or_else(|| StageConfig::defaults_for(stage))
    }

    /// Effective settings for a provider.
    #[must_use]
    pub fn provider(&self, name: &str) -> ProviderConfig {
        self.providers.get(name).copied().unwrap_or_default()
    }

    /// The run deadline.
    #[must_use]
    pub fn run_deadline(&self) -> Duration {
        Duration::from_millis(self.run_deadline_ms)
    }

    /// The per-call timeout.
    #[must_use]
    pub fn provider_timeout(&self) -> Option<Duration> {
        self.provider_timeout_ms.map(Duration::from_millis)
    }

    /// Rejects settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.run_deadline_ms == 0 {
            return Err(PipelineError::config("run_deadline_ms must be positive"));
        }
        if self.provider_timeout_ms == Some(0) {
            return Err(PipelineError::config("provider_timeout_ms must be positive"));
        }
        if self.retry.max_attempts == 0 {
            return Err(PipelineError::config(
                "retry.max_attempts must count at least the first call",
            ));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(PipelineError::config(
                "retry.base_delay_ms exceeds retry.max_delay_ms",
            ));
        }

        for stage in StageKind::ALL {
            let settings = self.stage(stage);
            if settings.concurrency == 0 {
                return Err(PipelineError::config(format!(
                    "stage '{stage}' concurrency must be positive"
                )));
            }
            if !settings.required && !has_substitute(stage) {
                return Err(PipelineError::config(format!(
                    "stage '{stage}' has no degraded substitute and must be required"
                )));
            }
        }
        if !self.stage(StageKind::Topics).required && self.content.fallback_topics.is_empty() {
            return Err(PipelineError::config(
                "optional topics stage needs at least one fallback topic",
            ));
        }

        for (name, provider) in &self.providers {
            if let Some(quota) = provider.rate_limit {
                if quota.max_calls == 0 || quota.window_secs == 0 {
                    return Err(PipelineError::config(format!(
                        "provider '{name}' rate limit must allow calls in a non-empty window"
                    )));
                }
            }
        }

        let content = &self.content;
        if content.min_script_words > content.max_script_words {
            return Err(PipelineError::config(
                "content.min_script_words exceeds content.max_script_words",
            ));
        }
        if content.resolution.width == 0 || content.resolution.height == 0 {
            return Err(PipelineError::config("content.resolution must be non-empty"));
        }
        if content.topic_limit == 0 {
            return Err(PipelineError::config("content.topic_limit must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.run_deadline(), Duration::from_secs(900));
    }

    #[test]
    fn test_stage_defaults() {
        let config = PipelineConfig::default();
        assert!(config.stage(StageKind::Topics).required);
        assert!(!config.stage(StageKind::Voice).required);
        assert!(!config.stage(StageKind::Metadata).required);
        assert_eq!(
            config.stage(StageKind::Topics).cache_ttl(),
            Some(Duration::from_secs(900))
        );
        assert_eq!(
            config.stage(StageKind::Publish).cache_ttl(),
            Some(Duration::from_secs(30 * 86_400))
        );
    }

    #[test]
    fn test_from_json() {
        let config = PipelineConfig::from_json_str(
            r#"{
                "run_deadline_ms": 120000,
                "retry": {"max_attempts": 2, "base_delay_ms": 50, "backoff_strategy": "linear"},
                "stages": {"visuals": {"required": true, "cache_ttl_secs": 3600}},
                "providers": {
                    "openai": {"priority": 1, "rate_limit": {"max_calls": 20, "window_secs": 60}},
                    "anthropic": {"priority": 2}
                },
                "content": {"language": "es"}
            }"#,
        )
        .unwrap();

        assert_eq!(config.run_deadline(), Duration::from_secs(120));
        assert_eq!(config.retry.max_attempts, 2);
        assert!(config.stage(StageKind::Visuals).required);
        assert_eq!(config.provider("openai").rate_limit, Some(RateQuota::per_minute(20)));
        assert_eq!(config.provider("anthropic").priority, 2);
        assert_eq!(config.provider("unknown").priority, 100);
        assert_eq!(config.content.language, "es");
        assert_eq!(config.content.max_script_words, 75);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(&path, r#"{"provider_timeout_ms": 5000}"#).unwrap();

        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.provider_timeout(), Some(Duration::from_secs(5)));
        assert!(PipelineConfig::from_file(dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_rejects_optional_assembly() {
        let config = PipelineConfig::default()
            .with_stage(StageKind::Assemble, StageConfig::default().with_required(false));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("assemble"));
    }

    #[test]
    fn test_rejects_zero_values() {
        assert!(PipelineConfig::default()
            .with_run_deadline(Duration::ZERO)
            .validate()
            .is_err());
        assert!(PipelineConfig::default()
            .with_retry(RetryConfig::new().with_max_attempts(0))
            .validate()
            .is_err());
        assert!(PipelineConfig::default()
            .with_provider(
                "tts",
                ProviderConfig::with_priority(1).with_rate_limit(RateQuota::new(0, 60))
            )
            .validate()
            .is_err());

        let mut zero_concurrency = StageConfig::defaults_for(StageKind::Topics);
        zero_concurrency.concurrency = 0;
        assert!(PipelineConfig::default()
            .with_stage(StageKind::Topics, zero_concurrency)
            .validate()
            .is_err());
    }

    #[test]
    fn test_optional_topics_needs_fallbacks() {
        let mut config = PipelineConfig::default().with_stage(
            StageKind::Topics,
            StageConfig::defaults_for(StageKind::Topics).with_required(false),
        );
        assert!(config.validate().is_ok());
        config.content.fallback_topics.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_stage_override_keeps_stage_defaults() {
        let config =
            PipelineConfig::from_json_str(r#"{"stages": {"voice": {"concurrency": 2}}}"#).unwrap();
        let voice = config.stage(StageKind::Voice);

        assert_eq!(voice.concurrency, 2);
        assert!(!voice.required);
        assert_eq!(voice.cache_ttl(), Some(Duration::from_secs(7 * 86_400)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_explicit_null_ttl_disables_cache() {
        let config = PipelineConfig::from_json_str(
            r#"{"stages": {"script": {"cache_ttl_secs": null}, "metadata": {"required": true}}}"#,
        )
        .unwrap();

        let script = config.stage(StageKind::Script);
        assert_eq!(script.cache_ttl(), None);
        assert!(script.required);

        let metadata = config.stage(StageKind::Metadata);
        assert!(metadata.required);
        assert_eq!(metadata.cache_ttl(), Some(Duration::from_secs(86_400)));
    }

    #[test]
    fn test_serialized_config_reloads_unchanged() {
        let config = PipelineConfig::default()
            .with_stage(StageKind::Voice, StageConfig::default().with_cache_ttl(None));
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(PipelineConfig::from_json_str(&json).unwrap(), config);
    }
}
