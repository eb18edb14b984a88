//! Topic discovery: trending topics, filtering, classification and the
//! concurrent multi-source provider.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

use super::{Capability, Provider};
use crate::core::StageKind;
use crate::errors::ProviderError;
use crate::providers::RateLimiter;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is",
    "are", "was", "were", "be", "been", "being", "have", "has", "had", "do", "does", "did", "will",
    "would", "should", "could", "can", "may", "might", "must", "this", "that", "these", "those",
];

const MAX_KEYWORDS: usize = 5;
const FALLBACK_SCORE: f64 = 50.0;

fn word_pattern() -> &'static Regex {
    static WORDS: OnceLock<Regex> = OnceLock::new();
    WORDS.get_or_init(|| Regex::new(r"\b\w+\b").expect("static word pattern"))
}

/// Extracts up to five lower-cased keywords, skipping stop words and short tokens.
#[must_use]
pub fn extract_keywords(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut keywords: Vec<String> = Vec::new();
    for word in word_pattern().find_iter(&lowered).map(|m| m.as_str()) {
        if word.chars().count() <= 2 || STOP_WORDS.contains(&word) {
            continue;
        }
        if !keywords.iter().any(|k| k == word) {
            keywords.push(word.to_string());
        }
        if keywords.len() == MAX_KEYWORDS {
            break;
        }
    }
    keywords
}

/// A single trending topic reported by a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingTopic {
    /// Headline.
    pub title: String,
    /// Short description, may be empty.
    #[serde(default)]
    pub description: String,
    /// Which source reported it.
    pub source: String,
    /// Engagement score, higher is better.
    pub score: f64,
    /// Extracted keywords.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl TrendingTopic {
    /// Creates a topic and extracts its keywords from the title.
    pub fn new(title: impl Into<String>, source: impl Into<String>, score: f64) -> Self {
        let title = title.into();
        let keywords = extract_keywords(&title);
        Self {
            title,
            description: String::new(),
            source: source.into(),
            score,
            keywords,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Artifact of the topics stage.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TopicList {
    /// Topics, best first.
    pub topics: Vec<TrendingTopic>,
}

impl TopicList {
    /// Sorts by score descending. Ties keep their relative order.
    pub fn sort_by_score(&mut self) {
        self.topics.sort_by(|a, b| b.score.total_cmp(&a.score));
    }
}

/// Content rules a topic must satisfy to be used for a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicFilter {
    /// Case-insensitive substrings that disqualify a topic.
    pub blocked_keywords: Vec<String>,
    /// Minimum title length in characters.
    pub min_title_len: usize,
    /// Maximum title length in characters.
    pub max_title_len: usize,
    /// Minimum engagement score.
    pub min_score: f64,
}

impl Default for TopicFilter {
    fn default() -> Self {
        Self {
            blocked_keywords: vec![
                "death".to_string(),
                "violence".to_string(),
                "tragedy".to_string(),
                "scandal".to_string(),
            ],
            min_title_len: 10,
            max_title_len: 100,
            min_score: 10.0,
        }
    }
}

impl TopicFilter {
    /// Returns true if the topic passes every rule.
    #[must_use]
    pub fn allows(&self, topic: &TrendingTopic) -> bool {
        let text = format!("{} {}", topic.title, topic.description).to_lowercase();
        if self
            .blocked_keywords
            .iter()
            .any(|blocked| text.contains(&blocked.to_lowercase()))
        {
            return false;
        }
        let len = topic.title.chars().count();
        len >= self.min_title_len && len <= self.max_title_len && topic.score >= self.min_score
    }
}

/// Request for the topics stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicsRequest {
    /// Region to query.
    pub region: String,
    /// Maximum number of topics to return.
    pub limit: usize,
    /// Content rules used for acceptance.
    pub filter: TopicFilter,
    /// Evergreen titles used when every source fails.
    pub fallback_topics: Vec<String>,
}

/// Broad category of a topic, drives templates and the upload category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// Explanations, science, how-tos.
    #[default]
    Educational,
    /// Viral, surprising or funny material.
    Entertainment,
    /// Current events.
    News,
    /// Health, food, travel, style.
    Lifestyle,
}

impl ContentType {
    const PATTERNS: [(Self, &'static [&'static str]); 4] = [
        (
            Self::Educational,
            &["learn", "how to", "tutorial", "guide", "explain", "science", "study", "research"],
        ),
        (
            Self::Entertainment,
            &["funny", "amazing", "incredible", "shocking", "viral", "meme", "celebrity"],
        ),
        (
            Self::News,
            &["breaking", "news", "update", "announcement", "report", "today", "latest"],
        ),
        (
            Self::Lifestyle,
            &["health", "fitness", "food", "travel", "home", "style", "beauty", "wellness"],
        ),
    ];

    /// Classifies text by pattern hits. Ties go to the earlier category.
    #[must_use]
    pub fn classify(text: &str) -> Self {
        let text = text.to_lowercase();
        let mut best = (Self::Educational, 0usize);
        for (kind, patterns) in Self::PATTERNS {
            let hits = patterns.iter().filter(|p| text.contains(*p)).count();
            if hits > best.1 {
                best = (kind, hits);
            }
        }
        best.0
    }

    /// Upload category id.
    #[must_use]
    pub const fn category_id(&self) -> &'static str {
        match self {
            Self::Educational => "27",
            Self::Entertainment => "24",
            Self::News => "25",
            Self::Lifestyle => "26",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Educational => write!(f, "educational"),
            Self::Entertainment => write!(f, "entertainment"),
            Self::News => write!(f, "news"),
            Self::Lifestyle => write!(f, "lifestyle"),
        }
    }
}

/// The topic chosen for the video, as passed to later stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedTopic {
    /// Headline.
    pub title: String,
    /// Description, may be empty.
    pub description: String,
    /// Classified content type.
    pub content_type: ContentType,
    /// Keywords for visuals and metadata.
    pub keywords: Vec<String>,
}

impl From<&TrendingTopic> for SelectedTopic {
    fn from(topic: &TrendingTopic) -> Self {
        let content_type = ContentType::classify(&format!("{} {}", topic.title, topic.description));
        let keywords = if topic.keywords.is_empty() {
            extract_keywords(&format!("{} {}", topic.title, topic.description))
        } else {
            topic.keywords.clone()
        };
        Self {
            title: topic.title.clone(),
            description: topic.description.clone(),
            content_type,
            keywords,
        }
    }
}

/// Picks the best topic passing the filter, else the best topic overall.
#[must_use]
pub fn select_topic(list: &TopicList, filter: &TopicFilter) -> Option<SelectedTopic> {
    let best = |allowed_only: bool| {
        list.topics
            .iter()
            .filter(|t| !allowed_only || filter.allows(t))
            .fold(None::<&TrendingTopic>, |best, t| match best {
                Some(b) if b.score >= t.score => Some(b),
                _ => Some(t),
            })
    };
    best(true).or_else(|| best(false)).map(SelectedTopic::from)
}

/// Marker for the topics stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopicDiscovery;

impl Capability for TopicDiscovery {
    type Request = TopicsRequest;
    type Artifact = TopicList;

    const KIND: StageKind = StageKind::Topics;
    const HAS_SUBSTITUTE: bool = true;

    fn validate_shape(artifact: &TopicList) -> Result<(), String> {
        if artifact.topics.is_empty() {
            return Err("no topics returned".to_string());
        }
        if artifact.topics.iter().any(|t| t.title.trim().is_empty()) {
            return Err("topic with empty title".to_string());
        }
        if artifact.topics.iter().any(|t| !t.score.is_finite()) {
            return Err("topic with non-finite score".to_string());
        }
        Ok(())
    }

    fn accept(request: &TopicsRequest, artifact: &TopicList) -> Result<(), String> {
        if artifact.topics.iter().any(|t| request.filter.allows(t)) {
            Ok(())
        } else {
            Err(format!(
                "none of {} topics passed the content filter",
                artifact.topics.len()
            ))
        }
    }

    fn substitute(request: &TopicsRequest) -> Option<TopicList> {
        if request.fallback_topics.is_empty() {
            return None;
        }
        let topics = request
            .fallback_topics
            .iter()
            .take(request.limit.max(1))
            .map(|title| TrendingTopic::new(title.clone(), "fallback", FALLBACK_SCORE))
            .collect();
        Some(TopicList { topics })
    }
}

/// A topic provider that queries several sources concurrently and merges
/// their answers.
///
/// Individual source failures are tolerated; the merged provider fails only
/// when no source returned anything. With a rate limiter attached, each
/// source spends its own quota and a denied source is skipped.
pub struct MergedTopicSource {
    name: String,
    sources: Vec<Arc<dyn Provider<TopicDiscovery>>>,
    concurrency: usize,
    limiter: Option<Arc<RateLimiter>>,
}

impl MergedTopicSource {
    /// Creates a merged source with the given fan-out bound.
    pub fn new(name: impl Into<String>, concurrency: usize) -> Self {
        Self {
            name: name.into(),
            sources: Vec::new(),
            concurrency: concurrency.max(1),
            limiter: None,
        }
    }

    /// Adds a source.
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn Provider<TopicDiscovery>>) -> Self {
        self.sources.push(source);
        self
    }

    /// Gates every source call through `limiter`.
    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Number of configured sources.
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Calls one source. `None` means its quota denied the call.
    async fn query<'a>(
        &'a self,
        source: &'a Arc<dyn Provider<TopicDiscovery>>,
        request: &'a TopicsRequest,
    ) -> (&'a str, Option<Result<TopicList, ProviderError>>) {
        let name = source.name();
        if let Some(limiter) = &self.limiter {
            if !limiter.try_acquire(name) {
                return (name, None);
            }
        }
        (name, Some(source.invoke(request).await))
    }
}

impl fmt::Debug for MergedTopicSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.sources.iter().map(|s| s.name()).collect();
        f.debug_struct("MergedTopicSource")
            .field("name", &self.name)
            .field("sources", &names)
            .field("concurrency", &self.concurrency)
            .field("rate_limited", &self.limiter.is_some())
            .finish()
    }
}

#[async_trait]
impl Provider<TopicDiscovery> for MergedTopicSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, request: &TopicsRequest) -> Result<TopicList, ProviderError> {
        if self.sources.is_empty() {
            return Err(ProviderError::permanent("no topic sources configured"));
        }

        // `buffered` keeps source order so merges are deterministic.
        let calls: Vec<_> = self
            .sources
            .iter()
            .map(|source| self.query(source, request))
            .collect();
        let results: Vec<_> = stream::iter(calls)
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut merged = TopicList::default();
        let mut any_ok = false;
        let mut any_transient = false;
        let mut failures = Vec::new();

        for (source, result) in results {
            match result {
                Some(Ok(list)) => {
                    debug!(source, topics = list.topics.len(), "Topic source answered");
                    any_ok = true;
                    merged.topics.extend(list.topics);
                }
                Some(Err(err)) => {
                    warn!(source, error = %err, "Topic source failed");
                    any_transient |= err.is_transient();
                    failures.push(format!("{source}: {}", err.message()));
                }
                None => {
                    debug!(source, "Topic source rate limited, skipping");
                    any_transient = true;
                    failures.push(format!("{source}: rate limited"));
                }
            }
        }

        if !any_ok {
            let message = format!("every topic source failed ({})", failures.join("; "));
            return Err(if any_transient {
                ProviderError::transient(message)
            } else {
                ProviderError::permanent(message)
            });
        }

        merged.sort_by_score();
        merged.topics.truncate(request.limit);
        Ok(merged)
    }
}
