//! Script writing: hook, body and call-to-action.

use serde::{Deserialize, Serialize};

use super::{Capability, ContentType, SelectedTopic};
use crate::core::StageKind;

/// Speaking rate used to estimate narration time.
pub const WORDS_PER_SECOND: f64 = 2.5;

/// Request for the script stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptRequest {
    /// The topic to write about.
    pub topic: SelectedTopic,
    /// Free-form style hint.
    pub style: String,
    /// Minimum accepted word count.
    pub min_words: usize,
    /// Maximum accepted word count.
    pub max_words: usize,
    /// Maximum estimated narration time.
    pub max_duration_secs: u64,
}

/// Artifact of the script stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    /// Opening line.
    pub hook: String,
    /// Main content.
    pub body: String,
    /// Closing call-to-action.
    pub call_to_action: String,
}

impl Script {
    /// Hook, body and call-to-action joined with single spaces.
    #[must_use]
    pub fn full_text(&self) -> String {
        [&self.hook, &self.body, &self.call_to_action]
            .iter()
            .map(|part| part.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Word count over the full text.
    #[must_use]
    pub fn word_count(&self) -> usize {
        [&self.hook, &self.body, &self.call_to_action]
            .iter()
            .map(|part| part.split_whitespace().count())
            .sum()
    }

    /// Estimated narration time in seconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn estimated_duration_secs(&self) -> f64 {
        self.word_count() as f64 / WORDS_PER_SECOND
    }
}

fn template_hook(topic: &SelectedTopic) -> String {
    match topic.content_type {
        ContentType::Educational => format!("Here's what you need to know about {}!", topic.title),
        ContentType::Entertainment => format!("The shocking truth about {}!", topic.title),
        ContentType::News => format!("Here's why everyone's talking about {}!", topic.title),
        ContentType::Lifestyle => {
            format!("You won't believe what I just learned about {}!", topic.title)
        }
    }
}

/// Marker for the script stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptWriting;

impl Capability for ScriptWriting {
    type Request = ScriptRequest;
    type Artifact = Script;

    const KIND: StageKind = StageKind::Script;
    const HAS_SUBSTITUTE: bool = true;

    fn validate_shape(artifact: &Script) -> Result<(), String> {
        if artifact.hook.trim().is_empty() {
            return Err("script has no hook".to_string());
        }
        if artifact.body.trim().is_empty() {
            return Err("script has no body".to_string());
        }
        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn accept(request: &ScriptRequest, artifact: &Script) -> Result<(), String> {
        let words = artifact.word_count();
        if words < request.min_words {
            return Err(format!(
                "script too short: {words} words, need at least {}",
                request.min_words
            ));
        }
        if words > request.max_words {
            return Err(format!(
                "script too long: {words} words, limit {}",
                request.max_words
            ));
        }
        let duration = artifact.estimated_duration_secs();
        if duration > request.max_duration_secs as f64 {
            return Err(format!(
                "script runs {duration:.1}s, limit {}s",
                request.max_duration_secs
            ));
        }
        Ok(())
    }

    fn substitute(request: &ScriptRequest) -> Option<Script> {
        let title = &request.topic.title;
        Some(Script {
            hook: template_hook(&request.topic),
            body: format!(
                "First, {title} is more important than most people realize. \
                 Second, recent studies show fascinating insights about this topic. \
                 Finally, this could impact your daily life in ways you never imagined."
            ),
            call_to_action: "What do you think? Drop a comment below!".to_string(),
        })
    }
}
