//! Voice synthesis.

use serde::{Deserialize, Serialize};

use super::{Capability, WORDS_PER_SECOND};
use crate::core::StageKind;

/// Request for the voice stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceRequest {
    /// Narration text.
    pub text: String,
    /// Provider-neutral voice identifier.
    pub voice_id: String,
    /// Language code.
    pub language: String,
}

impl VoiceRequest {
    /// Expected narration length at the standard speaking rate.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn estimated_duration_ms(&self) -> u64 {
        let words = self.text.split_whitespace().count() as f64;
        (words / WORDS_PER_SECOND * 1000.0).round() as u64
    }
}

/// Artifact of the voice stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voiceover {
    /// Where the audio lives.
    pub uri: String,
    /// Audio length.
    pub duration_ms: u64,
    /// Container format, e.g. `mp3`.
    pub format: String,
}

impl Voiceover {
    /// Returns true for a substitute silent track.
    #[must_use]
    pub fn is_silent(&self) -> bool {
        self.uri.starts_with("silence://")
    }
}

/// Marker for the voice stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct VoiceSynthesis;

impl Capability for VoiceSynthesis {
    type Request = VoiceRequest;
    type Artifact = Voiceover;

    const KIND: StageKind = StageKind::Voice;
    const HAS_SUBSTITUTE: bool = true;

    fn validate_shape(artifact: &Voiceover) -> Result<(), String> {
        if artifact.uri.trim().is_empty() {
            return Err("voiceover has no location".to_string());
        }
        if artifact.duration_ms == 0 {
            return Err("voiceover is empty".to_string());
        }
        Ok(())
    }

    fn substitute(request: &VoiceRequest) -> Option<Voiceover> {
        let duration_ms = request.estimated_duration_ms().max(1);
        Some(Voiceover {
            uri: format!("silence://{duration_ms}ms"),
            duration_ms,
            format: "wav".to_string(),
        })
    }

    fn reference(artifact: &Voiceover) -> String {
        artifact.uri.clone()
    }
}
