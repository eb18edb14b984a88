//! Video assembly. There is no substitute for a missing video, so this stage
//! is always required.

use serde::{Deserialize, Serialize};

use super::{Capability, Voiceover, VisualSet};
use crate::core::StageKind;

/// Output frame geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Frames per second.
    pub fps: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 720,
            height: 1280,
            fps: 30,
        }
    }
}

/// Request for the assembly stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyRequest {
    /// Narration text, used for subtitles.
    pub script_text: String,
    /// Audio track.
    pub voiceover: Voiceover,
    /// Visual track.
    pub visuals: VisualSet,
    /// Output geometry.
    pub resolution: Resolution,
}

/// Artifact of the assembly stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoFile {
    /// Where the rendered file lives.
    pub uri: String,
    /// Video length.
    pub duration_ms: u64,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Marker for the assembly stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct VideoAssembly;

impl Capability for VideoAssembly {
    type Request = AssemblyRequest;
    type Artifact = VideoFile;

    const KIND: StageKind = StageKind::Assemble;

    fn validate_shape(artifact: &VideoFile) -> Result<(), String> {
        if artifact.uri.trim().is_empty() {
            return Err("video has no location".to_string());
        }
        if artifact.duration_ms == 0 {
            return Err("video is empty".to_string());
        }
        Ok(())
    }

    fn accept(request: &AssemblyRequest, artifact: &VideoFile) -> Result<(), String> {
        let want = request.resolution;
        if artifact.width != want.width || artifact.height != want.height {
            return Err(format!(
                "rendered {}x{}, expected {}x{}",
                artifact.width, artifact.height, want.width, want.height
            ));
        }
        Ok(())
    }

    fn reference(artifact: &VideoFile) -> String {
        artifact.uri.clone()
    }
}
