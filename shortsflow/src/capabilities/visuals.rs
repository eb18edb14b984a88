//! Visual search for stock footage and images.

use serde::{Deserialize, Serialize};

use super::Capability;
use crate::core::StageKind;

/// Request for the visuals stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualRequest {
    /// Search keywords.
    pub keywords: Vec<String>,
    /// Number of assets wanted.
    pub count: usize,
    /// Target width in pixels.
    pub width: u32,
    /// Target height in pixels.
    pub height: u32,
}

/// One image or clip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualAsset {
    /// Where the asset lives.
    pub uri: String,
    /// Which library it came from.
    pub source: String,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Artifact of the visuals stage.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VisualSet {
    /// Assets in display order.
    pub assets: Vec<VisualAsset>,
}

/// Marker for the visuals stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct VisualSearch;

impl Capability for VisualSearch {
    type Request = VisualRequest;
    type Artifact = VisualSet;

    const KIND: StageKind = StageKind::Visuals;
    const HAS_SUBSTITUTE: bool = true;

    fn validate_shape(artifact: &VisualSet) -> Result<(), String> {
        if artifact.assets.is_empty() {
            return Err("no visuals returned".to_string());
        }
        if let Some(bad) = artifact
            .assets
            .iter()
            .find(|a| a.uri.trim().is_empty() || a.width == 0 || a.height == 0)
        {
            return Err(format!("malformed visual asset from '{}'", bad.source));
        }
        Ok(())
    }

    fn substitute(request: &VisualRequest) -> Option<VisualSet> {
        Some(VisualSet {
            assets: vec![VisualAsset {
                uri: format!("placeholder://solid/{}x{}", request.width, request.height),
                source: "placeholder".to_string(),
                width: request.width,
                height: request.height,
            }],
        })
    }
}
