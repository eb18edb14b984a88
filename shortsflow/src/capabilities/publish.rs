//! Publishing the finished video.

use serde::{Deserialize, Serialize};

use super::{Capability, VideoFile, VideoMetadata};
use crate::core::StageKind;

/// Request for the publish stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRequest {
    /// The rendered video.
    pub video: VideoFile,
    /// Upload metadata.
    pub metadata: VideoMetadata,
}

/// Whether the upload happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    /// The platform accepted the upload.
    Published,
    /// Nothing was uploaded.
    NotPublished,
}

/// Artifact of the publish stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReceipt {
    /// Upload outcome.
    pub status: PublishStatus,
    /// Platform video id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    /// Public URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Marker for the publish stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct Publishing;

impl Capability for Publishing {
    type Request = PublishRequest;
    type Artifact = PublishReceipt;

    const KIND: StageKind = StageKind::Publish;
    const HAS_SUBSTITUTE: bool = true;

    fn validate_shape(artifact: &PublishReceipt) -> Result<(), String> {
        match (artifact.status, artifact.video_id.as_deref()) {
            (PublishStatus::Published, Some(id)) if !id.trim().is_empty() => Ok(()),
            (PublishStatus::Published, _) => Err("published receipt has no video id".to_string()),
            (PublishStatus::NotPublished, _) => Ok(()),
        }
    }

    fn substitute(_request: &PublishRequest) -> Option<PublishReceipt> {
        Some(PublishReceipt {
            status: PublishStatus::NotPublished,
            video_id: None,
            url: None,
        })
    }

    fn reference(artifact: &PublishReceipt) -> String {
        match (&artifact.url, &artifact.video_id) {
            (Some(url), _) => url.clone(),
            (None, Some(id)) => id.clone(),
            (None, None) => "unpublished".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_published_requires_video_id() {
        let receipt = PublishReceipt {
            status: PublishStatus::Published,
            video_id: None,
            url: None,
        };
        assert!(Publishing::validate_shape(&receipt).is_err());

        let receipt = PublishReceipt {
            status: PublishStatus::Published,
            video_id: Some("abc123".into()),
            url: Some("https://youtube.com/shorts/abc123".into()),
        };
        assert!(Publishing::validate_shape(&receipt).is_ok());
        assert_eq!(
            Publishing::reference(&receipt),
            "https://youtube.com/shorts/abc123"
        );
    }

    #[test]
    fn test_unpublished_reference() {
        let receipt = PublishReceipt {
            status: PublishStatus::NotPublished,
            video_id: None,
            url: None,
        };
        assert!(Publishing::validate_shape(&receipt).is_ok());
        assert_eq!(Publishing::reference(&receipt), "unpublished");
    }
}
