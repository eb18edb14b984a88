//! Title, description and tag generation.

use serde::{Deserialize, Serialize};

use super::{Capability, ContentType};
use crate::core::StageKind;

const MAX_TITLE_CHARS: usize = 100;
const MAX_TAG_CHARS: usize = 500;
const FORBIDDEN_TITLE_CHARS: [char; 3] = ['<', '>', '"'];

/// Request for the metadata stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRequest {
    /// Topic headline.
    pub topic_title: String,
    /// Narration text used for the description.
    pub summary: String,
    /// Topic keywords.
    pub keywords: Vec<String>,
    /// Topic category.
    pub content_type: ContentType,
    /// Language code.
    pub language: String,
    /// Upload privacy.
    pub privacy: String,
}

/// Artifact of the metadata stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Upload title.
    pub title: String,
    /// Upload description.
    pub description: String,
    /// Upload tags.
    pub tags: Vec<String>,
    /// Upload category id.
    pub category: String,
    /// Upload privacy.
    pub privacy: String,
}

/// Marker for the metadata stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataGeneration;

impl Capability for MetadataGeneration {
    type Request = MetadataRequest;
    type Artifact = VideoMetadata;

    const KIND: StageKind = StageKind::Metadata;
    const HAS_SUBSTITUTE: bool = true;

    fn validate_shape(artifact: &VideoMetadata) -> Result<(), String> {
        let title = artifact.title.trim();
        if title.is_empty() {
            return Err("metadata has an empty title".to_string());
        }
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(format!("title exceeds {MAX_TITLE_CHARS} characters"));
        }
        if title.contains(FORBIDDEN_TITLE_CHARS) {
            return Err("title contains forbidden characters".to_string());
        }
        Ok(())
    }

    fn accept(_request: &MetadataRequest, artifact: &VideoMetadata) -> Result<(), String> {
        let tag_chars: usize = artifact.tags.iter().map(|t| t.chars().count()).sum();
        if tag_chars > MAX_TAG_CHARS {
            return Err(format!("tags total {tag_chars} characters, limit {MAX_TAG_CHARS}"));
        }
        Ok(())
    }

    fn substitute(request: &MetadataRequest) -> Option<VideoMetadata> {
        let mut title = format!("Amazing Facts About {}", request.topic_title);
        title.retain(|c| !FORBIDDEN_TITLE_CHARS.contains(&c));
        if title.chars().count() > MAX_TITLE_CHARS {
            title = title.chars().take(MAX_TITLE_CHARS - 3).collect::<String>() + "...";
        }

        let hashtags: Vec<String> = request
            .keywords
            .iter()
            .take(3)
            .map(|k| format!("#{}", k.replace(' ', "")))
            .collect();
        let description = format!(
            "{}\n\n{}\n\n#shorts {}",
            request.topic_title,
            request.summary,
            hashtags.join(" ")
        );

        let mut tags = request.keywords.clone();
        tags.push("shorts".to_string());
        tags.push(request.content_type.to_string());

        Some(VideoMetadata {
            title,
            description: description.trim_end().to_string(),
            tags,
            category: request.content_type.category_id().to_string(),
            privacy: request.privacy.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(title: &str) -> MetadataRequest {
        MetadataRequest {
            topic_title: title.into(),
            summary: "Narration".into(),
            keywords: vec!["black holes".into(), "space".into()],
            content_type: ContentType::News,
            language: "en".into(),
            privacy: "public".into(),
        }
    }

    fn metadata(title: &str) -> VideoMetadata {
        VideoMetadata {
            title: title.into(),
            description: String::new(),
            tags: Vec::new(),
            category: "27".into(),
            privacy: "public".into(),
        }
    }

    #[test]
    fn test_title_shape() {
        assert!(MetadataGeneration::validate_shape(&metadata("A fine title")).is_ok());
        assert!(MetadataGeneration::validate_shape(&metadata("  ")).is_err());
        assert!(MetadataGeneration::validate_shape(&metadata("Bad <b>title</b>")).is_err());
        assert!(MetadataGeneration::validate_shape(&metadata("Say \"hi\"")).is_err());
        assert!(MetadataGeneration::validate_shape(&metadata(&"t".repeat(101))).is_err());
        assert!(MetadataGeneration::validate_shape(&metadata(&"t".repeat(100))).is_ok());
    }

    #[test]
    fn test_substitute_template() {
        let meta = MetadataGeneration::substitute(&request("How Black Holes Bend Light")).unwrap();
        assert_eq!(meta.title, "Amazing Facts About How Black Holes Bend Light");
        assert_eq!(meta.category, "25");
        assert!(meta.description.ends_with("#shorts #blackholes #space"));
        assert!(meta.tags.contains(&"shorts".to_string()));
        assert!(MetadataGeneration::validate_shape(&meta).is_ok());
    }

    #[test]
    fn test_substitute_sanitizes_title() {
        let long = format!("<{}>", "x".repeat(150));
        let meta = MetadataGeneration::substitute(&request(&long)).unwrap();
        assert!(MetadataGeneration::validate_shape(&meta).is_ok());
        assert_eq!(meta.title.chars().count(), 100);
    }

    #[test]
    fn test_accept_limits_tag_length() {
        let mut meta = metadata("Fine");
        meta.tags = vec!["x".repeat(501)];
        assert!(MetadataGeneration::accept(&request("t"), &meta).is_err());
    }
}
