//! Deterministic request fingerprints used as cache keys.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

use super::StageKind;

/// A SHA-256 digest over a stage request's canonical JSON form.
///
/// Two requests with the same semantic content always share a fingerprint,
/// whatever the field or map-key order of their in-memory representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprints a request for the given stage.
    pub fn of<T: Serialize>(stage: StageKind, request: &T) -> Result<Self, serde_json::Error> {
        let value = serde_json::to_value(request)?;
        let mut hasher = Sha256::new();
        hasher.update(stage.as_str().as_bytes());
        hasher.update(b"\n");
        hasher.update(to_canonical_json(&value).as_bytes());
        Ok(Self(hex::encode(hasher.finalize())))
    }

    /// Wraps an existing hex digest.
    #[must_use]
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// Returns the hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a shortened form for logs.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Content address for an artifact without a natural locator.
pub fn content_reference<T: Serialize>(artifact: &T) -> Result<String, serde_json::Error> {
    let value = serde_json::to_value(artifact)?;
    let digest = Sha256::digest(to_canonical_json(&value).as_bytes());
    Ok(format!("sha256:{}", hex::encode(&digest[..16])))
}

/// Serializes a JSON value with sorted object keys and no whitespace.
#[must_use]
pub fn to_canonical_json(value: &serde_json::Value) -> String {
    use serde_json::Value;

    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => value.to_string(),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        Value::Object(map) => {
            let sorted: BTreeMap<&String, String> = map
                .iter()
                .map(|(k, v)| (k, to_canonical_json(v)))
                .collect();
            let items: Vec<String> = sorted
                .into_iter()
                .map(|(k, v)| format!("{}:{v}", Value::String(k.clone())))
                .collect();
            format!("{{{}}}", items.join(","))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Serialize)]
    struct Request {
        title: String,
        tags: HashMap<String, u32>,
    }

    #[test]
    fn test_canonical_json_sorts_keys() {
        let val = json!({ "z": [ { "y": "yes" }, null ], "a": { "x": 10 } });
        assert_eq!(
            to_canonical_json(&val),
            "{\"a\":{\"x\":10},\"z\":[{\"y\":\"yes\"},null]}"
        );
    }

    #[test]
    fn test_identical_requests_share_fingerprint() {
        let mut tags_a = HashMap::new();
        tags_a.insert("space".to_string(), 1);
        tags_a.insert("facts".to_string(), 2);
        let mut tags_b = HashMap::new();
        tags_b.insert("facts".to_string(), 2);
        tags_b.insert("space".to_string(), 1);

        let a = Request { title: "Mars".into(), tags: tags_a };
        let b = Request { title: "Mars".into(), tags: tags_b };

        assert_eq!(
            Fingerprint::of(StageKind::Script, &a).unwrap(),
            Fingerprint::of(StageKind::Script, &b).unwrap()
        );
    }

    #[test]
    fn test_different_content_differs() {
        let a = json!({"title": "Mars"});
        let b = json!({"title": "Venus"});
        assert_ne!(
            Fingerprint::of(StageKind::Script, &a).unwrap(),
            Fingerprint::of(StageKind::Script, &b).unwrap()
        );
    }

    #[test]
    fn test_stage_is_part_of_fingerprint() {
        let req = json!({"text": "hello"});
        assert_ne!(
            Fingerprint::of(StageKind::Voice, &req).unwrap(),
            Fingerprint::of(StageKind::Metadata, &req).unwrap()
        );
    }

    #[test]
    fn test_short_never_splits_a_character() {
        assert_eq!(Fingerprint::from_hex("0123456789abcdef").short(), "0123456789ab");
        assert_eq!(Fingerprint::from_hex("abc").short(), "abc");
        let odd = Fingerprint::from_hex("ééééééé");
        assert_eq!(odd.short(), "éééééé");
        let split = Fingerprint::from_hex("12345678901é");
        assert_eq!(split.short(), "12345678901é");
    }

    #[test]
    fn test_fingerprint_shape() {
        let fp = Fingerprint::of(StageKind::Topics, &json!({"limit": 5})).unwrap();
        assert_eq!(fp.as_str().len(), 64);
        assert_eq!(fp.short().len(), 12);
    }

    #[test]
    fn test_content_reference_is_stable() {
        let a = content_reference(&json!({"b": 1, "a": 2})).unwrap();
        let b = content_reference(&json!({"a": 2, "b": 1})).unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("sha256:"));
    }
}
