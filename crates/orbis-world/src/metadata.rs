use chrono::{DateTime, Utc};
use orbis_resolve::{ResolveError, ResolveResult};
use serde::{Deserialize, Serialize};

/// Human-readable description of a world or template. Unknown fields in
/// the source document are ignored.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorldMetadata {
    pub name: String,
    pub description: String,
    pub author: String,
    pub content_rating: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

impl WorldMetadata {
    /// Decode a JSON metadata document.
    pub fn from_json(data: &[u8]) -> ResolveResult<Self> {
        serde_json::from_slice(data).map_err(|e| ResolveError::Decode(format!("metadata: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn decodes_full_document() {
        let meta = WorldMetadata::from_json(
            br#"{
                "name": "Plaza",
                "description": "A quiet square",
                "author": "someone",
                "contentRating": "everyone",
                "created": "2024-03-01T12:00:00Z",
                "favouriteColour": "green"
            }"#,
        )
        .unwrap();
        assert_eq!(meta.name, "Plaza");
        assert_eq!(meta.content_rating.as_deref(), Some("everyone"));
        assert_eq!(
            meta.created,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(meta.updated, None);
    }

    #[test]
    fn empty_object_is_default() {
        assert_eq!(WorldMetadata::from_json(b"{}").unwrap(), WorldMetadata::default());
    }

    #[test]
    fn garbage_is_decode_error() {
        let err = WorldMetadata::from_json(b"\x89PNG").unwrap_err();
        assert!(matches!(err, ResolveError::Decode(_)));
    }
}
