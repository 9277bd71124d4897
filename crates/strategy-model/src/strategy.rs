//! Strategy documents: the ordered clip list a production run works through.
//!
//! The document is authored upstream. Only `clips` is interpreted here; every
//! other top-level key is publish metadata for the downstream publisher and is
//! carried through untouched.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::timecode::Timecode;

/// Clip identifier, unique within a strategy document.
///
/// Documents may use strings or integers; both normalise to a string. The id
/// becomes part of scratch file names, so path-like ids are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ClipId(String);

impl ClipId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn file_name_problem(&self) -> Option<&'static str> {
        let id = self.0.as_str();
        if id.trim().is_empty() {
            Some("is empty")
        } else if id == "." || id == ".." {
            Some("is a relative directory name")
        } else if id.contains(['/', '\\']) {
            Some("contains a path separator")
        } else if id.chars().any(char::is_control) {
            Some("contains control characters")
        } else {
            None
        }
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ClipId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Unsigned(u64),
            Signed(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => ClipId(text),
            Raw::Unsigned(n) => ClipId(n.to_string()),
            Raw::Signed(n) => ClipId(n.to_string()),
        })
    }
}

/// Half-open excerpt `[start, end)` of the source video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Timecode,
    pub end: Timecode,
}

impl TimeRange {
    pub fn duration_millis(&self) -> u64 {
        self.end.as_millis().saturating_sub(self.start.as_millis())
    }
}

/// One excerpt to cut, reframe, and annotate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipSpec {
    pub id: ClipId,

    pub time_range: TimeRange,

    /// Headline drawn near the top of the canvas.
    pub title: String,

    /// Commentary drawn near the bottom. Newlines are hard breaks.
    pub commentary_text: String,
}

/// The input document: clips in production order plus opaque publish metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDocument {
    pub clips: Vec<ClipSpec>,

    /// Everything else in the document, consumed only by the publisher.
    #[serde(flatten)]
    pub publish_metadata: serde_json::Map<String, serde_json::Value>,
}

impl StrategyDocument {
    /// Load and validate a strategy document from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StrategyError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| StrategyError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let document: Self =
            serde_json::from_str(&content).map_err(|e| StrategyError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?;
        document.validate()?;
        Ok(document)
    }

    /// Parse and validate a strategy document held in memory.
    pub fn from_json_str(json: &str) -> Result<Self, StrategyError> {
        let document: Self =
            serde_json::from_str(json).map_err(|e| StrategyError::ParseError {
                path: PathBuf::from("<memory>"),
                source: e,
            })?;
        document.validate()?;
        Ok(document)
    }

    /// Check the invariants the pipeline relies on.
    ///
    /// Duration against the source video is not checked; the upstream
    /// collaborator guarantees it.
    pub fn validate(&self) -> Result<(), StrategyError> {
        if self.clips.is_empty() {
            return Err(StrategyError::validation("strategy contains no clips"));
        }

        let mut seen = HashSet::with_capacity(self.clips.len());
        for (index, clip) in self.clips.iter().enumerate() {
            if let Some(problem) = clip.id.file_name_problem() {
                return Err(StrategyError::validation(format!(
                    "clip #{} id {:?} {problem}",
                    index + 1,
                    clip.id.as_str()
                )));
            }
            if !seen.insert(&clip.id) {
                return Err(StrategyError::validation(format!(
                    "duplicate clip id {:?}",
                    clip.id.as_str()
                )));
            }
            if clip.time_range.start >= clip.time_range.end {
                return Err(StrategyError::validation(format!(
                    "clip {:?}: start {} is not before end {}",
                    clip.id.as_str(),
                    clip.time_range.start,
                    clip.time_range.end
                )));
            }
        }

        Ok(())
    }

    /// Total duration of all excerpts.
    pub fn total_duration_millis(&self) -> u64 {
        self.clips
            .iter()
            .map(|clip| clip.time_range.duration_millis())
            .fold(0u64, u64::saturating_add)
    }
}

/// Errors that can occur when loading strategy documents.
#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid strategy: {message}")]
    ValidationError { message: String },
}

impl StrategyError {
    fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "clips": [
            {
                "id": 1,
                "time_range": { "start": "00:01:00", "end": "00:01:30.5" },
                "title": "Opening",
                "commentary_text": "line one\nline two"
            },
            {
                "id": "c2",
                "time_range": { "start": 120, "end": "02:45" },
                "title": "Twist",
                "commentary_text": ""
            }
        ],
        "publish": { "caption": "hello", "tags": ["a", "b"] },
        "cover": "cover.png"
    }"#;

    #[test]
    fn test_parse_sample_document() {
        let doc = StrategyDocument::from_json_str(SAMPLE).unwrap();
        assert_eq!(doc.clips.len(), 2);
        assert_eq!(doc.clips[0].id.as_str(), "1");
        assert_eq!(doc.clips[1].id.as_str(), "c2");
        assert_eq!(doc.clips[0].time_range.duration_millis(), 30_500);
        assert_eq!(doc.total_duration_millis(), 30_500 + 45_000);
    }

    #[test]
    fn test_publish_metadata_is_preserved_verbatim() {
        let doc = StrategyDocument::from_json_str(SAMPLE).unwrap();
        assert_eq!(doc.publish_metadata.len(), 2);
        assert_eq!(doc.publish_metadata["cover"], "cover.png");
        assert_eq!(doc.publish_metadata["publish"]["tags"][1], "b");

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["publish"]["caption"], "hello");
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let json = r#"{ "clips": [
            { "id": "a", "time_range": { "start": 0, "end": 1 }, "title": "", "commentary_text": "" },
            { "id": "a", "time_range": { "start": 2, "end": 3 }, "title": "", "commentary_text": "" }
        ] }"#;
        let err = StrategyDocument::from_json_str(json).unwrap_err();
        assert!(err.to_string().contains("duplicate clip id"));
    }

    #[test]
    fn test_integer_and_string_ids_collide() {
        let json = r#"{ "clips": [
            { "id": 7, "time_range": { "start": 0, "end": 1 }, "title": "", "commentary_text": "" },
            { "id": "7", "time_range": { "start": 2, "end": 3 }, "title": "", "commentary_text": "" }
        ] }"#;
        assert!(StrategyDocument::from_json_str(json).is_err());
    }

    #[test]
    fn test_rejects_inverted_range() {
        let json = r#"{ "clips": [
            { "id": "a", "time_range": { "start": "00:00:05", "end": "00:00:05" }, "title": "", "commentary_text": "" }
        ] }"#;
        let err = StrategyDocument::from_json_str(json).unwrap_err();
        assert!(matches!(err, StrategyError::ValidationError { .. }));
    }

    #[test]
    fn test_rejects_path_like_ids() {
        for id in ["\"../escape\"", "\"a/b\"", "\"..\"", "\"  \""] {
            let json = format!(
                r#"{{ "clips": [ {{ "id": {id}, "time_range": {{ "start": 0, "end": 1 }}, "title": "", "commentary_text": "" }} ] }}"#
            );
            assert!(
                StrategyDocument::from_json_str(&json).is_err(),
                "id {id} should be rejected"
            );
        }
    }

    #[test]
    fn test_missing_required_field_is_parse_error() {
        let json = r#"{ "clips": [ { "id": "a", "time_range": { "start": 0, "end": 1 }, "title": "x" } ] }"#;
        let err = StrategyDocument::from_json_str(json).unwrap_err();
        assert!(matches!(err, StrategyError::ParseError { .. }));
    }

    #[test]
    fn test_oversized_timecode_is_parse_error() {
        let json = r#"{ "clips": [ { "id": "a", "time_range": { "start": "0", "end": "99999999999999999" }, "title": "", "commentary_text": "" } ] }"#;
        let err = StrategyDocument::from_json_str(json).unwrap_err();
        assert!(matches!(err, StrategyError::ParseError { .. }));
    }

    #[test]
    fn test_total_duration_saturates() {
        let json = r#"{ "clips": [
            { "id": "a", "time_range": { "start": "0", "end": "18446744073709551" }, "title": "", "commentary_text": "" },
            { "id": "b", "time_range": { "start": "0", "end": "18446744073709551" }, "title": "", "commentary_text": "" }
        ] }"#;
        let doc = StrategyDocument::from_json_str(json).unwrap();
        assert_eq!(doc.total_duration_millis(), u64::MAX);
    }

    #[test]
    fn test_empty_clip_list_rejected() {
        let err = StrategyDocument::from_json_str(r#"{ "clips": [] }"#).unwrap_err();
        assert!(err.to_string().contains("no clips"));
    }

    #[test]
    fn test_load_reports_path_on_io_error() {
        let err = StrategyDocument::load("/nonexistent/Episode-Strategy.json").unwrap_err();
        assert!(matches!(err, StrategyError::IoError { .. }));
        assert!(err.to_string().contains("Episode-Strategy.json"));
    }
}
