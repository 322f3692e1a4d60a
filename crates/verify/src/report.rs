//! Verification responses and the display state derived from them.

use std::fmt::Write;

use chrono::{DateTime, FixedOffset, Local, Offset, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%-m/%-d/%Y, %-I:%M:%S %p";

/// Body returned by the verification endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResponse {
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub metadata: Option<VerifiedMetadata>,
}

/// Metadata the server stored for a document. Keys are snake_case on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifiedMetadata {
    pub author: String,
    pub timestamp: String,
    pub original_filename: String,
    pub hash: String,
}

/// How timestamps are shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayFormat {
    /// chrono format string.
    pub pattern: String,
    pub offset: FixedOffset,
}

impl Default for DisplayFormat {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            offset: Utc.fix(),
        }
    }
}

impl DisplayFormat {
    /// Format in the machine's current local offset.
    pub fn local(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            offset: Local::now().offset().fix(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Authentic,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Success,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationView {
    pub status: Status,
    pub glyph: char,
    pub title: String,
    pub tone: Tone,
    pub author: Option<String>,
    pub timestamp: Option<String>,
    pub filename: Option<String>,
    pub hash: Option<String>,
}

/// Map a verification response to what the user sees.
///
/// Metadata fields are filled whenever the server sent metadata and left empty
/// otherwise; a missing block is never an error.
pub fn render(response: &VerificationResponse, format: &DisplayFormat) -> ValidationView {
    let (status, glyph, title, tone) = if response.valid {
        (Status::Authentic, '✓', "Document is authentic", Tone::Success)
    } else {
        (Status::Failed, '✗', "Document validation failed", Tone::Danger)
    };

    let mut view = ValidationView {
        status,
        glyph,
        title: title.to_string(),
        tone,
        author: None,
        timestamp: None,
        filename: None,
        hash: None,
    };

    if let Some(meta) = &response.metadata {
        view.author = Some(meta.author.clone());
        view.timestamp = Some(format_timestamp(&meta.timestamp, format));
        view.filename = Some(meta.original_filename.clone());
        view.hash = Some(meta.hash.clone());
    }

    log::info!("[Validate] rendered {:?} (metadata: {})", view.status, response.metadata.is_some());
    view
}

/// Locale-style timestamp, or the raw value when it does not parse.
fn format_timestamp(raw: &str, format: &DisplayFormat) -> String {
    let Ok(parsed) = DateTime::parse_from_rfc3339(raw.trim()) else {
        log::debug!("[Validate] timestamp {:?} is not RFC 3339, showing as-is", raw);
        return raw.to_string();
    };
    let local = parsed.with_timezone(&format.offset);

    let mut out = String::new();
    if write!(out, "{}", local.format(&format.pattern)).is_ok() {
        return out;
    }
    local.format(DEFAULT_TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> VerifiedMetadata {
        VerifiedMetadata {
            author: "Ada".into(),
            timestamp: "2024-05-01T10:30:00.000Z".into(),
            original_filename: "contract.pdf".into(),
            hash: "ab12".into(),
        }
    }

    #[test]
    fn test_valid_with_metadata() {
        let response = VerificationResponse {
            valid: true,
            metadata: Some(metadata()),
        };
        let view = render(&response, &DisplayFormat::default());
        assert_eq!(view.status, Status::Authentic);
        assert_eq!(view.glyph, '✓');
        assert_eq!(view.title, "Document is authentic");
        assert_eq!(view.tone, Tone::Success);
        assert_eq!(view.author.as_deref(), Some("Ada"));
        assert_eq!(view.timestamp.as_deref(), Some("5/1/2024, 10:30:00 AM"));
        assert_eq!(view.filename.as_deref(), Some("contract.pdf"));
        assert_eq!(view.hash.as_deref(), Some("ab12"));
    }

    #[test]
    fn test_invalid_without_metadata() {
        let response: VerificationResponse = serde_json::from_str(r#"{"valid":false}"#).unwrap();
        let view = render(&response, &DisplayFormat::default());
        assert_eq!(view.status, Status::Failed);
        assert_eq!(view.glyph, '✗');
        assert_eq!(view.title, "Document validation failed");
        assert_eq!(view.tone, Tone::Danger);
        assert!(view.author.is_none() && view.timestamp.is_none());
        assert!(view.filename.is_none() && view.hash.is_none());
    }

    #[test]
    fn test_wire_format_is_snake_case() {
        let json = r#"{"valid":true,"metadata":{"author":"Ada","timestamp":"x","original_filename":"a.pdf","hash":"h"}}"#;
        let response: VerificationResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.metadata.unwrap().original_filename, "a.pdf");
    }

    #[test]
    fn test_unparsable_timestamp_shown_raw() {
        let mut meta = metadata();
        meta.timestamp = "yesterday".into();
        let response = VerificationResponse {
            valid: true,
            metadata: Some(meta),
        };
        let view = render(&response, &DisplayFormat::default());
        assert_eq!(view.timestamp.as_deref(), Some("yesterday"));
    }

    #[test]
    fn test_offset_applied() {
        let format = DisplayFormat {
            pattern: "%Y-%m-%d %H:%M".into(),
            offset: FixedOffset::east_opt(2 * 3600).unwrap(),
        };
        assert_eq!(format_timestamp("2024-05-01T10:30:00Z", &format), "2024-05-01 12:30");
    }
}
