use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use signease_core::{Annotation, DocumentMetadata, Rect, UNKNOWN_AUTHOR};

pub type Result<T> = std::result::Result<T, FlattenError>;

#[derive(Debug, thiserror::Error)]
pub enum FlattenError {
    #[error("failed to parse PDF: {0}")]
    Parse(String),
    #[error("document has no pages")]
    NoPages,
    #[error("page {page} is out of range (document has {count} pages)")]
    PageOutOfRange { page: u32, count: usize },
    #[error("annotation image is not a PNG")]
    NotPng,
    #[error("failed to decode annotation image: {0}")]
    ImageDecode(#[from] image::ImageError),
    #[error("malformed page structure: {0}")]
    Structure(String),
    #[error("failed to write PDF: {0}")]
    Serialize(String),
}

/// Page box in points, as read from the (possibly inherited) MediaBox.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    /// Lower-left corner of the box; usually the origin.
    pub origin_x: f64,
    pub origin_y: f64,
    pub width: f64,
    pub height: f64,
}

/// Document information stamped into the Info dictionary.
#[derive(Debug, Clone)]
pub struct DocumentInfo {
    pub title: String,
    pub author: String,
    pub creator: String,
    pub producer: String,
    pub modified: DateTime<Utc>,
    /// Name of the file the user loaded, carried into the metadata record.
    pub original_filename: String,
}

impl DocumentInfo {
    /// `author` falls back to the unknown-user placeholder when absent or
    /// empty; any other value is kept as given.
    pub fn new(author: Option<&str>, original_filename: &str, modified: DateTime<Utc>) -> Self {
        let author = author.filter(|a| !a.is_empty()).unwrap_or(UNKNOWN_AUTHOR);
        Self {
            title: "Signed Document".to_string(),
            author: author.to_string(),
            creator: "SignEase Document System".to_string(),
            producer: "SignEase v1.0".to_string(),
            modified,
            original_filename: original_filename.to_string(),
        }
    }

    /// ISO 8601 form used in the metadata record.
    pub fn timestamp(&self) -> String {
        self.modified.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// Annotations burned into one page, mapped against that page's canvas.
#[derive(Debug, Clone)]
pub struct PageBatch<'a> {
    /// 1-based.
    pub page: u32,
    /// Rendered canvas box for this page, `None` when nothing is rendered.
    pub canvas: Option<Rect>,
    pub annotations: Vec<&'a Annotation>,
}

/// Output of a flatten: the new bytes and the record bound to them.
#[derive(Debug, Clone)]
pub struct Flattened {
    pub bytes: Vec<u8>,
    pub metadata: DocumentMetadata,
    /// Annotations left out because their geometry could not be mapped.
    pub skipped: usize,
}
