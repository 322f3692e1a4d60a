//! Editing model for placing signatures, stamps and text over a PDF page.
//!
//! Everything here is screen-side state: pixel rectangles, pointer events and
//! the ordered list of overlays. Converting that state into PDF content lives in
//! `signease-pdf`.

pub mod annotation;
pub mod drag;
pub mod geometry;
pub mod signature;

pub use annotation::{Annotation, AnnotationContent, AnnotationId, AnnotationKind, AnnotationModel, PageBinding};
pub use drag::{DragController, DragState, PointerEvent, PointerPhase, PointerSource};
pub use geometry::{to_absolute, to_fractional, NormalizedGeometry, PdfRect, Point, Rect};
pub use signature::{SignaturePad, SignaturePadOptions};

use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, Precondition>;

/// Input that is missing or unusable. Nothing is changed when one of these is
/// returned; the message is meant to be shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Precondition {
    #[error("Please draw a signature first")]
    EmptySignature,
    #[error("Please select a date and time")]
    NoDateTime,
    #[error("Unrecognised date and time: {0}")]
    InvalidDateTime(String),
    #[error("Please upload a stamp image")]
    NoStampFile,
    #[error("Please enter some text")]
    EmptyText,
    #[error("Please upload a PDF first")]
    NoDocument,
    #[error("Please add at least one element to the document")]
    NoAnnotations,
    #[error("Please upload a PDF file")]
    NotAPdf,
}

/// Author shown when the host did not supply a display name.
pub const UNKNOWN_AUTHOR: &str = "Unknown User";

/// Record bound to an exported document and replayed during validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    /// Hex SHA-256 of the exported bytes.
    pub hash: String,
    /// Display name only, never verified.
    pub author: String,
    /// ISO 8601, UTC, millisecond precision.
    pub timestamp: String,
    pub original_filename: String,
}

impl DocumentMetadata {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
