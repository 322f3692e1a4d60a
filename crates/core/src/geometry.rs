//! Screen-space rectangles and the mapping into PDF user space.
//!
//! Screen rectangles have their origin at the top-left and grow downwards.
//! PDF user space has its origin at the bottom-left. The two never meet
//! directly: a screen rectangle is first expressed as fractions of the rendered
//! page canvas, and those fractions are then scaled by the page size in points.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in viewport pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// A rectangle that cannot be divided by.
    pub fn is_degenerate(&self) -> bool {
        !(self.width.is_finite() && self.height.is_finite()) || self.width <= 0.0 || self.height <= 0.0
    }

    pub fn contains(&self, other: &Rect) -> bool {
        other.left >= self.left
            && other.top >= self.top
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}

/// Position and size as fractions of the rendered page, y measured from the
/// bottom edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedGeometry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Rectangle in PDF user-space units, origin bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PdfRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Express `screen` as fractions of `canvas`.
///
/// Both rectangles must be in the same pixel space. Returns `None` when no
/// canvas is rendered or its box is degenerate; callers skip such entries.
pub fn to_fractional(screen: &Rect, canvas: Option<&Rect>) -> Option<NormalizedGeometry> {
    let canvas = canvas?;
    if canvas.is_degenerate() {
        return None;
    }

    let left = screen.left - canvas.left;
    let top = screen.top - canvas.top;

    Some(NormalizedGeometry {
        x: left / canvas.width,
        y: 1.0 - (top + screen.height) / canvas.height,
        width: screen.width / canvas.width,
        height: screen.height / canvas.height,
    })
}

/// Scale normalized geometry to a page of `page_width` x `page_height` points.
pub fn to_absolute(geometry: &NormalizedGeometry, page_width: f64, page_height: f64) -> PdfRect {
    PdfRect {
        x: geometry.x * page_width,
        y: geometry.y * page_height,
        width: geometry.width * page_width,
        height: geometry.height * page_height,
    }
}
