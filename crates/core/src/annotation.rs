//! Placed overlays and the ordered collection that owns them.

use std::fmt::Write;
use std::io::Cursor;

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, Offset};
use serde::{Deserialize, Serialize};

use crate::drag::{clamp_axis, DragController, PointerEvent};
use crate::geometry::Rect;
use crate::{Precondition, Result};

/// Fixed text size, in pixels on screen and in points on the page.
pub const TEXT_FONT_SIZE: f64 = 14.0;

const TEXT_PADDING: f64 = 5.0;
const TEXT_BORDER: f64 = 1.0;
const TEXT_LINE_HEIGHT: f64 = 1.2;

const SIGNATURE_MAX_WIDTH: f64 = 200.0;
const STAMP_MAX_SIZE: f64 = 100.0;

/// Default date-time display, close to an en-US `toLocaleString`.
pub const DEFAULT_DATE_TIME_FORMAT: &str = "%-m/%-d/%Y, %-I:%M:%S %p";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AnnotationId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    Signature,
    Stamp,
    Text,
    DateTime,
}

impl AnnotationKind {
    /// Default top-left on creation, distinct per kind so new entries do not
    /// stack exactly on top of each other.
    pub fn default_origin(self) -> (f64, f64) {
        match self {
            AnnotationKind::Signature => (50.0, 50.0),
            AnnotationKind::DateTime => (50.0, 100.0),
            AnnotationKind::Stamp => (50.0, 150.0),
            AnnotationKind::Text => (50.0, 200.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationContent {
    /// PNG bytes.
    Signature { png: Vec<u8> },
    /// PNG bytes.
    Stamp { png: Vec<u8> },
    Text { text: String },
    DateTime { iso: String, display: String },
}

impl AnnotationContent {
    pub fn kind(&self) -> AnnotationKind {
        match self {
            AnnotationContent::Signature { .. } => AnnotationKind::Signature,
            AnnotationContent::Stamp { .. } => AnnotationKind::Stamp,
            AnnotationContent::Text { .. } => AnnotationKind::Text,
            AnnotationContent::DateTime { .. } => AnnotationKind::DateTime,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub id: AnnotationId,
    /// 1-based page the annotation was placed on.
    pub page: u32,
    /// Viewport pixels, relative to the viewer's top-left.
    pub screen_rect: Rect,
    pub content: AnnotationContent,
}

impl Annotation {
    pub fn kind(&self) -> AnnotationKind {
        self.content.kind()
    }
}

/// Which page receives an annotation when the document is flattened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageBinding {
    /// The page the annotation was created on.
    #[default]
    Owning,
    /// Whatever page is current at export time.
    Current,
}

/// Ordered overlays plus the drag controller that moves them.
#[derive(Debug)]
pub struct AnnotationModel {
    entries: Vec<Annotation>,
    next_id: u64,
    drag: DragController,
    viewport: Option<Rect>,
    date_time_format: String,
    /// Offset RFC 3339 inputs are shown in.
    display_offset: FixedOffset,
}

impl Default for AnnotationModel {
    fn default() -> Self {
        Self::new(DEFAULT_DATE_TIME_FORMAT)
    }
}

impl AnnotationModel {
    pub fn new(date_time_format: &str) -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
            drag: DragController::new(),
            viewport: None,
            date_time_format: date_time_format.to_string(),
            display_offset: Local::now().offset().fix(),
        }
    }

    pub fn with_display_offset(mut self, offset: FixedOffset) -> Self {
        self.display_offset = offset;
        self
    }

    /// Place a signature, replacing any existing one.
    pub fn add_signature(&mut self, png: Vec<u8>, page: u32) -> Result<AnnotationId> {
        if png.is_empty() {
            return Err(Precondition::EmptySignature);
        }
        let previous: Vec<AnnotationId> = self
            .entries
            .iter()
            .filter(|a| a.kind() == AnnotationKind::Signature)
            .map(|a| a.id)
            .collect();
        for id in previous {
            log::info!("[Annotations] replacing signature {:?}", id);
            self.remove(id);
        }

        let size = image_box(&png, SIGNATURE_MAX_WIDTH, None);
        Ok(self.push(AnnotationContent::Signature { png }, size, page))
    }

    pub fn add_stamp(&mut self, png: Option<Vec<u8>>, page: u32) -> Result<AnnotationId> {
        let png = png.filter(|b| !b.is_empty()).ok_or(Precondition::NoStampFile)?;
        let size = image_box(&png, STAMP_MAX_SIZE, Some(STAMP_MAX_SIZE));
        Ok(self.push(AnnotationContent::Stamp { png }, size, page))
    }

    pub fn add_text(&mut self, text: &str, page: u32) -> Result<AnnotationId> {
        if text.is_empty() {
            return Err(Precondition::EmptyText);
        }
        let size = text_box(text);
        Ok(self.push(AnnotationContent::Text { text: text.to_string() }, size, page))
    }

    /// `value` is a date-time picker value (`YYYY-MM-DDTHH:MM[:SS]`) or RFC 3339.
    pub fn add_date_time(&mut self, value: &str, page: u32) -> Result<AnnotationId> {
        let value = value.trim();
        if value.is_empty() {
            return Err(Precondition::NoDateTime);
        }
        let parsed = parse_date_time(value, &self.display_offset)
            .ok_or_else(|| Precondition::InvalidDateTime(value.to_string()))?;
        let display = format_date_time(&parsed, &self.date_time_format);
        let size = text_box(&display);
        let content = AnnotationContent::DateTime {
            iso: value.to_string(),
            display,
        };
        Ok(self.push(content, size, page))
    }

    pub fn remove(&mut self, id: AnnotationId) -> Option<Annotation> {
        let index = self.entries.iter().position(|a| a.id == id)?;
        self.drag.unsubscribe(id);
        Some(self.entries.remove(index))
    }

    pub fn clear(&mut self) {
        for entry in self.entries.drain(..) {
            self.drag.unsubscribe(entry.id);
        }
    }

    /// Route a pointer event to the drag controller.
    pub fn handle_pointer(&mut self, event: &PointerEvent) -> Option<AnnotationId> {
        let viewport = self.viewport?;
        self.drag.handle(event, &viewport, &mut self.entries)
    }

    pub fn set_viewport(&mut self, viewport: Option<Rect>) {
        self.viewport = viewport;
    }

    pub fn viewport(&self) -> Option<Rect> {
        self.viewport
    }

    pub fn drag(&self) -> &DragController {
        &self.drag
    }

    pub fn entries(&self) -> &[Annotation] {
        &self.entries
    }

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.entries.iter().find(|a| a.id == id)
    }

    pub fn signature(&self) -> Option<&Annotation> {
        self.entries.iter().find(|a| a.kind() == AnnotationKind::Signature)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, content: AnnotationContent, (width, height): (f64, f64), page: u32) -> AnnotationId {
        let id = AnnotationId(self.next_id);
        self.next_id += 1;

        let (left, top) = content.kind().default_origin();
        let mut screen_rect = Rect::new(left, top, width, height);
        if let Some(vp) = self.viewport {
            screen_rect.left = clamp_axis(left, vp.width, width);
            screen_rect.top = clamp_axis(top, vp.height, height);
        }

        log::info!(
            "[Annotations] add {:?} {:?} on page {} at ({:.1}, {:.1}) {:.1}x{:.1}",
            content.kind(),
            id,
            page,
            screen_rect.left,
            screen_rect.top,
            width,
            height
        );
        self.entries.push(Annotation {
            id,
            page,
            screen_rect,
            content,
        });
        self.drag.subscribe(id);
        id
    }
}

/// Picker values are already wall-clock time; RFC 3339 values are moved into
/// `offset` first.
fn parse_date_time(value: &str, offset: &FixedOffset) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(offset).naive_local());
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

/// Format with a user-configurable pattern, falling back to the default when
/// the pattern is invalid.
pub fn format_date_time(value: &NaiveDateTime, pattern: &str) -> String {
    let mut out = String::new();
    if write!(out, "{}", value.format(pattern)).is_ok() {
        return out;
    }
    log::warn!("[Annotations] invalid date-time format {:?}, using default", pattern);
    value.format(DEFAULT_DATE_TIME_FORMAT).to_string()
}

/// Display size of an image capped at `max_width` (and `max_height`), aspect
/// preserved. Unreadable images get the full cap; decoding errors surface
/// when the document is flattened.
fn image_box(png: &[u8], max_width: f64, max_height: Option<f64>) -> (f64, f64) {
    let dims = image::ImageReader::new(Cursor::new(png))
        .with_guessed_format()
        .ok()
        .and_then(|reader| reader.into_dimensions().ok());

    let Some((w, h)) = dims.filter(|(w, h)| *w > 0 && *h > 0) else {
        log::warn!("[Annotations] could not read image size, using {}px box", max_width);
        return (max_width, max_height.unwrap_or(max_width / 2.0));
    };

    let (w, h) = (w as f64, h as f64);
    let mut scale = (max_width / w).min(1.0);
    if let Some(max_h) = max_height {
        scale = scale.min(max_h / h);
    }
    (w * scale, h * scale)
}

/// Estimated glyph advance at `font_size`.
fn estimate_char_width(ch: char, font_size: f64) -> f64 {
    if ch.is_ascii() {
        font_size * 0.55
    } else {
        font_size
    }
}

/// Padded, bordered box around a run of text at [`TEXT_FONT_SIZE`].
fn text_box(text: &str) -> (f64, f64) {
    let lines: Vec<&str> = text.lines().collect();
    let line_count = lines.len().max(1) as f64;
    let widest = lines
        .iter()
        .map(|line| line.chars().map(|c| estimate_char_width(c, TEXT_FONT_SIZE)).sum::<f64>())
        .fold(0.0, f64::max);

    let chrome = 2.0 * (TEXT_PADDING + TEXT_BORDER);
    (
        widest + chrome,
        line_count * TEXT_FONT_SIZE * TEXT_LINE_HEIGHT + chrome,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drag::PointerPhase;
    use crate::geometry::Point;
    use image::{DynamicImage, ImageFormat, RgbaImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(width, height));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png).unwrap();
        out
    }

    #[test]
    fn test_signature_replace_on_add() {
        let mut model = AnnotationModel::default();
        let first = model.add_signature(png(10, 10), 1).unwrap();
        model.add_text("keep me", 1).unwrap();
        let second_png = png(20, 10);
        let second = model.add_signature(second_png.clone(), 1).unwrap();

        let signatures: Vec<_> = model.entries().iter().filter(|a| a.kind() == AnnotationKind::Signature).collect();
        assert_eq!(signatures.len(), 1);
        assert_eq!(signatures[0].id, second);
        assert_eq!(signatures[0].content, AnnotationContent::Signature { png: second_png });
        assert!(!model.drag().is_subscribed(first));
        assert!(model.drag().is_subscribed(second));
        assert_eq!(model.len(), 2);
    }

    #[test]
    fn test_stamps_and_text_append_in_order() {
        let mut model = AnnotationModel::default();
        let a = model.add_stamp(Some(png(300, 150)), 1).unwrap();
        let b = model.add_text("Approved", 1).unwrap();
        let c = model.add_stamp(Some(png(50, 50)), 2).unwrap();
        let ids: Vec<_> = model.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![a, b, c]);
        assert_eq!(model.get(c).unwrap().page, 2);
    }

    #[test]
    fn test_preconditions_leave_model_unchanged() {
        let mut model = AnnotationModel::default();
        assert_eq!(model.add_signature(Vec::new(), 1), Err(Precondition::EmptySignature));
        assert_eq!(model.add_stamp(None, 1), Err(Precondition::NoStampFile));
        assert_eq!(model.add_stamp(Some(Vec::new()), 1), Err(Precondition::NoStampFile));
        assert_eq!(model.add_text("", 1), Err(Precondition::EmptyText));
        assert_eq!(model.add_date_time("", 1), Err(Precondition::NoDateTime));
        assert!(matches!(model.add_date_time("tomorrow", 1), Err(Precondition::InvalidDateTime(_))));
        assert!(model.is_empty());
    }

    #[test]
    fn test_default_origins_are_distinct() {
        let mut model = AnnotationModel::default();
        model.add_signature(png(10, 10), 1).unwrap();
        model.add_date_time("2024-05-01T10:30", 1).unwrap();
        model.add_stamp(Some(png(10, 10)), 1).unwrap();
        model.add_text("hi", 1).unwrap();
        let tops: Vec<f64> = model.entries().iter().map(|a| a.screen_rect.top).collect();
        assert_eq!(tops, vec![50.0, 100.0, 150.0, 200.0]);
        assert!(model.entries().iter().all(|a| a.screen_rect.left == 50.0));
    }

    #[test]
    fn test_date_time_display() {
        let mut model = AnnotationModel::default();
        let id = model.add_date_time("2024-05-01T14:05", 1).unwrap();
        match &model.get(id).unwrap().content {
            AnnotationContent::DateTime { iso, display } => {
                assert_eq!(iso, "2024-05-01T14:05");
                assert_eq!(display, "5/1/2024, 2:05:00 PM");
            }
            other => panic!("unexpected content {:?}", other),
        }
    }

    #[test]
    fn test_rfc3339_date_time_shown_in_display_offset() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let mut model = AnnotationModel::default().with_display_offset(utc);
        let id = model.add_date_time("2024-05-01T14:05:00+02:00", 1).unwrap();
        match &model.get(id).unwrap().content {
            AnnotationContent::DateTime { iso, display } => {
                assert_eq!(iso, "2024-05-01T14:05:00+02:00");
                assert_eq!(display, "5/1/2024, 12:05:00 PM");
            }
            other => panic!("unexpected content {:?}", other),
        }

        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let mut model = AnnotationModel::default().with_display_offset(tokyo);
        let id = model.add_date_time("2024-05-01T23:30:00Z", 1).unwrap();
        assert!(matches!(
            &model.get(id).unwrap().content,
            AnnotationContent::DateTime { display, .. } if display == "5/2/2024, 8:30:00 AM"
        ));
    }

    #[test]
    fn test_image_sizing() {
        assert_eq!(image_box(&png(400, 100), SIGNATURE_MAX_WIDTH, None), (200.0, 50.0));
        assert_eq!(image_box(&png(120, 60), SIGNATURE_MAX_WIDTH, None), (120.0, 60.0));
        assert_eq!(image_box(&png(50, 400), STAMP_MAX_SIZE, Some(STAMP_MAX_SIZE)), (12.5, 100.0));
        assert_eq!(image_box(b"not an image", STAMP_MAX_SIZE, Some(STAMP_MAX_SIZE)), (100.0, 100.0));
    }

    #[test]
    fn test_new_entries_clamped_into_small_viewport() {
        let mut model = AnnotationModel::default();
        model.set_viewport(Some(Rect::new(0.0, 0.0, 120.0, 120.0)));
        let id = model.add_text("Approved", 1).unwrap();
        let vp = Rect::new(0.0, 0.0, 120.0, 120.0);
        assert!(vp.contains(&model.get(id).unwrap().screen_rect));
    }

    #[test]
    fn test_pointer_routed_to_entries() {
        let mut model = AnnotationModel::default();
        let id = model.add_text("drag me", 1).unwrap();
        // no viewport yet: nothing can move
        let down = PointerEvent::mouse(PointerPhase::Down, Point::new(55.0, 205.0), Some(id));
        assert_eq!(model.handle_pointer(&down), None);

        model.set_viewport(Some(Rect::new(0.0, 0.0, 918.0, 1188.0)));
        model.handle_pointer(&down);
        let mv = PointerEvent::mouse(PointerPhase::Move, Point::new(155.0, 305.0), None);
        assert_eq!(model.handle_pointer(&mv), Some(id));
        let rect = model.get(id).unwrap().screen_rect;
        assert_eq!((rect.left, rect.top), (150.0, 300.0));
    }

    #[test]
    fn test_clear_unsubscribes_everything() {
        let mut model = AnnotationModel::default();
        let a = model.add_text("a", 1).unwrap();
        let b = model.add_text("b", 1).unwrap();
        model.clear();
        assert!(model.is_empty());
        assert!(!model.drag().is_subscribed(a));
        assert!(!model.drag().is_subscribed(b));
    }
}
