//! Freehand signature capture.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, ImageResult, Rgba, RgbaImage};
use imageproc::drawing::draw_filled_circle_mut;
use serde::{Deserialize, Serialize};

use crate::geometry::Point;
use crate::{Precondition, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SignaturePadOptions {
    /// CSS pixels.
    pub width: u32,
    pub height: u32,
    /// Device pixel ratio; the raster is `width * pixel_ratio` wide.
    pub pixel_ratio: f32,
    pub line_width: f32,
}

impl Default for SignaturePadOptions {
    fn default() -> Self {
        Self {
            width: 400,
            height: 200,
            pixel_ratio: 1.0,
            line_width: 2.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignaturePad {
    options: SignaturePadOptions,
    strokes: Vec<Vec<Point>>,
    drawing: bool,
}

impl SignaturePad {
    pub fn new(options: SignaturePadOptions) -> Self {
        Self {
            options,
            strokes: Vec::new(),
            drawing: false,
        }
    }

    pub fn options(&self) -> &SignaturePadOptions {
        &self.options
    }

    /// Start a stroke. `point` is relative to the pad's top-left.
    pub fn pointer_down(&mut self, point: Point) {
        self.drawing = true;
        self.strokes.push(vec![point]);
    }

    pub fn pointer_move(&mut self, point: Point) {
        if !self.drawing {
            return;
        }
        if let Some(stroke) = self.strokes.last_mut() {
            stroke.push(point);
        }
    }

    pub fn pointer_up(&mut self) {
        self.drawing = false;
    }

    pub fn pointer_out(&mut self) {
        self.drawing = false;
    }

    pub fn clear(&mut self) {
        self.strokes.clear();
        self.drawing = false;
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.iter().all(|s| s.is_empty())
    }

    pub fn strokes(&self) -> &[Vec<Point>] {
        &self.strokes
    }

    /// The pad's PNG, or the empty-signature precondition when nothing was drawn.
    pub fn signature_png(&self) -> Result<Vec<u8>> {
        if self.is_empty() {
            return Err(Precondition::EmptySignature);
        }
        self.to_png().map_err(|e| {
            log::warn!("[Signature] PNG encoding failed: {}", e);
            Precondition::EmptySignature
        })
    }

    /// Rasterize the strokes onto a transparent canvas and encode it as PNG.
    pub fn to_png(&self) -> ImageResult<Vec<u8>> {
        let ratio = self.options.pixel_ratio.max(1.0);
        let width = ((self.options.width as f32) * ratio).round().max(1.0) as u32;
        let height = ((self.options.height as f32) * ratio).round().max(1.0) as u32;
        let radius = ((self.options.line_width * ratio) / 2.0).round().max(1.0) as i32;

        let mut canvas = RgbaImage::new(width, height);
        let ink = Rgba([0u8, 0u8, 0u8, 255u8]);

        for stroke in &self.strokes {
            let scaled: Vec<(f32, f32)> = stroke
                .iter()
                .map(|p| (p.x as f32 * ratio, p.y as f32 * ratio))
                .collect();
            if let [only] = scaled.as_slice() {
                stamp(&mut canvas, *only, radius, ink);
                continue;
            }
            for pair in scaled.windows(2) {
                draw_round_segment(&mut canvas, pair[0], pair[1], radius, ink);
            }
        }

        let mut out = Vec::new();
        DynamicImage::ImageRgba8(canvas).write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
        log::debug!("[Signature] rasterized {} strokes at {}x{}", self.strokes.len(), width, height);
        Ok(out)
    }
}

fn stamp(canvas: &mut RgbaImage, (x, y): (f32, f32), radius: i32, ink: Rgba<u8>) {
    draw_filled_circle_mut(canvas, (x.round() as i32, y.round() as i32), radius, ink);
}

/// A line with round caps and joins: discs stamped every half pixel.
fn draw_round_segment(canvas: &mut RgbaImage, from: (f32, f32), to: (f32, f32), radius: i32, ink: Rgba<u8>) {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let steps = ((dx.hypot(dy)) * 2.0).ceil().max(1.0) as u32;
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        stamp(canvas, (from.0 + dx * t, from.1 + dy * t), radius, ink);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pad_refuses_png() {
        let pad = SignaturePad::new(SignaturePadOptions::default());
        assert!(pad.is_empty());
        assert_eq!(pad.signature_png(), Err(Precondition::EmptySignature));
    }

    #[test]
    fn test_moves_without_down_are_ignored() {
        let mut pad = SignaturePad::new(SignaturePadOptions::default());
        pad.pointer_move(Point::new(1.0, 1.0));
        assert!(pad.is_empty());
        pad.pointer_down(Point::new(1.0, 1.0));
        pad.pointer_move(Point::new(5.0, 5.0));
        pad.pointer_out();
        pad.pointer_move(Point::new(9.0, 9.0));
        assert_eq!(pad.strokes(), &[vec![Point::new(1.0, 1.0), Point::new(5.0, 5.0)]]);
    }

    #[test]
    fn test_raster_size_and_ink() {
        let mut pad = SignaturePad::new(SignaturePadOptions {
            width: 100,
            height: 50,
            pixel_ratio: 2.0,
            line_width: 2.0,
        });
        pad.pointer_down(Point::new(10.0, 10.0));
        pad.pointer_move(Point::new(40.0, 20.0));
        pad.pointer_up();

        let png = pad.to_png().unwrap();
        let img = image::load_from_memory_with_format(&png, ImageFormat::Png).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (200, 100));
        // start of the stroke is inked, far corner stays transparent
        assert_eq!(img.get_pixel(20, 20)[3], 255);
        assert_eq!(img.get_pixel(199, 99)[3], 0);
    }

    #[test]
    fn test_clear_resets() {
        let mut pad = SignaturePad::new(SignaturePadOptions::default());
        pad.pointer_down(Point::new(3.0, 3.0));
        pad.pointer_up();
        assert!(!pad.is_empty());
        pad.clear();
        assert!(pad.is_empty());
    }
}
