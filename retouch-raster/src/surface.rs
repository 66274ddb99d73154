//! RGBA pixel surface.
//!
//! Strokes are stamped as capsules (round caps and joins) with hard edges.
//! Paint composites source-over; erase is destination-out.

use image::{Rgba, RgbaImage};
use retouch_core::{
    Color, CompositeMode, EditorResult, Point, RasterSurface, Snapshot, StrokePath, StrokeStyle,
};

use crate::image::{decode_rgba, encode_png};

/// An in-memory RGBA canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelSurface {
    pixels: RgbaImage,
}

impl Default for PixelSurface {
    fn default() -> Self {
        Self::blank(
            retouch_core::session::DEFAULT_CANVAS_WIDTH,
            retouch_core::session::DEFAULT_CANVAS_HEIGHT,
        )
    }
}

impl PixelSurface {
    /// An opaque white canvas. Zero dimensions are bumped to one pixel.
    #[must_use]
    pub fn blank(width: u32, height: u32) -> Self {
        Self::filled(width, height, Color::WHITE)
    }

    /// An opaque canvas of one color.
    #[must_use]
    pub fn filled(width: u32, height: u32, color: Color) -> Self {
        Self {
            pixels: RgbaImage::from_pixel(
                width.max(1),
                height.max(1),
                Rgba([color.r, color.g, color.b, 255]),
            ),
        }
    }

    /// Wrap existing pixels.
    #[must_use]
    pub fn from_pixels(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    /// The pixel buffer.
    #[must_use]
    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// One pixel as `[r, g, b, a]`, or `None` outside the canvas.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.pixels.get_pixel_checked(x, y).map(|p| p.0)
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn stamp_capsule(&mut self, from: Point, to: Point, style: &StrokeStyle) {
        if ![from.x, from.y, to.x, to.y].iter().all(|v| v.is_finite()) {
            return;
        }
        let radius = style.width / 2.0;
        let (w, h) = self.pixels.dimensions();

        let min_x = (from.x.min(to.x) - radius).floor().max(0.0);
        let min_y = (from.y.min(to.y) - radius).floor().max(0.0);
        let max_x = (from.x.max(to.x) + radius).ceil().min(w as f32 - 1.0);
        let max_y = (from.y.max(to.y) + radius).ceil().min(h as f32 - 1.0);
        if min_x > max_x || min_y > max_y {
            return;
        }

        let alpha = style.opacity;
        let reach = f64::from(radius);
        for y in (min_y as u32)..=(max_y as u32) {
            for x in (min_x as u32)..=(max_x as u32) {
                let center = (f64::from(x) + 0.5, f64::from(y) + 0.5);
                let distance = distance_to_segment(center, from, to);
                if !distance.is_finite() || distance > reach {
                    continue;
                }
                let pixel = self.pixels.get_pixel_mut(x, y);
                match style.composite {
                    CompositeMode::Paint => blend_over(pixel, style.color, alpha),
                    CompositeMode::Erase => erase(pixel, alpha),
                }
            }
        }
    }
}

/// Distance from a pixel center to the segment `a`-`b`, in f64.
///
/// Between the endpoints the implicit line form is used, so endpoints far
/// outside the canvas do not swamp the pixel offsets.
fn distance_to_segment((px, py): (f64, f64), a: Point, b: Point) -> f64 {
    let (ax, ay) = (f64::from(a.x), f64::from(a.y));
    let (bx, by) = (f64::from(b.x), f64::from(b.y));
    let (dx, dy) = (bx - ax, by - ay);
    let len_sq = dx * dx + dy * dy;
    if len_sq <= f64::EPSILON {
        return (px - ax).hypot(py - ay);
    }
    let t = ((px - ax) * dx + (py - ay) * dy) / len_sq;
    if t <= 0.0 {
        (px - ax).hypot(py - ay)
    } else if t >= 1.0 {
        (px - bx).hypot(py - by)
    } else {
        let offset = ax * by - ay * bx;
        (dx * py - dy * px + offset).abs() / len_sq.sqrt()
    }
}

/// Straight-alpha source-over.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn blend_over(dst: &mut Rgba<u8>, color: Color, src_alpha: f32) {
    let dst_alpha = f32::from(dst[3]) / 255.0;
    let out_alpha = src_alpha + dst_alpha * (1.0 - src_alpha);
    if out_alpha <= 0.0 {
        return;
    }
    let src = [color.r, color.g, color.b];
    for (channel, &s) in src.iter().enumerate() {
        let d = f32::from(dst[channel]);
        let value = (f32::from(s) * src_alpha + d * dst_alpha * (1.0 - src_alpha)) / out_alpha;
        dst[channel] = value.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_alpha * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// Destination-out: color is kept, alpha shrinks.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn erase(dst: &mut Rgba<u8>, src_alpha: f32) {
    let remaining = f32::from(dst[3]) * (1.0 - src_alpha);
    dst[3] = remaining.round().clamp(0.0, 255.0) as u8;
}

impl RasterSurface for PixelSurface {
    fn load_from(&mut self, bytes: &[u8]) -> EditorResult<()> {
        let decoded = decode_rgba(bytes)?;
        tracing::debug!(
            width = decoded.width(),
            height = decoded.height(),
            "Surface loaded"
        );
        self.pixels = decoded;
        Ok(())
    }

    fn serialize(&self) -> EditorResult<Snapshot> {
        Ok(Snapshot::new(encode_png(&self.pixels)?))
    }

    fn draw_stroke(&mut self, path: &StrokePath, style: &StrokeStyle) {
        match path.points() {
            [] => {}
            [only] => self.stamp_capsule(*only, *only, style),
            points => {
                for pair in points.windows(2) {
                    self.stamp_capsule(pair[0], pair[1], style);
                }
            }
        }
    }

    fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}
