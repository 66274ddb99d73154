//! Stroke geometry and styling shared by tools and raster surfaces.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EditorError;

/// Default stroke width in pixels.
pub const DEFAULT_STROKE_WIDTH: f32 = 5.0;

/// A point in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X position in canvas pixels.
    pub x: f32,
    /// Y position in canvas pixels.
    pub y: f32,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// An opaque RGB color, written as `#rrggbb` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Color {
    /// Black, the default stroke color.
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    /// White, the blank canvas color.
    pub const WHITE: Self = Self::rgb(255, 255, 255);

    /// Create a color from its channels.
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

impl FromStr for Color {
    type Err = EditorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s
            .strip_prefix('#')
            .filter(|h| h.len() == 6 && h.is_ascii())
            .ok_or_else(|| EditorError::Validation(format!("invalid color '{s}'")))?;

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16)
                .map_err(|_| EditorError::Validation(format!("invalid color '{s}'")))
        };

        Ok(Self::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl TryFrom<String> for Color {
    type Error = EditorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// How stroke pixels combine with the existing buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompositeMode {
    /// Source-over painting.
    #[default]
    Paint,
    /// Destination-out: removes alpha where the stroke covers.
    Erase,
}

/// Visual parameters of a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokeStyle {
    /// Stroke color (ignored when erasing).
    pub color: Color,
    /// Line width in pixels.
    pub width: f32,
    /// Opacity from 0.0 to 1.0.
    pub opacity: f32,
    /// Compositing mode.
    pub composite: CompositeMode,
}

impl StrokeStyle {
    /// A paint style with the given color, width and opacity.
    #[must_use]
    pub fn paint(color: Color, width: f32, opacity: f32) -> Self {
        Self {
            color,
            width: width.max(1.0),
            opacity: opacity.clamp(0.0, 1.0),
            composite: CompositeMode::Paint,
        }
    }

    /// An erase style with the given width and opacity.
    #[must_use]
    pub fn erase(width: f32, opacity: f32) -> Self {
        Self {
            composite: CompositeMode::Erase,
            ..Self::paint(Color::BLACK, width, opacity)
        }
    }
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self::paint(Color::BLACK, DEFAULT_STROKE_WIDTH, 1.0)
    }
}

/// An ordered polyline. A single point renders as a round dot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrokePath {
    points: Vec<Point>,
}

impl StrokePath {
    /// Start a path at `origin`.
    #[must_use]
    pub fn starting_at(origin: Point) -> Self {
        Self {
            points: vec![origin],
        }
    }

    /// A two-point segment.
    #[must_use]
    pub fn segment(from: Point, to: Point) -> Self {
        Self {
            points: vec![from, to],
        }
    }

    /// Append a point.
    pub fn push(&mut self, point: Point) {
        self.points.push(point);
    }

    /// All points in drawing order.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// The most recently added point.
    #[must_use]
    pub fn last(&self) -> Option<Point> {
        self.points.last().copied()
    }

    /// Whether the path is a single dot.
    #[must_use]
    pub fn is_dot(&self) -> bool {
        self.points.len() == 1
    }
}
