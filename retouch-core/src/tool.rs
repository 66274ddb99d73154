//! Tool dispatch: pointer drags to surface mutations.
//!
//! The dispatcher paints but never persists. When a stroke ends it hands a
//! [`StrokeFinished`] back to the caller, which is expected to commit.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EditorError;
use crate::stroke::{Color, Point, StrokePath, StrokeStyle, DEFAULT_STROKE_WIDTH};
use crate::surface::RasterSurface;

/// Editor tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    /// Selection; does not draw.
    #[default]
    Select,
    /// Freehand painting.
    Brush,
    /// Freehand erasing.
    Eraser,
    /// Text placement; does not draw here.
    Text,
    /// Crop region picking; cropping itself is a remote transform.
    Crop,
    /// Shape drawing; does not draw here.
    Shapes,
}

impl Tool {
    /// All tools in toolbar order.
    pub const ALL: [Self; 6] = [
        Self::Select,
        Self::Brush,
        Self::Eraser,
        Self::Text,
        Self::Crop,
        Self::Shapes,
    ];

    /// Whether pointer drags with this tool mutate pixels.
    #[must_use]
    pub const fn strokes(self) -> bool {
        matches!(self, Self::Brush | Self::Eraser)
    }

    /// CSS-style cursor hint for the tool.
    #[must_use]
    pub const fn cursor(self) -> &'static str {
        match self {
            Self::Select => "default",
            Self::Text => "text",
            Self::Brush | Self::Eraser | Self::Crop | Self::Shapes => "crosshair",
        }
    }

    /// Lowercase identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Brush => "brush",
            Self::Eraser => "eraser",
            Self::Text => "text",
            Self::Crop => "crop",
            Self::Shapes => "shapes",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tool {
    type Err = EditorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tool| tool.as_str() == s)
            .ok_or_else(|| EditorError::Validation(format!("unknown tool '{s}'")))
    }
}

/// Active tool and stroke settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToolState {
    /// Currently selected tool.
    pub active_tool: Tool,
    /// Brush color.
    pub stroke_color: Color,
    /// Line width in pixels.
    pub stroke_width: f32,
    /// Opacity from 0.0 to 1.0.
    pub opacity: f32,
    /// Whether a stroke is in progress.
    pub is_stroking: bool,
}

impl Default for ToolState {
    fn default() -> Self {
        Self {
            active_tool: Tool::default(),
            stroke_color: Color::BLACK,
            stroke_width: DEFAULT_STROKE_WIDTH,
            opacity: 1.0,
            is_stroking: false,
        }
    }
}

impl ToolState {
    /// Style for a stroke started with the active tool.
    ///
    /// Eraser strokes use the erase composite; everything else paints.
    #[must_use]
    pub fn style(&self) -> StrokeStyle {
        match self.active_tool {
            Tool::Eraser => StrokeStyle::erase(self.stroke_width, self.opacity),
            _ => StrokeStyle::paint(self.stroke_color, self.stroke_width, self.opacity),
        }
    }
}

/// Emitted when a stroke is finalized; the receiver owes exactly one commit.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeFinished {
    /// Tool that produced the stroke.
    pub tool: Tool,
    /// Full path of the stroke.
    pub path: StrokePath,
}

#[derive(Debug, Clone)]
struct ActiveStroke {
    tool: Tool,
    style: StrokeStyle,
    path: StrokePath,
}

/// Turns pointer gestures into [`RasterSurface`] draws.
#[derive(Debug, Clone, Default)]
pub struct ToolDispatcher {
    state: ToolState,
    stroke: Option<ActiveStroke>,
}

impl ToolDispatcher {
    /// Create a dispatcher with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dispatcher with the given settings.
    #[must_use]
    pub fn with_state(state: ToolState) -> Self {
        Self {
            state: ToolState {
                is_stroking: false,
                ..state
            },
            stroke: None,
        }
    }

    /// Current tool settings.
    #[must_use]
    pub fn state(&self) -> &ToolState {
        &self.state
    }

    /// Select a tool. An in-progress stroke keeps its own tool and style.
    pub fn set_tool(&mut self, tool: Tool) {
        self.state.active_tool = tool;
    }

    /// Set the brush color.
    pub fn set_color(&mut self, color: Color) {
        self.state.stroke_color = color;
    }

    /// Set the line width (at least one pixel).
    pub fn set_width(&mut self, width: f32) {
        self.state.stroke_width = width.max(1.0);
    }

    /// Set the opacity, clamped to `[0, 1]`.
    pub fn set_opacity(&mut self, opacity: f32) {
        self.state.opacity = opacity.clamp(0.0, 1.0);
    }

    /// Whether a stroke is in progress.
    #[must_use]
    pub fn is_stroking(&self) -> bool {
        self.stroke.is_some()
    }

    /// Start a stroke at `point`.
    ///
    /// Returns `false` (and stays inactive) for tools that do not stroke.
    /// While a stroke is active the call is ignored; the caller ends the
    /// stroke first if it wants a new one.
    pub fn begin_stroke(&mut self, tool: Tool, point: Point, style: StrokeStyle) -> bool {
        if self.stroke.is_some() {
            return true;
        }
        if !tool.strokes() {
            return false;
        }
        self.stroke = Some(ActiveStroke {
            tool,
            style,
            path: StrokePath::starting_at(point),
        });
        self.state.is_stroking = true;
        tracing::trace!(%tool, x = point.x, y = point.y, "Stroke started");
        true
    }

    /// Start a stroke with the active tool and current settings.
    pub fn pointer_down(&mut self, point: Point) -> bool {
        let tool = self.state.active_tool;
        let style = self.state.style();
        self.begin_stroke(tool, point, style)
    }

    /// Paint a segment from the previous point to `point`.
    ///
    /// Silent no-op while no stroke is active.
    pub fn extend_stroke<S: RasterSurface + ?Sized>(&mut self, surface: &mut S, point: Point) {
        let Some(stroke) = self.stroke.as_mut() else {
            return;
        };
        if let Some(last) = stroke.path.last() {
            surface.draw_stroke(&StrokePath::segment(last, point), &stroke.style);
        }
        stroke.path.push(point);
    }

    /// Finalize the active stroke.
    ///
    /// A stroke with no segments is painted as a dot. Returns `None` when no
    /// stroke was active.
    pub fn end_stroke<S: RasterSurface + ?Sized>(
        &mut self,
        surface: &mut S,
    ) -> Option<StrokeFinished> {
        let stroke = self.stroke.take()?;
        if stroke.path.is_dot() {
            surface.draw_stroke(&stroke.path, &stroke.style);
        }
        self.state.is_stroking = false;
        tracing::trace!(
            tool = %stroke.tool,
            points = stroke.path.points().len(),
            "Stroke finished"
        );
        Some(StrokeFinished {
            tool: stroke.tool,
            path: stroke.path,
        })
    }
}
