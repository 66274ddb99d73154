//! Zoom and view-to-canvas mapping.
//!
//! View state is presentational: it is never committed to history and undo
//! does not touch it.

use serde::{Deserialize, Serialize};

use crate::stroke::Point;

/// Smallest zoom factor.
pub const MIN_ZOOM: f32 = 0.1;
/// Largest zoom factor.
pub const MAX_ZOOM: f32 = 5.0;
/// Multiplier applied by one zoom-in step.
pub const ZOOM_STEP: f32 = 1.2;
/// Padding (pixels) left around the canvas by [`ViewState::fit_to`].
pub const FIT_MARGIN: f32 = 40.0;

/// Current zoom factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    zoom: f32,
}

impl Default for ViewState {
    fn default() -> Self {
        Self { zoom: 1.0 }
    }
}

impl ViewState {
    /// Create a view at 100 %.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current zoom factor.
    #[must_use]
    pub const fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Zoom as a rounded percentage, as shown in the zoom indicator.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn percent(&self) -> u32 {
        // zoom is clamped to [0.1, 5.0], so the product fits
        (self.zoom * 100.0).round() as u32
    }

    /// Set the zoom factor, clamped to `[MIN_ZOOM, MAX_ZOOM]`. Non-finite
    /// input resets to 1.0.
    pub fn set_zoom(&mut self, zoom: f32) -> f32 {
        self.zoom = if zoom.is_finite() {
            zoom.clamp(MIN_ZOOM, MAX_ZOOM)
        } else {
            1.0
        };
        self.zoom
    }

    /// Zoom in by one step.
    pub fn zoom_in(&mut self) -> f32 {
        self.set_zoom(self.zoom * ZOOM_STEP)
    }

    /// Zoom out by one step.
    pub fn zoom_out(&mut self) -> f32 {
        self.set_zoom(self.zoom / ZOOM_STEP)
    }

    /// Back to 100 %.
    pub fn reset(&mut self) -> f32 {
        self.set_zoom(1.0)
    }

    /// Fit a `canvas_width`x`canvas_height` canvas into a container, never
    /// enlarging past 100 %.
    pub fn fit_to(
        &mut self,
        container_width: f32,
        container_height: f32,
        canvas_width: u32,
        canvas_height: u32,
    ) -> f32 {
        if canvas_width == 0 || canvas_height == 0 {
            return self.reset();
        }
        #[allow(clippy::cast_precision_loss)]
        let (w, h) = (canvas_width as f32, canvas_height as f32);
        let scale_x = (container_width - FIT_MARGIN) / w;
        let scale_y = (container_height - FIT_MARGIN) / h;
        self.set_zoom(scale_x.min(scale_y).min(1.0))
    }

    /// Convert a pointer position in view space into canvas pixels.
    #[must_use]
    pub fn to_canvas(&self, x: f32, y: f32) -> Point {
        Point::new(x / self.zoom, y / self.zoom)
    }
}
