//! Raster surface capability.
//!
//! The session never touches pixels directly; it drives an implementation of
//! [`RasterSurface`]. `retouch-raster` provides one backed by the `image`
//! crate.

use crate::error::EditorResult;
use crate::history::Snapshot;
use crate::stroke::{StrokePath, StrokeStyle};

/// An addressable pixel buffer that can be drawn into and snapshotted.
pub trait RasterSurface {
    /// Replace the buffer with a decoded image or snapshot.
    ///
    /// Implementations must leave the buffer untouched when decoding fails.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EditorError::Surface`] if the bytes cannot be decoded.
    fn load_from(&mut self, bytes: &[u8]) -> EditorResult<()>;

    /// Serialize the full buffer.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EditorError::Surface`] if encoding fails.
    fn serialize(&self) -> EditorResult<Snapshot>;

    /// Paint `path` with `style`. Drawing cannot fail; pixels outside the
    /// buffer are clipped.
    fn draw_stroke(&mut self, path: &StrokePath, style: &StrokeStyle);

    /// Buffer size as `(width, height)`.
    fn dimensions(&self) -> (u32, u32);
}

impl<S: RasterSurface + ?Sized> RasterSurface for Box<S> {
    fn load_from(&mut self, bytes: &[u8]) -> EditorResult<()> {
        (**self).load_from(bytes)
    }

    fn serialize(&self) -> EditorResult<Snapshot> {
        (**self).serialize()
    }

    fn draw_stroke(&mut self, path: &StrokePath, style: &StrokeStyle) {
        (**self).draw_stroke(path, style);
    }

    fn dimensions(&self) -> (u32, u32) {
        (**self).dimensions()
    }
}
