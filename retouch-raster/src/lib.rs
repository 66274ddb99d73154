//! # Retouch Raster
//!
//! In-memory [`RasterSurface`](retouch_core::RasterSurface) backed by the
//! `image` crate.
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               PixelSurface                  │
//! ├──────────────────────┬──────────────────────┤
//! │  draw_stroke         │  load_from/serialize │
//! │  - paint (src-over)  │  - any input format  │
//! │  - erase (dst-out)   │  - PNG snapshots     │
//! └──────────────────────┴──────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod image;
pub mod surface;

pub use error::{RasterError, RasterResult};
pub use surface::PixelSurface;
