//! # Retouch Core
//!
//! Editing history and canvas-state engine for the Retouch image editor.
//! No I/O lives here: pixels sit behind [`RasterSurface`] and remote image
//! operations behind [`TransformGateway`].
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                EditorSession                │
//! ├──────────────────────┬──────────────────────┤
//! │  ToolDispatcher      │  TransformGateway    │
//! │  - brush / eraser    │  - filter / resize   │
//! │  - pointer → stroke  │  - rotate / crop     │
//! │                      │  - save              │
//! ├──────────────────────┴──────────────────────┤
//! │  HistoryEngine       │  ViewState           │
//! │  - commit / undo     │  - zoom / fit        │
//! │  - redo / restore    │  - view → canvas     │
//! └─────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod event;
pub mod gateway;
pub mod history;
pub mod session;
pub mod stroke;
pub mod surface;
pub mod tool;
pub mod upload;
pub mod view;

pub use error::{EditorError, EditorResult};
pub use event::{EditorCommand, KeyEvent, KeyModifiers, PointerEvent, PointerPhase};
pub use gateway::{
    run_transform, upload_image, FilterKind, GatewayError, OfflineGateway, RemoteImageRef,
    SaveFormat, TransformGateway, TransformOperation, TransformOutcome, TransformRequest,
    TransformTicket,
};
pub use history::{HistoryEngine, Snapshot};
pub use session::{
    EditorSession, HistoryEntry, HistoryView, PointerOutcome, SessionConfig, TransformCompletion,
};
pub use stroke::{Color, CompositeMode, Point, StrokePath, StrokeStyle};
pub use surface::RasterSurface;
pub use tool::{StrokeFinished, Tool, ToolDispatcher, ToolState};
pub use upload::{ImageUpload, UploadFormat, MAX_UPLOAD_BYTES};
pub use view::ViewState;

/// Retouch core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
