//! # Editor Session
//!
//! The single orchestration point for one open image. Every externally
//! visible state change passes through here and is committed to the
//! [`HistoryEngine`] exactly once:
//!
//! ```text
//!  pointer ──► ToolDispatcher ──► StrokeFinished ──┐
//!  upload  ──► validate ──► surface.load_from ─────┼──► history.commit
//!  transform ► gateway ──► surface.load_from ──────┘
//!  undo / redo / restore ──► history ──► surface.load_from   (no commit)
//! ```
//!
//! A session is single-threaded. While a transform is in flight the
//! surface is frozen: strokes, loads, history navigation and a second
//! transform fail with [`EditorError::TransformPending`].

use serde::Serialize;

use crate::error::{EditorError, EditorResult};
use crate::event::{EditorCommand, KeyEvent, PointerEvent, PointerPhase};
use crate::gateway::{
    run_transform, upload_image, GatewayError, RemoteImageRef, SaveFormat, TransformGateway,
    TransformOperation, TransformOutcome, TransformRequest, TransformTicket,
};
use crate::history::{HistoryEngine, Snapshot};
use crate::stroke::{Color, Point};
use crate::surface::RasterSurface;
use crate::tool::{Tool, ToolDispatcher, ToolState};
use crate::upload::ImageUpload;
use crate::view::ViewState;

/// Width of a fresh canvas.
pub const DEFAULT_CANVAS_WIDTH: u32 = 800;
/// Height of a fresh canvas.
pub const DEFAULT_CANVAS_HEIGHT: u32 = 600;

/// Settings for a new session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    /// Blank canvas width; used by hosts to build the surface.
    pub canvas_width: u32,
    /// Blank canvas height; used by hosts to build the surface.
    pub canvas_height: u32,
    /// Initial tool settings.
    pub tool: ToolState,
    /// Maximum history length; `None` keeps everything.
    pub history_limit: Option<usize>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            canvas_width: DEFAULT_CANVAS_WIDTH,
            canvas_height: DEFAULT_CANVAS_HEIGHT,
            tool: ToolState::default(),
            history_limit: None,
        }
    }
}

/// Result of feeding one pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerOutcome {
    /// Nothing happened (non-drawing tool or no active stroke).
    Ignored,
    /// A stroke is in progress.
    Stroking,
    /// A stroke finished and was committed.
    Committed,
}

/// Result of completing a transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformCompletion {
    /// The returned image was loaded and committed.
    Applied(RemoteImageRef),
    /// The canvas was stored remotely; history is untouched.
    Saved(RemoteImageRef),
    /// The completion was stale or arrived after shutdown and was dropped.
    Discarded,
}

/// One row of the history browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    /// Index to pass to `restore`.
    pub index: usize,
    /// Display label ("State 1", "State 2", ...).
    pub label: String,
    /// Whether this is the entry shown.
    pub current: bool,
}

/// Snapshot of the history for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryView {
    /// Current position, `None` while empty.
    pub position: Option<usize>,
    /// Number of entries.
    pub len: usize,
    /// Entries, oldest first.
    pub entries: Vec<HistoryEntry>,
    /// Whether undo would move.
    pub can_undo: bool,
    /// Whether redo would move.
    pub can_redo: bool,
}

/// Remote copy of a snapshot.
#[derive(Debug, Clone)]
struct RemoteBinding {
    reference: RemoteImageRef,
    snapshot: Snapshot,
}

#[derive(Debug, Clone)]
struct PendingTransform {
    generation: u64,
    operation: &'static str,
    produces_image: bool,
}

/// An editing session over a raster surface.
#[derive(Debug)]
pub struct EditorSession<S: RasterSurface> {
    surface: S,
    history: HistoryEngine,
    tools: ToolDispatcher,
    view: ViewState,
    remote: Option<RemoteBinding>,
    pending: Option<PendingTransform>,
    next_generation: u64,
    alive: bool,
}

impl<S: RasterSurface> EditorSession<S> {
    /// Create a session over `surface`. The initial surface contents are
    /// shown but not committed.
    pub fn new(surface: S, config: SessionConfig) -> Self {
        let history = config
            .history_limit
            .map_or_else(HistoryEngine::new, HistoryEngine::with_capacity_limit);
        Self {
            surface,
            history,
            tools: ToolDispatcher::with_state(config.tool),
            view: ViewState::new(),
            remote: None,
            pending: None,
            next_generation: 0,
            alive: true,
        }
    }

    fn ensure_alive(&self) -> EditorResult<()> {
        if self.alive {
            Ok(())
        } else {
            Err(EditorError::SessionClosed)
        }
    }

    /// Alive and no transform in flight.
    fn ensure_idle(&self) -> EditorResult<()> {
        self.ensure_alive()?;
        if self.pending.is_some() {
            return Err(EditorError::TransformPending);
        }
        Ok(())
    }

    fn commit_surface(&mut self) -> EditorResult<Snapshot> {
        let snapshot = self.surface.serialize()?;
        self.history.commit(snapshot.clone());
        Ok(snapshot)
    }

    /// Finalize a stroke left open, committing it.
    fn finish_stroke(&mut self) -> EditorResult<bool> {
        match self.tools.end_stroke(&mut self.surface) {
            Some(_) => {
                self.commit_surface()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ---------------------------------------------------------------------
    // Loading
    // ---------------------------------------------------------------------

    /// Validate `upload`, load it into the surface and commit once.
    ///
    /// `remote` is the gateway's copy of the same file, if it was uploaded.
    ///
    /// # Errors
    ///
    /// Fails with [`EditorError::Validation`] or [`EditorError::Surface`]
    /// without touching history or pixels, or with
    /// [`EditorError::TransformPending`] / [`EditorError::SessionClosed`].
    pub fn load_image(
        &mut self,
        upload: &ImageUpload,
        remote: Option<RemoteImageRef>,
    ) -> EditorResult<()> {
        self.ensure_idle()?;
        let format = upload.validate()?;
        self.finish_stroke()?;
        self.surface.load_from(&upload.bytes)?;
        let snapshot = self.commit_surface()?;
        self.remote = remote.map(|reference| RemoteBinding {
            reference,
            snapshot,
        });

        let (width, height) = self.surface.dimensions();
        tracing::info!(
            file = %upload.file_name,
            %format,
            width,
            height,
            remote = self.remote.is_some(),
            "Image loaded"
        );
        Ok(())
    }

    /// Upload through `gateway`, then load locally.
    ///
    /// With an [`OfflineGateway`](crate::gateway::OfflineGateway) the image is
    /// loaded without a remote copy; it is uploaded on the first transform.
    ///
    /// # Errors
    ///
    /// See [`Self::load_image`]; gateway failures other than offline surface
    /// as [`EditorError::Gateway`].
    pub async fn open_upload<G: TransformGateway + ?Sized>(
        &mut self,
        gateway: &G,
        upload: &ImageUpload,
    ) -> EditorResult<()> {
        self.ensure_idle()?;
        let remote = upload_image(gateway, upload).await?;
        self.load_image(upload, remote)
    }

    // ---------------------------------------------------------------------
    // Tools and pointer input
    // ---------------------------------------------------------------------

    /// Current tool settings.
    #[must_use]
    pub fn tool_state(&self) -> &ToolState {
        self.tools.state()
    }

    /// Select a tool.
    pub fn set_tool(&mut self, tool: Tool) {
        self.tools.set_tool(tool);
    }

    /// Set the brush color.
    pub fn set_color(&mut self, color: Color) {
        self.tools.set_color(color);
    }

    /// Set the stroke width.
    pub fn set_stroke_width(&mut self, width: f32) {
        self.tools.set_width(width);
    }

    /// Set the stroke opacity.
    pub fn set_opacity(&mut self, opacity: f32) {
        self.tools.set_opacity(opacity);
    }

    /// Start a stroke at a canvas-space point with the active tool.
    ///
    /// A stroke still open from a missed pointer-up is committed first.
    ///
    /// # Errors
    ///
    /// [`EditorError::TransformPending`] or [`EditorError::SessionClosed`].
    pub fn begin_stroke(&mut self, point: Point) -> EditorResult<bool> {
        self.ensure_idle()?;
        self.finish_stroke()?;
        Ok(self.tools.pointer_down(point))
    }

    /// Extend the active stroke to a canvas-space point.
    ///
    /// # Errors
    ///
    /// [`EditorError::SessionClosed`].
    pub fn extend_stroke(&mut self, point: Point) -> EditorResult<()> {
        self.ensure_alive()?;
        self.tools.extend_stroke(&mut self.surface, point);
        Ok(())
    }

    /// End the active stroke and commit it. Returns whether a commit happened.
    ///
    /// # Errors
    ///
    /// [`EditorError::SessionClosed`] or a surface encoding failure.
    pub fn end_stroke(&mut self) -> EditorResult<bool> {
        self.ensure_alive()?;
        self.finish_stroke()
    }

    /// Feed a pointer event in view coordinates.
    ///
    /// # Errors
    ///
    /// See [`Self::begin_stroke`] and [`Self::end_stroke`].
    pub fn pointer(&mut self, event: PointerEvent) -> EditorResult<PointerOutcome> {
        if event.phase.ends_stroke() {
            return Ok(if self.end_stroke()? {
                PointerOutcome::Committed
            } else {
                PointerOutcome::Ignored
            });
        }

        let point = self.view.to_canvas(event.x, event.y);
        let stroking = if event.phase == PointerPhase::Down {
            self.begin_stroke(point)?
        } else {
            self.extend_stroke(point)?;
            self.tools.is_stroking()
        };
        Ok(if stroking {
            PointerOutcome::Stroking
        } else {
            PointerOutcome::Ignored
        })
    }

    // ---------------------------------------------------------------------
    // History
    // ---------------------------------------------------------------------

    fn navigate(
        &mut self,
        step: impl FnOnce(&mut HistoryEngine) -> EditorResult<Snapshot>,
    ) -> EditorResult<Snapshot> {
        self.ensure_idle()?;
        self.finish_stroke()?;
        let before = self.history.position();
        let snapshot = step(&mut self.history)?;
        if self.history.position() != before {
            if let Err(err) = self.surface.load_from(snapshot.as_bytes()) {
                if let Some(index) = before {
                    // Snapshot would not decode; put the cursor back.
                    let _ = self.history.restore(index);
                }
                return Err(err);
            }
        }
        Ok(snapshot)
    }

    /// Step back one state and redraw. No-op at the oldest state.
    ///
    /// # Errors
    ///
    /// [`EditorError::EmptyHistory`] before the first commit, or
    /// [`EditorError::TransformPending`] / [`EditorError::SessionClosed`].
    pub fn undo(&mut self) -> EditorResult<Snapshot> {
        self.navigate(HistoryEngine::undo)
    }

    /// Step forward one state and redraw. No-op at the newest state.
    ///
    /// # Errors
    ///
    /// Same as [`Self::undo`].
    pub fn redo(&mut self) -> EditorResult<Snapshot> {
        self.navigate(HistoryEngine::redo)
    }

    /// Jump to history entry `index` and redraw. Never commits.
    ///
    /// # Errors
    ///
    /// [`EditorError::OutOfRange`] for a bad index, plus the errors of
    /// [`Self::undo`].
    pub fn restore(&mut self, index: usize) -> EditorResult<Snapshot> {
        self.ensure_idle()?;
        // Checked against the entries shown, before an open stroke commits.
        let len = self.history.len();
        if index >= len {
            return Err(EditorError::OutOfRange { index, len });
        }
        self.navigate(|history| history.restore(index))
    }

    /// The committed snapshot currently shown.
    ///
    /// # Errors
    ///
    /// [`EditorError::EmptyHistory`] before the first commit.
    pub fn current_snapshot(&self) -> EditorResult<Snapshot> {
        self.history.current()
    }

    /// Encode the surface as it is right now, including uncommitted strokes.
    ///
    /// # Errors
    ///
    /// Surface encoding failures.
    pub fn render(&self) -> EditorResult<Snapshot> {
        self.surface.serialize()
    }

    /// The underlying history.
    #[must_use]
    pub fn history(&self) -> &HistoryEngine {
        &self.history
    }

    /// History browser model.
    #[must_use]
    pub fn history_view(&self) -> HistoryView {
        let position = self.history.position();
        let entries = (0..self.history.len())
            .map(|index| HistoryEntry {
                index,
                label: format!("State {}", index + 1),
                current: Some(index) == position,
            })
            .collect();
        HistoryView {
            position,
            len: self.history.len(),
            entries,
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
        }
    }

    // ---------------------------------------------------------------------
    // Transforms
    // ---------------------------------------------------------------------

    /// Issue a transform. Finalizes any open stroke first, then freezes the
    /// surface until [`Self::complete_transform`] is called with the
    /// ticket's generation.
    ///
    /// # Errors
    ///
    /// - [`EditorError::Validation`] for bad parameters
    /// - [`EditorError::NoImage`] for an image operation on an empty history
    /// - [`EditorError::TransformPending`] / [`EditorError::SessionClosed`]
    pub fn begin_transform(&mut self, operation: TransformOperation) -> EditorResult<TransformTicket> {
        self.ensure_idle()?;
        operation.validate(self.surface.dimensions())?;
        self.finish_stroke()?;

        let produces_image = operation.produces_image();
        let source = if produces_image {
            self.history.current().map_err(|_| EditorError::NoImage)?
        } else {
            // Save works on the blank canvas too.
            match self.history.current() {
                Ok(snapshot) => snapshot,
                Err(_) => self.surface.serialize()?,
            }
        };

        let resource_id = if produces_image {
            self.remote
                .as_ref()
                .filter(|binding| binding.snapshot == source)
                .map(|binding| binding.reference.resource_id.clone())
        } else {
            None
        };
        let image_data = (!produces_image).then(|| source.clone());

        let generation = self.next_generation;
        self.next_generation += 1;
        self.pending = Some(PendingTransform {
            generation,
            operation: operation.name(),
            produces_image,
        });
        tracing::info!(
            generation,
            operation = operation.name(),
            resource = resource_id.as_deref().unwrap_or("<local>"),
            "Transform issued"
        );

        Ok(TransformTicket {
            generation,
            request: TransformRequest {
                resource_id,
                operation,
                image_data,
            },
            source,
        })
    }

    /// Apply the gateway's answer for ticket `generation`.
    ///
    /// Stale generations and completions after [`Self::shutdown`] are
    /// discarded. On failure history and pixels are left exactly as they
    /// were before the transform was issued.
    ///
    /// # Errors
    ///
    /// [`EditorError::Gateway`] if the service failed, or
    /// [`EditorError::Surface`] if its image could not be decoded.
    pub fn complete_transform(
        &mut self,
        generation: u64,
        result: Result<TransformOutcome, GatewayError>,
    ) -> EditorResult<TransformCompletion> {
        if !self.alive {
            tracing::warn!(generation, "Discarding transform completion for closed session");
            return Ok(TransformCompletion::Discarded);
        }
        let pending = match self.pending.take() {
            Some(pending) if pending.generation == generation => pending,
            other => {
                tracing::warn!(generation, "Discarding stale transform completion");
                self.pending = other;
                return Ok(TransformCompletion::Discarded);
            }
        };

        let outcome = result.map_err(|err| {
            tracing::warn!(operation = pending.operation, error = %err, "Transform failed");
            EditorError::gateway(pending.operation, err.to_string())
        })?;

        if let Some(uploaded) = outcome.uploaded {
            if let Ok(source) = self.history.current() {
                self.remote = Some(RemoteBinding {
                    reference: uploaded,
                    snapshot: source,
                });
            }
        }

        if !pending.produces_image {
            tracing::info!(saved = %outcome.reference, "Canvas saved");
            return Ok(TransformCompletion::Saved(outcome.reference));
        }

        let image = outcome.image.ok_or_else(|| {
            EditorError::gateway(pending.operation, "response carried no image")
        })?;
        self.surface.load_from(&image)?;
        let snapshot = self.commit_surface()?;
        self.remote = Some(RemoteBinding {
            reference: outcome.reference.clone(),
            snapshot,
        });
        tracing::info!(
            operation = pending.operation,
            result = %outcome.reference,
            "Transform applied"
        );
        Ok(TransformCompletion::Applied(outcome.reference))
    }

    /// Issue, run and complete a transform in one call.
    ///
    /// # Errors
    ///
    /// See [`Self::begin_transform`] and [`Self::complete_transform`].
    pub async fn apply_transform<G: TransformGateway + ?Sized>(
        &mut self,
        gateway: &G,
        operation: TransformOperation,
    ) -> EditorResult<TransformCompletion> {
        let ticket = self.begin_transform(operation)?;
        let result = run_transform(gateway, &ticket).await;
        self.complete_transform(ticket.generation, result)
    }

    /// Store the current canvas through the gateway. Never commits.
    ///
    /// # Errors
    ///
    /// See [`Self::apply_transform`].
    pub async fn save<G: TransformGateway + ?Sized>(
        &mut self,
        gateway: &G,
        format: SaveFormat,
    ) -> EditorResult<RemoteImageRef> {
        match self
            .apply_transform(gateway, TransformOperation::Save { format })
            .await?
        {
            TransformCompletion::Saved(reference) | TransformCompletion::Applied(reference) => {
                Ok(reference)
            }
            TransformCompletion::Discarded => Err(EditorError::SessionClosed),
        }
    }

    /// Whether a transform is in flight.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Remote copy of the current state, if the gateway has one.
    #[must_use]
    pub fn remote_ref(&self) -> Option<&RemoteImageRef> {
        let binding = self.remote.as_ref()?;
        let current = self.history.current().ok()?;
        (binding.snapshot == current).then_some(&binding.reference)
    }

    // ---------------------------------------------------------------------
    // Keyboard
    // ---------------------------------------------------------------------

    /// Execute a shortcut command.
    ///
    /// # Errors
    ///
    /// Errors of the command run.
    pub async fn run_command<G: TransformGateway + ?Sized>(
        &mut self,
        gateway: &G,
        command: EditorCommand,
    ) -> EditorResult<()> {
        match command {
            EditorCommand::Undo => self.undo().map(drop),
            EditorCommand::Redo => self.redo().map(drop),
            EditorCommand::Save => self.save(gateway, SaveFormat::Png).await.map(drop),
        }
    }

    /// Map a key press to a command and run it. Returns the command, if any.
    ///
    /// # Errors
    ///
    /// Errors of the command run.
    pub async fn handle_key<G: TransformGateway + ?Sized>(
        &mut self,
        gateway: &G,
        key: &KeyEvent,
    ) -> EditorResult<Option<EditorCommand>> {
        let Some(command) = key.command() else {
            return Ok(None);
        };
        self.run_command(gateway, command).await?;
        Ok(Some(command))
    }

    // ---------------------------------------------------------------------
    // View
    // ---------------------------------------------------------------------

    /// Current view state.
    #[must_use]
    pub fn view(&self) -> &ViewState {
        &self.view
    }

    /// Zoom in one step.
    pub fn zoom_in(&mut self) -> f32 {
        self.view.zoom_in()
    }

    /// Zoom out one step.
    pub fn zoom_out(&mut self) -> f32 {
        self.view.zoom_out()
    }

    /// Back to 100 %.
    pub fn reset_zoom(&mut self) -> f32 {
        self.view.reset()
    }

    /// Fit the canvas into a container of the given size.
    pub fn fit_to(&mut self, container_width: f32, container_height: f32) -> f32 {
        let (width, height) = self.surface.dimensions();
        self.view
            .fit_to(container_width, container_height, width, height)
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Canvas size in pixels.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.surface.dimensions()
    }

    /// The raster surface.
    #[must_use]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Whether [`Self::shutdown`] has not been called.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Close the session. Later operations fail with
    /// [`EditorError::SessionClosed`] and late completions are discarded.
    pub fn shutdown(&mut self) {
        if self.alive {
            self.alive = false;
            self.pending = None;
            tracing::info!(entries = self.history.len(), "Session shut down");
        }
    }
}
