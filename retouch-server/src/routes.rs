//! API route handlers.
//!
//! Every handler locks its session only for synchronous work. Transforms are
//! split: the ticket is issued under the lock, the gateway runs with the lock
//! released, and the result is applied under the lock again.

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use retouch_core::{
    run_transform, upload_image, Color, EditorCommand, EditorError, EditorSession, HistoryView,
    ImageUpload, KeyEvent, PointerEvent, PointerOutcome, RemoteImageRef, SaveFormat, Tool,
    ToolState, TransformCompletion, TransformOperation,
};
use retouch_raster::PixelSurface;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::store::SharedSession;
use crate::AppState;

/// Summary of a session returned by most mutating routes.
#[derive(Debug, Serialize)]
pub struct SessionSummary {
    /// Session id.
    pub session_id: Uuid,
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
    /// Active tool settings.
    pub tool: ToolState,
    /// Cursor hint for the active tool.
    pub cursor: &'static str,
    /// Zoom factor.
    pub zoom: f32,
    /// History browser model.
    pub history: HistoryView,
    /// Whether a transform is in flight.
    pub pending: bool,
    /// Remote copy of the current state, if any.
    pub remote: Option<RemoteImageRef>,
}

impl SessionSummary {
    fn of(session_id: Uuid, session: &EditorSession<PixelSurface>) -> Self {
        let (width, height) = session.dimensions();
        Self {
            session_id,
            width,
            height,
            tool: *session.tool_state(),
            cursor: session.tool_state().active_tool.cursor(),
            zoom: session.view().zoom(),
            history: session.history_view(),
            pending: session.is_pending(),
            remote: session.remote_ref().cloned(),
        }
    }
}

fn session(state: &AppState, id: Uuid) -> ApiResult<SharedSession> {
    state.store.get(&id).ok_or(ApiError::SessionNotFound(id))
}

/// Record commits made since the history's commit count was `before`.
///
/// Open strokes are committed implicitly by undo, redo, restore, uploads,
/// transforms and a repeated pointer-down, so handlers count them this way.
fn record_commits_since(
    session: &EditorSession<PixelSurface>,
    before: u64,
    source: &'static str,
) {
    let made = session.history().commit_count().saturating_sub(before);
    if made > 0 {
        metrics::record_commits(source, made);
    }
}

/// Run a transform without holding the session lock across the gateway call.
async fn split_transform(
    state: &AppState,
    shared: &SharedSession,
    operation: TransformOperation,
) -> ApiResult<RemoteImageRef> {
    let name = operation.name();
    let ticket = {
        let mut session = shared.lock().await;
        let before = session.history().commit_count();
        let ticket = session.begin_transform(operation)?;
        record_commits_since(&session, before, "stroke");
        ticket
    };

    let result = run_transform(state.gateway.as_ref(), &ticket).await;

    let completion = shared
        .lock()
        .await
        .complete_transform(ticket.generation, result);
    match completion {
        Ok(TransformCompletion::Applied(reference)) => {
            metrics::record_transform(name, "applied");
            metrics::record_commits("transform", 1);
            Ok(reference)
        }
        Ok(TransformCompletion::Saved(reference)) => {
            metrics::record_transform(name, "saved");
            Ok(reference)
        }
        Ok(TransformCompletion::Discarded) => {
            metrics::record_transform(name, "discarded");
            Err(EditorError::SessionClosed.into())
        }
        Err(err) => {
            metrics::record_transform(name, "failed");
            Err(err.into())
        }
    }
}

/// Response to `POST /api/sessions`.
#[derive(Debug, Serialize)]
pub struct SessionCreated {
    /// New session id.
    pub session_id: Uuid,
    /// Blank canvas width.
    pub width: u32,
    /// Blank canvas height.
    pub height: u32,
}

/// Open a session on a blank canvas.
#[tracing::instrument(name = "create_session", skip(state))]
pub async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionCreated>) {
    let session_id = state.store.create();
    let config = state.store.config();
    (
        StatusCode::CREATED,
        Json(SessionCreated {
            session_id,
            width: config.canvas_width,
            height: config.canvas_height,
        }),
    )
}

/// Current session summary.
#[tracing::instrument(name = "get_session", skip(state))]
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SessionSummary>> {
    let shared = session(&state, id)?;
    let session = shared.lock().await;
    Ok(Json(SessionSummary::of(id, &session)))
}

/// Shut down and drop a session. A transform still in flight is discarded.
#[tracing::instrument(name = "delete_session", skip(state))]
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let shared = state
        .store
        .remove(&id)
        .ok_or(ApiError::SessionNotFound(id))?;
    shared.lock().await.shutdown();
    Ok(StatusCode::NO_CONTENT)
}

/// Read the multipart `image` field into an upload.
async fn read_upload(multipart: &mut Multipart, max_bytes: usize) -> ApiResult<ImageUpload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        if bytes.len() > max_bytes {
            return Err(EditorError::Validation(format!(
                "file too large (max {max_bytes} bytes)"
            ))
            .into());
        }
        return Ok(ImageUpload::new(file_name, content_type, bytes.to_vec()));
    }
    Err(EditorError::Validation("no file was uploaded".to_string()).into())
}

/// Upload an image and make it the canvas.
#[tracing::instrument(name = "upload_image", skip(state, multipart))]
pub async fn upload(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> ApiResult<Json<SessionSummary>> {
    let shared = session(&state, id)?;
    let upload = read_upload(&mut multipart, state.max_upload_bytes).await?;

    if shared.lock().await.is_pending() {
        return Err(EditorError::TransformPending.into());
    }
    let remote = upload_image(state.gateway.as_ref(), &upload).await?;

    let mut session = shared.lock().await;
    let before = session.history().commit_count();
    session.load_image(&upload, remote)?;
    // The upload itself is the last commit.
    record_commits_since(&session, before + 1, "stroke");
    metrics::record_commits("upload", 1);
    metrics::record_upload(session.remote_ref().is_some());
    Ok(Json(SessionSummary::of(id, &session)))
}

/// Tool settings update. Fields left out are unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct ToolUpdate {
    /// Tool name (select, brush, eraser, text, crop, shapes).
    pub tool: Option<String>,
    /// Stroke color as `#rrggbb`.
    pub color: Option<String>,
    /// Stroke width in pixels.
    pub width: Option<f32>,
    /// Opacity from 0.0 to 1.0.
    pub opacity: Option<f32>,
}

/// Change the active tool and stroke settings.
#[tracing::instrument(name = "update_tool", skip(state))]
pub async fn update_tool(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<ToolUpdate>,
) -> ApiResult<Json<ToolState>> {
    // Parse everything before touching the session.
    let tool = update.tool.as_deref().map(str::parse::<Tool>).transpose()?;
    let color = update
        .color
        .as_deref()
        .map(str::parse::<Color>)
        .transpose()?;

    let shared = session(&state, id)?;
    let mut session = shared.lock().await;
    if !session.is_alive() {
        return Err(EditorError::SessionClosed.into());
    }
    if let Some(tool) = tool {
        session.set_tool(tool);
    }
    if let Some(color) = color {
        session.set_color(color);
    }
    if let Some(width) = update.width {
        session.set_stroke_width(width);
    }
    if let Some(opacity) = update.opacity {
        session.set_opacity(opacity);
    }
    Ok(Json(*session.tool_state()))
}

/// Response to a pointer event.
#[derive(Debug, Serialize)]
pub struct PointerResponse {
    /// What the event did.
    pub outcome: PointerOutcome,
    /// Number of history entries.
    pub len: usize,
    /// Current history position.
    pub position: Option<usize>,
}

/// Feed one pointer event to the active tool.
#[tracing::instrument(name = "pointer", skip(state), level = "debug")]
pub async fn pointer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(event): Json<PointerEvent>,
) -> ApiResult<Json<PointerResponse>> {
    let shared = session(&state, id)?;
    let mut session = shared.lock().await;
    let before = session.history().commit_count();
    let outcome = session.pointer(event)?;
    record_commits_since(&session, before, "stroke");
    Ok(Json(PointerResponse {
        outcome,
        len: session.history().len(),
        position: session.history().position(),
    }))
}

async fn step_history(
    state: &AppState,
    id: Uuid,
    direction: &'static str,
    step: impl FnOnce(&mut EditorSession<PixelSurface>) -> Result<(), EditorError>,
) -> ApiResult<Json<SessionSummary>> {
    let shared = session(state, id)?;
    let mut session = shared.lock().await;
    let commits = session.history().commit_count();
    let before = session.history().position();
    let result = step(&mut *session);
    record_commits_since(&session, commits, "stroke");
    result?;
    if session.history().position() != before {
        metrics::record_history_step(direction);
    }
    Ok(Json(SessionSummary::of(id, &session)))
}

/// Step back one state.
#[tracing::instrument(name = "undo", skip(state))]
pub async fn undo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SessionSummary>> {
    step_history(&state, id, "undo", |session| session.undo().map(drop)).await
}

/// Step forward one state.
#[tracing::instrument(name = "redo", skip(state))]
pub async fn redo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SessionSummary>> {
    step_history(&state, id, "redo", |session| session.redo().map(drop)).await
}

/// Jump to a history entry.
#[tracing::instrument(name = "restore", skip(state))]
pub async fn restore(
    State(state): State<AppState>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> ApiResult<Json<SessionSummary>> {
    step_history(&state, id, "restore", |session| {
        session.restore(index).map(drop)
    })
    .await
}

/// History browser model.
#[tracing::instrument(name = "history", skip(state))]
pub async fn history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<HistoryView>> {
    let shared = session(&state, id)?;
    let session = shared.lock().await;
    Ok(Json(session.history_view()))
}

/// The canvas as PNG, including a stroke in progress.
#[tracing::instrument(name = "image", skip(state))]
pub async fn image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let shared = session(&state, id)?;
    let snapshot = shared.lock().await.render()?;
    Ok((
        [(header::CONTENT_TYPE, "image/png")],
        snapshot.as_bytes().to_vec(),
    ))
}

/// Response to a transform.
#[derive(Debug, Serialize)]
pub struct TransformResponse {
    /// Remote result of the operation.
    pub result: RemoteImageRef,
    /// Session after the transform.
    pub session: SessionSummary,
}

/// Run a remote transform on the current state.
#[tracing::instrument(name = "transform", skip(state, operation), fields(operation = operation.name()))]
pub async fn transform(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(operation): Json<TransformOperation>,
) -> ApiResult<Json<TransformResponse>> {
    let shared = session(&state, id)?;
    let result = split_transform(&state, &shared, operation).await?;
    let session = shared.lock().await;
    Ok(Json(TransformResponse {
        result,
        session: SessionSummary::of(id, &session),
    }))
}

/// Body of a save request.
#[derive(Debug, Default, Deserialize)]
pub struct SaveRequest {
    /// Output format, PNG unless given.
    #[serde(default)]
    pub format: SaveFormat,
}

/// Response to a save.
#[derive(Debug, Serialize)]
pub struct SaveResponse {
    /// Where the service stored the canvas.
    pub saved: RemoteImageRef,
}

/// Store the canvas through the gateway. History is untouched.
#[tracing::instrument(name = "save", skip(state))]
pub async fn save(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SaveRequest>,
) -> ApiResult<Json<SaveResponse>> {
    let shared = session(&state, id)?;
    let saved = split_transform(
        &state,
        &shared,
        TransformOperation::Save {
            format: request.format,
        },
    )
    .await?;
    Ok(Json(SaveResponse { saved }))
}

/// Response to a key press.
#[derive(Debug, Serialize)]
pub struct KeyResponse {
    /// Command the key mapped to, if any.
    pub command: Option<EditorCommand>,
    /// Saved location for a save shortcut.
    pub saved: Option<RemoteImageRef>,
    /// Session after the command.
    pub session: SessionSummary,
}

/// Keyboard shortcut: modifier+Z undo, modifier+Shift+Z redo, modifier+S save.
#[tracing::instrument(name = "keys", skip(state))]
pub async fn keys(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(key): Json<KeyEvent>,
) -> ApiResult<Json<KeyResponse>> {
    let shared = session(&state, id)?;
    let command = key.command();
    let mut saved = None;

    match command {
        Some(EditorCommand::Save) => {
            saved = Some(
                split_transform(
                    &state,
                    &shared,
                    TransformOperation::Save {
                        format: SaveFormat::Png,
                    },
                )
                .await?,
            );
        }
        Some(EditorCommand::Undo) => {
            step_history(&state, id, "undo", |session| session.undo().map(drop)).await?;
        }
        Some(EditorCommand::Redo) => {
            step_history(&state, id, "redo", |session| session.redo().map(drop)).await?;
        }
        None => {}
    }

    let session = shared.lock().await;
    Ok(Json(KeyResponse {
        command,
        saved,
        session: SessionSummary::of(id, &session),
    }))
}

/// View zoom action.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ZoomRequest {
    /// One step in.
    In,
    /// One step out.
    Out,
    /// Back to 100 %.
    Reset,
    /// Fit the canvas into a container.
    Fit {
        /// Container width in CSS pixels.
        container_width: f32,
        /// Container height in CSS pixels.
        container_height: f32,
    },
}

/// Response to a zoom action.
#[derive(Debug, Serialize)]
pub struct ZoomResponse {
    /// New zoom factor.
    pub zoom: f32,
    /// Zoom as a rounded percentage for display.
    pub percent: u32,
}

/// Change the view zoom. Never touches history.
#[tracing::instrument(name = "zoom", skip(state))]
pub async fn zoom(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ZoomRequest>,
) -> ApiResult<Json<ZoomResponse>> {
    let shared = session(&state, id)?;
    let mut session = shared.lock().await;
    if !session.is_alive() {
        return Err(EditorError::SessionClosed.into());
    }
    let zoom = match request {
        ZoomRequest::In => session.zoom_in(),
        ZoomRequest::Out => session.zoom_out(),
        ZoomRequest::Reset => session.reset_zoom(),
        ZoomRequest::Fit {
            container_width,
            container_height,
        } => session.fit_to(container_width, container_height),
    };
    Ok(Json(ZoomResponse {
        zoom,
        percent: session.view().percent(),
    }))
}
