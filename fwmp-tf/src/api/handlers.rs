//! HTTP request handlers
//!
//! Implements the REST endpoints driven by the field-worker UI. Engine
//! errors map onto HTTP statuses here: local validation to 4xx, collaborator
//! failures to 502, busy/blocked conditions to 409.

use crate::api::AppState;
use crate::clients::geo::DeviceReport;
use crate::error::Error;
use crate::fulfillment::gate::CompletionStatus;
use crate::fulfillment::store::{SlotMediaState, StoreSnapshot};
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use fwmp_common::models::{
    CandidateFile, MaterialLine, MediaDescriptor, Phase, ReferenceItem, SlotKey, TaskStatus,
};
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

#[derive(Debug, Serialize)]
pub struct SlotView {
    slot: SlotKey,
    before: SlotMediaState,
    after: SlotMediaState,
}

#[derive(Debug, Serialize)]
pub struct TaskView {
    task_id: Uuid,
    section_id: Uuid,
    status: TaskStatus,
    completion: CompletionStatus,
    slots: Vec<SlotView>,
    materials: Vec<MaterialLine>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    slot: SlotKey,
    phase: Phase,
    media: MediaDescriptor,
}

#[derive(Debug, Serialize)]
pub struct DeleteArmedResponse {
    slot: SlotKey,
    phase: Phase,
}

#[derive(Debug, Deserialize)]
pub struct AddMaterialRequest {
    name: String,
    quantity: u32,
    unit: String,
}

#[derive(Debug, Deserialize)]
pub struct QuantityRequest {
    quantity: u32,
}

#[derive(Debug, Serialize)]
pub struct MaterialsResponse {
    materials: Vec<MaterialLine>,
}

#[derive(Debug, Deserialize, Default)]
pub struct LifecycleRequest {
    lat: Option<f64>,
    lng: Option<f64>,
    /// The device reported a denied location permission
    #[serde(default)]
    location_denied: bool,
    /// User-confirmed override: proceed without coordinates when no fix is
    /// obtainable (denial is never overridable)
    #[serde(default)]
    allow_missing_fix: bool,
}

#[derive(Debug, Serialize)]
pub struct ReferenceView {
    reference: ReferenceItem,
    pending: bool,
}

#[derive(Debug, Serialize)]
pub struct ReferencesResponse {
    references: Vec<ReferenceView>,
}

// ============================================================================
// Error mapping
// ============================================================================

type Reject = (StatusCode, Json<ErrorResponse>);

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::UnsupportedMediaKind(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        Error::SlotBusy { .. }
        | Error::NothingToDelete { .. }
        | Error::NotArmed
        | Error::TaskAlreadyCompleted(_)
        | Error::CompletionBlocked(_)
        | Error::MaterialsFrozen
        | Error::GeolocationUnavailable
        | Error::InvalidState(_) => StatusCode::CONFLICT,
        Error::GeolocationDenied => StatusCode::FORBIDDEN,
        Error::UnknownSlot(_)
        | Error::UnknownMaterial(_)
        | Error::UnknownReference(_)
        | Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::UploadFailed(_)
        | Error::DeleteFailed(_)
        | Error::MutationFailed(_)
        | Error::LoadFailed(_) => StatusCode::BAD_GATEWAY,
        Error::BadRequest(_) => StatusCode::BAD_REQUEST,
        Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(err: Error) -> Reject {
    (
        status_for(&err),
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn bad_request(message: impl Into<String>) -> Reject {
    reject(Error::BadRequest(message.into()))
}

fn parse_phase(raw: &str) -> Result<Phase, Reject> {
    raw.parse::<Phase>().map_err(bad_request)
}

// ============================================================================
// Multipart extraction
// ============================================================================

/// Pull the uploaded file fields out of a multipart body.
///
/// Size and MIME validation is the engine's job; this only assembles the
/// candidate files.
async fn read_candidates(multipart: &mut Multipart) -> Result<Vec<CandidateFile>, Reject> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("malformed multipart body: {}", e)))?
    {
        if field.file_name().is_none() {
            continue;
        }
        let file_name = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "upload.bin".to_string());
        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("failed to read upload: {}", e)))?;

        files.push(CandidateFile {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    Ok(files)
}

async fn read_single_candidate(multipart: &mut Multipart) -> Result<CandidateFile, Reject> {
    let mut files = read_candidates(multipart).await?;
    match files.len() {
        0 => Err(bad_request("no file in request")),
        1 => Ok(files.remove(0)),
        _ => Err(bad_request("expected exactly one file")),
    }
}

// ============================================================================
// Task view
// ============================================================================

async fn task_view(
    state: &AppState,
    task_id: Uuid,
) -> Result<TaskView, Reject> {
    let session = state.sessions.session(task_id).await.map_err(reject)?;
    let snapshot = session.fulfillment_snapshot().await;
    let completion = session.completion_status().await;
    let materials = session.materials().await;

    Ok(TaskView {
        task_id,
        section_id: session.section_id(),
        status: session.status().await,
        completion,
        slots: slot_views(&snapshot),
        materials,
    })
}

fn slot_views(snapshot: &StoreSnapshot) -> Vec<SlotView> {
    snapshot
        .slots
        .iter()
        .map(|slot| SlotView {
            slot: *slot,
            before: snapshot
                .state(*slot, Phase::Before)
                .cloned()
                .unwrap_or(SlotMediaState::Empty),
            after: snapshot
                .state(*slot, Phase::After)
                .cloned()
                .unwrap_or(SlotMediaState::Empty),
        })
        .collect()
}

/// POST /tasks/:task_id/load - Load (or reuse) the task session
pub async fn load_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<TaskView>, Reject> {
    let view = task_view(&state, task_id).await?;
    Ok(Json(view))
}

/// GET /tasks/:task_id/fulfillment - Slot table and completion status
pub async fn get_fulfillment(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<TaskView>, Reject> {
    let view = task_view(&state, task_id).await?;
    Ok(Json(view))
}

/// POST /tasks/:task_id/close - Drop the task session (worker navigated away)
///
/// In-flight operations resolve against their own store handle; the epoch
/// guard discards their results if the task is ever reloaded.
pub async fn close_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Json<StatusResponse> {
    let closed = state.sessions.close(task_id).await;
    Json(StatusResponse {
        status: if closed { "closed" } else { "idle" }.to_string(),
    })
}

// ============================================================================
// Slot media
// ============================================================================

/// POST /tasks/:task_id/slots/:ref/:slot/:phase/upload - Upload slot media
pub async fn upload_slot_media(
    State(state): State<AppState>,
    Path((task_id, reference_index, slot_index, phase)): Path<(Uuid, usize, usize, String)>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, Reject> {
    let phase = parse_phase(&phase)?;
    let file = read_single_candidate(&mut multipart).await?;

    let session = state.sessions.session(task_id).await.map_err(reject)?;
    let slot = SlotKey::new(reference_index, slot_index);
    let media = session.upload(slot, phase, file).await.map_err(reject)?;

    Ok(Json(UploadResponse { slot, phase, media }))
}

/// POST /tasks/:task_id/slots/:ref/:slot/:phase/delete - Arm a delete
pub async fn request_slot_delete(
    State(state): State<AppState>,
    Path((task_id, reference_index, slot_index, phase)): Path<(Uuid, usize, usize, String)>,
) -> Result<Json<DeleteArmedResponse>, Reject> {
    let phase = parse_phase(&phase)?;
    let session = state.sessions.session(task_id).await.map_err(reject)?;
    let target = session
        .request_delete(SlotKey::new(reference_index, slot_index), phase)
        .await
        .map_err(reject)?;

    Ok(Json(DeleteArmedResponse {
        slot: target.slot,
        phase: target.phase,
    }))
}

/// POST /tasks/:task_id/delete/confirm - Perform the armed delete
pub async fn confirm_slot_delete(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<StatusResponse>, Reject> {
    let session = state.sessions.session(task_id).await.map_err(reject)?;
    session.confirm_delete().await.map_err(reject)?;
    Ok(Json(StatusResponse {
        status: "deleted".to_string(),
    }))
}

/// POST /tasks/:task_id/delete/cancel - Disarm a staged delete
pub async fn cancel_slot_delete(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<StatusResponse>, Reject> {
    let session = state.sessions.session(task_id).await.map_err(reject)?;
    let was_armed = session.cancel_delete().await;
    Ok(Json(StatusResponse {
        status: if was_armed { "cancelled" } else { "idle" }.to_string(),
    }))
}

// ============================================================================
// Materials
// ============================================================================

/// GET /tasks/:task_id/materials - Current material lines
pub async fn list_materials(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<MaterialsResponse>, Reject> {
    let session = state.sessions.session(task_id).await.map_err(reject)?;
    Ok(Json(MaterialsResponse {
        materials: session.materials().await,
    }))
}

/// POST /tasks/:task_id/materials - Add a material line
pub async fn add_material(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Json(request): Json<AddMaterialRequest>,
) -> Result<Json<MaterialLine>, Reject> {
    let session = state.sessions.session(task_id).await.map_err(reject)?;
    let line = session
        .add_material(request.name, request.quantity, request.unit)
        .await
        .map_err(reject)?;
    Ok(Json(line))
}

/// PUT /tasks/:task_id/materials/:item_id - Adjust a line's quantity
pub async fn set_material_quantity(
    State(state): State<AppState>,
    Path((task_id, item_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<QuantityRequest>,
) -> Result<Json<StatusResponse>, Reject> {
    let session = state.sessions.session(task_id).await.map_err(reject)?;
    session
        .set_material_quantity(item_id, request.quantity)
        .await
        .map_err(reject)?;
    Ok(Json(StatusResponse {
        status: "updated".to_string(),
    }))
}

/// DELETE /tasks/:task_id/materials/:item_id - Remove an unconfirmed line
pub async fn remove_material(
    State(state): State<AppState>,
    Path((task_id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<StatusResponse>, Reject> {
    let session = state.sessions.session(task_id).await.map_err(reject)?;
    session.remove_material(item_id).await.map_err(reject)?;
    Ok(Json(StatusResponse {
        status: "removed".to_string(),
    }))
}

/// POST /tasks/:task_id/materials/confirm - Confirm all lines
pub async fn confirm_materials(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<MaterialsResponse>, Reject> {
    let session = state.sessions.session(task_id).await.map_err(reject)?;
    session.confirm_materials().await.map_err(reject)?;
    Ok(Json(MaterialsResponse {
        materials: session.materials().await,
    }))
}

// ============================================================================
// Lifecycle
// ============================================================================

/// POST /tasks/:task_id/start - Move the task to in-progress
pub async fn start_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Json(request): Json<LifecycleRequest>,
) -> Result<Json<StatusResponse>, Reject> {
    let session = state.sessions.session(task_id).await.map_err(reject)?;
    let report = DeviceReport::from_parts(request.lat, request.lng, request.location_denied);
    session
        .start_task(&report, request.allow_missing_fix)
        .await
        .map_err(reject)?;
    Ok(Json(StatusResponse {
        status: "in-progress".to_string(),
    }))
}

/// POST /tasks/:task_id/complete - Move the task to completed
pub async fn complete_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Json(request): Json<LifecycleRequest>,
) -> Result<Json<StatusResponse>, Reject> {
    let session = state.sessions.session(task_id).await.map_err(reject)?;
    let report = DeviceReport::from_parts(request.lat, request.lng, request.location_denied);
    session
        .complete_task(&report, request.allow_missing_fix)
        .await
        .map_err(reject)?;
    Ok(Json(StatusResponse {
        status: "completed".to_string(),
    }))
}

// ============================================================================
// Section reference catalog
// ============================================================================

async fn references_response(
    state: &AppState,
    section_id: Uuid,
) -> Result<ReferencesResponse, Reject> {
    let editor = state.catalogs.editor(section_id).await.map_err(reject)?;
    let references = editor
        .entries()
        .await
        .into_iter()
        .map(|entry| ReferenceView {
            reference: entry.reference,
            pending: entry.pending,
        })
        .collect();
    Ok(ReferencesResponse { references })
}

/// GET /sections/:section_id/references - Current catalog (incl. pending)
pub async fn list_references(
    State(state): State<AppState>,
    Path(section_id): Path<Uuid>,
) -> Result<Json<ReferencesResponse>, Reject> {
    let response = references_response(&state, section_id).await?;
    Ok(Json(response))
}

/// POST /sections/:section_id/references - Add pending reference files
pub async fn add_references(
    State(state): State<AppState>,
    Path(section_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<ReferencesResponse>, Reject> {
    let files = read_candidates(&mut multipart).await?;
    if files.is_empty() {
        return Err(bad_request("no files in request"));
    }

    let editor = state.catalogs.editor(section_id).await.map_err(reject)?;
    editor.add_pending(files).await.map_err(reject)?;

    let response = references_response(&state, section_id).await?;
    Ok(Json(response))
}

/// POST /sections/:section_id/references/submit - Submit pending files
pub async fn submit_references(
    State(state): State<AppState>,
    Path(section_id): Path<Uuid>,
) -> Result<Json<ReferencesResponse>, Reject> {
    let editor = state.catalogs.editor(section_id).await.map_err(reject)?;
    if let Err(e) = editor.submit().await {
        error!("Catalog submit failed for section {}: {}", section_id, e);
        return Err(reject(e));
    }

    let response = references_response(&state, section_id).await?;
    Ok(Json(response))
}

/// POST /sections/:section_id/references/:reference_id/delete - Arm a removal
pub async fn request_reference_remove(
    State(state): State<AppState>,
    Path((section_id, reference_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<StatusResponse>, Reject> {
    let editor = state.catalogs.editor(section_id).await.map_err(reject)?;
    editor.request_remove(reference_id).await.map_err(reject)?;
    Ok(Json(StatusResponse {
        status: "armed".to_string(),
    }))
}

/// POST /sections/:section_id/references/remove/confirm - Perform the removal
pub async fn confirm_reference_remove(
    State(state): State<AppState>,
    Path(section_id): Path<Uuid>,
) -> Result<Json<ReferencesResponse>, Reject> {
    let editor = state.catalogs.editor(section_id).await.map_err(reject)?;
    editor.confirm_remove().await.map_err(reject)?;

    let response = references_response(&state, section_id).await?;
    Ok(Json(response))
}

/// POST /sections/:section_id/references/remove/cancel - Disarm a removal
pub async fn cancel_reference_remove(
    State(state): State<AppState>,
    Path(section_id): Path<Uuid>,
) -> Result<Json<StatusResponse>, Reject> {
    let editor = state.catalogs.editor(section_id).await.map_err(reject)?;
    let was_armed = editor.cancel_remove().await;
    Ok(Json(StatusResponse {
        status: if was_armed { "cancelled" } else { "idle" }.to_string(),
    }))
}
