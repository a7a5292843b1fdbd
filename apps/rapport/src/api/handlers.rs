//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.
//!
//! Reads take the session's read lock; commands take the write lock, so
//! commands are serialized. The wall clock is read here and passed to the
//! engine as the command timestamp.

use super::{
    AppState,
    types::{ApiResponse, ExportResponse, HashResponse, HealthResponse, OpenRequest, status_for},
};
use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use rapport_core::{
    CommunicationPattern, HealthSnapshot, Interaction, InteractionInput, Milestone,
    MilestoneInput, Opened, PatternInput, Progression, ProgressionHistory, ProgressionId,
    ProgressionNotes, RapportError, Recorded, SnapshotInput, StageProgress, TrustActivity,
    TrustActivityInput,
};

pub type Reply<T> = (StatusCode, Json<ApiResponse<T>>);

/// Wrap an engine result in the envelope.
fn reply<T>(result: Result<T, RapportError>, ok: StatusCode) -> Reply<T> {
    match result {
        Ok(data) => (ok, Json(ApiResponse::success(data))),
        Err(e) => failure(&e),
    }
}

fn failure<T>(err: &RapportError) -> Reply<T> {
    let status = status_for(err);
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    } else {
        tracing::debug!(error = %err, "request rejected");
    }
    (status, Json(ApiResponse::from_error(err)))
}

/// Envelope for a request axum could not extract.
fn rejected<T>(status: StatusCode, message: String) -> Reply<T> {
    tracing::debug!(%status, %message, "request not extracted");
    (status, Json(ApiResponse::error("request", message)))
}

/// Unwrap a JSON body (rejections are 400, 415 or 422).
fn body<B, T>(payload: Result<Json<B>, JsonRejection>) -> Result<B, Reply<T>> {
    payload
        .map(|Json(body)| body)
        .map_err(|r| rejected(r.status(), r.body_text()))
}

/// Parse the `{id}` segment; anything but a `u64` is a 400.
fn progression_id<T>(
    path: Result<Path<u64>, PathRejection>,
) -> Result<ProgressionId, Reply<T>> {
    path.map(|Path(id)| ProgressionId(id))
        .map_err(|r| rejected(r.status(), r.body_text()))
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// PROGRESSION QUERIES
// =============================================================================

/// List every progression in id order.
pub async fn list_progressions_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.read().await;
    reply(session.progressions(), StatusCode::OK)
}

/// Get one progression.
pub async fn progression_handler(
    State(state): State<AppState>,
    path: Result<Path<u64>, PathRejection>,
) -> Reply<Progression> {
    let id = match progression_id(path) {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    let session = state.session.read().await;
    reply(session.progression(id), StatusCode::OK)
}

/// Progress toward the next stage.
pub async fn stage_handler(
    State(state): State<AppState>,
    path: Result<Path<u64>, PathRejection>,
) -> Reply<StageProgress> {
    let id = match progression_id(path) {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    let session = state.session.read().await;
    reply(session.stage_progress(id), StatusCode::OK)
}

/// Milestones, trust activities, interactions and patterns.
pub async fn history_handler(
    State(state): State<AppState>,
    path: Result<Path<u64>, PathRejection>,
) -> Reply<ProgressionHistory> {
    let id = match progression_id(path) {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    let session = state.session.read().await;
    reply(session.history(id), StatusCode::OK)
}

/// Health snapshots in id order.
pub async fn list_snapshots_handler(
    State(state): State<AppState>,
    path: Result<Path<u64>, PathRejection>,
) -> Reply<Vec<HealthSnapshot>> {
    let id = match progression_id(path) {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    let session = state.session.read().await;
    reply(session.health_snapshots(id), StatusCode::OK)
}

// =============================================================================
// PROGRESSION COMMANDS
// =============================================================================

/// Open (or fetch) the progression for an organization.
///
/// 201 when a progression was created, 200 when it already existed.
pub async fn open_progression_handler(
    State(state): State<AppState>,
    payload: Result<Json<OpenRequest>, JsonRejection>,
) -> Reply<Opened> {
    let request = match body(payload) {
        Ok(body) => body,
        Err(reply) => return reply,
    };
    let mut session = state.session.write().await;
    match session.open_progression(request.organization_id, Utc::now()) {
        Ok(opened) => {
            let status = if opened.created {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            (status, Json(ApiResponse::success(opened)))
        }
        Err(e) => failure(&e),
    }
}

/// Delete a progression and every record under it.
pub async fn delete_progression_handler(
    State(state): State<AppState>,
    path: Result<Path<u64>, PathRejection>,
) -> Reply<ProgressionId> {
    let id = match progression_id(path) {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    let mut session = state.session.write().await;
    reply(session.delete_progression(id).map(|()| id), StatusCode::OK)
}

pub async fn record_milestone_handler(
    State(state): State<AppState>,
    path: Result<Path<u64>, PathRejection>,
    payload: Result<Json<MilestoneInput>, JsonRejection>,
) -> Reply<Recorded<Milestone>> {
    let (id, input) = match progression_id(path).and_then(|id| Ok((id, body(payload)?))) {
        Ok(extracted) => extracted,
        Err(reply) => return reply,
    };
    let mut session = state.session.write().await;
    reply(
        session.record_milestone(id, input, Utc::now()),
        StatusCode::CREATED,
    )
}

pub async fn record_trust_activity_handler(
    State(state): State<AppState>,
    path: Result<Path<u64>, PathRejection>,
    payload: Result<Json<TrustActivityInput>, JsonRejection>,
) -> Reply<Recorded<TrustActivity>> {
    let (id, input) = match progression_id(path).and_then(|id| Ok((id, body(payload)?))) {
        Ok(extracted) => extracted,
        Err(reply) => return reply,
    };
    let mut session = state.session.write().await;
    reply(
        session.record_trust_activity(id, input, Utc::now()),
        StatusCode::CREATED,
    )
}

pub async fn record_pattern_handler(
    State(state): State<AppState>,
    path: Result<Path<u64>, PathRejection>,
    payload: Result<Json<PatternInput>, JsonRejection>,
) -> Reply<Recorded<CommunicationPattern>> {
    let (id, input) = match progression_id(path).and_then(|id| Ok((id, body(payload)?))) {
        Ok(extracted) => extracted,
        Err(reply) => return reply,
    };
    let mut session = state.session.write().await;
    reply(
        session.record_communication_pattern(id, input, Utc::now()),
        StatusCode::CREATED,
    )
}

pub async fn record_snapshot_handler(
    State(state): State<AppState>,
    path: Result<Path<u64>, PathRejection>,
    payload: Result<Json<SnapshotInput>, JsonRejection>,
) -> Reply<Recorded<HealthSnapshot>> {
    let (id, input) = match progression_id(path).and_then(|id| Ok((id, body(payload)?))) {
        Ok(extracted) => extracted,
        Err(reply) => return reply,
    };
    let mut session = state.session.write().await;
    reply(
        session.record_health_snapshot(id, input, Utc::now()),
        StatusCode::CREATED,
    )
}

/// Update notes, next steps and the manually assessed scores.
pub async fn annotate_handler(
    State(state): State<AppState>,
    path: Result<Path<u64>, PathRejection>,
    payload: Result<Json<ProgressionNotes>, JsonRejection>,
) -> Reply<Progression> {
    let (id, notes) = match progression_id(path).and_then(|id| Ok((id, body(payload)?))) {
        Ok(extracted) => extracted,
        Err(reply) => return reply,
    };
    let mut session = state.session.write().await;
    reply(
        session.annotate(id, notes, Utc::now()),
        StatusCode::OK,
    )
}

pub async fn deactivate_handler(
    State(state): State<AppState>,
    path: Result<Path<u64>, PathRejection>,
) -> Reply<Progression> {
    let id = match progression_id(path) {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    let mut session = state.session.write().await;
    reply(
        session.deactivate(id, Utc::now()),
        StatusCode::OK,
    )
}

/// Log an interaction; the organization's progression is opened if needed.
pub async fn record_interaction_handler(
    State(state): State<AppState>,
    payload: Result<Json<InteractionInput>, JsonRejection>,
) -> Reply<Recorded<Interaction>> {
    let input = match body(payload) {
        Ok(body) => body,
        Err(reply) => return reply,
    };
    let mut session = state.session.write().await;
    reply(
        session.record_interaction(input, Utc::now()),
        StatusCode::CREATED,
    )
}

// =============================================================================
// EXPORT / HASH HANDLERS
// =============================================================================

/// Export the ledger in canonical format.
pub async fn export_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.read().await;

    let exported = session
        .export_canonical()
        .and_then(|data| Ok((session.canonical_checksum()?, data)));

    match exported {
        Ok((checksum, data)) => (
            StatusCode::OK,
            Json(ExportResponse::success(&data, checksum)),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ExportResponse::error(format!("Export failed: {}", e))),
        ),
    }
}

/// BLAKE3 hash of the canonical export.
pub async fn hash_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.read().await;
    match session.canonical_crypto_hash() {
        Ok(hash) => (StatusCode::OK, Json(HashResponse::success(hash))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(HashResponse::error(format!("Hash failed: {}", e))),
        ),
    }
}
