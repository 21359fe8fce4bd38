//! Axum route handlers for the Resume API.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::errors::AppError;
use crate::export::{export_pdf, ExportOutcome};
use crate::models::resume::ResumeRow;
use crate::resumes::formsets::EditRequest;
use crate::resumes::service::{self, CreateResumeRequest, Dashboard, VersionHistory};
use crate::state::AppState;
use crate::store::ResumeDocument;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub resume: ResumeRow,
    pub forked: bool,
    pub message: String,
    /// Where the client should navigate next. A fork points at the new
    /// version, an in-place save at the edited one. Detail and edit share
    /// `/api/v1/resumes/:id` (GET and PUT), so both use that path.
    pub location: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

fn resume_location(id: Uuid) -> String {
    format!("/api/v1/resumes/{id}")
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/dashboard
pub async fn handle_dashboard(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Dashboard>, AppError> {
    Ok(Json(service::dashboard(state.store.as_ref(), params.user_id).await?))
}

/// GET /api/v1/resumes
pub async fn handle_list_resumes(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<ResumeRow>>, AppError> {
    Ok(Json(
        service::list_resumes(state.store.as_ref(), params.user_id).await?,
    ))
}

/// POST /api/v1/resumes
///
/// Creates a résumé with empty personal details and points the client at it.
pub async fn handle_create_resume(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
    Json(request): Json<CreateResumeRequest>,
) -> Result<Response, AppError> {
    let resume = service::create_resume(state.store.as_ref(), params.user_id, request).await?;
    let location = resume_location(resume.id);

    let body = SaveResponse {
        resume,
        forked: false,
        message: "Resume created successfully! You can now add your details.".to_string(),
        location: location.clone(),
    };
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(body)).into_response())
}

/// GET /api/v1/resumes/:id
pub async fn handle_get_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<ResumeDocument>, AppError> {
    Ok(Json(
        service::get_document(state.store.as_ref(), id, params.user_id).await?,
    ))
}

/// PUT /api/v1/resumes/:id
///
/// Saves in place, or forks a new version when `save_as_new` is set.
pub async fn handle_edit_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
    Json(request): Json<EditRequest>,
) -> Result<Json<SaveResponse>, AppError> {
    let outcome = service::save_edit(state.store.as_ref(), id, params.user_id, request).await?;
    let message = if outcome.forked {
        "New version created successfully!"
    } else {
        "Resume updated successfully!"
    };

    Ok(Json(SaveResponse {
        location: resume_location(outcome.resume.id),
        resume: outcome.resume,
        forked: outcome.forked,
        message: message.to_string(),
    }))
}

/// DELETE /api/v1/resumes/:id
pub async fn handle_delete_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<MessageResponse>, AppError> {
    let deleted = service::delete_resume(state.store.as_ref(), id, params.user_id).await?;
    Ok(Json(MessageResponse {
        message: format!("Resume \"{}\" has been deleted successfully.", deleted.title),
    }))
}

/// GET /api/v1/resumes/:id/versions
pub async fn handle_versions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<VersionHistory>, AppError> {
    let history = service::version_history(
        state.store.as_ref(),
        id,
        params.user_id,
        state.config.version_chain_limit,
    )
    .await?;
    Ok(Json(history))
}

/// GET /api/v1/resumes/:id/pdf
///
/// Streams the rendered PDF, or redirects to the detail view when rendering fails.
pub async fn handle_export_pdf(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Response, AppError> {
    let outcome = export_pdf(
        state.store.as_ref(),
        state.pdf_renderer.as_ref(),
        id,
        params.user_id,
    )
    .await?;

    let response = match outcome {
        ExportOutcome::Document { filename, pdf } => (
            [
                (header::CONTENT_TYPE, "application/pdf".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{filename}\""),
                ),
            ],
            pdf,
        )
            .into_response(),
        ExportOutcome::Fallback { message, location } => (
            StatusCode::SEE_OTHER,
            [(header::LOCATION, location.clone())],
            Json(json!({ "message": message, "location": location })),
        )
            .into_response(),
    };
    Ok(response)
}
