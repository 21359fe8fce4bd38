use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::resumes::formsets::FormErrors;
use crate::resumes::versions::ChainError;
use crate::store::StoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// One or more résumé sub-forms failed; nothing was saved.
    #[error("{0}")]
    InvalidForms(FormErrors),

    #[error("Version chain error: {0}")]
    VersionChain(#[from] ChainError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details): (StatusCode, &str, String, Option<Value>) =
            match &self {
                AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone(), None),
                AppError::Validation(msg) => (
                    StatusCode::BAD_REQUEST,
                    "VALIDATION_ERROR",
                    msg.clone(),
                    None,
                ),
                AppError::InvalidForms(errors) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "INVALID_FORMS",
                    "Please correct the errors below.".to_string(),
                    serde_json::to_value(errors).ok(),
                ),
                // Deleted between the ownership check and the graph load.
                AppError::VersionChain(ChainError::UnknownStart(id)) => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("Resume {id} not found"),
                    None,
                ),
                AppError::VersionChain(e) => {
                    tracing::error!("Version chain error: {e}");
                    (
                        StatusCode::CONFLICT,
                        "VERSION_CHAIN_CORRUPT",
                        e.to_string(),
                        None,
                    )
                }
                AppError::Store(StoreError::NotFound(msg)) => {
                    tracing::warn!("Record vanished during commit: {msg}");
                    (
                        StatusCode::CONFLICT,
                        "CONCURRENT_MODIFICATION",
                        "The resume changed while saving; reload and try again".to_string(),
                        None,
                    )
                }
                AppError::Store(e) => {
                    tracing::error!("Store error: {e}");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "DATABASE_ERROR",
                        "A database error occurred".to_string(),
                        None,
                    )
                }
            };

        let mut error = json!({
            "code": code,
            "message": message
        });
        if let Some(details) = details {
            error["details"] = details;
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}
