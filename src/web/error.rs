use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::actions::ActionError;
use crate::db::store::StoreError;
use crate::pipeline::PipelineError;
use crate::tags::TagError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Missing required field: {0}")]
    MissingField(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            AppError::MissingField(_) => (StatusCode::BAD_REQUEST, "MISSING_FIELD"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            AppError::DatabaseError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR"),
            AppError::InternalServerError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let error_message = match self {
            AppError::InvalidInput(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::InternalServerError(msg) => msg,
            AppError::MissingField(field) => format!("{field} is required"),
            AppError::DatabaseError(msg) => format!("Database error: {msg}"),
        };
        (status, Json(serde_json::json!({ "error": error_message, "code": code }))).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AppError::NotFound(what),
            other => AppError::DatabaseError(other.to_string()),
        }
    }
}

impl From<TagError> for AppError {
    fn from(err: TagError) -> Self {
        match err {
            TagError::Store(e) => AppError::from(e),
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::MissingField(field) => AppError::MissingField(field.to_string()),
            PipelineError::Tags(e) => AppError::from(e),
            PipelineError::Store(e) => AppError::from(e),
            PipelineError::Dispatch(e) => AppError::InternalServerError(e.to_string()),
        }
    }
}

impl From<ActionError> for AppError {
    fn from(err: ActionError) -> Self {
        match err {
            ActionError::MissingField(field) => AppError::MissingField(field.to_string()),
            ActionError::InvalidInput(msg) => AppError::InvalidInput(msg),
            ActionError::NotFound(what) => AppError::NotFound(what),
            ActionError::NotOwner(what) => {
                AppError::Forbidden(format!("{what} belongs to another user"))
            }
            ActionError::Store(e) => AppError::from(e),
            ActionError::Tags(e) => AppError::from(e),
            other => AppError::InternalServerError(other.to_string()),
        }
    }
}
