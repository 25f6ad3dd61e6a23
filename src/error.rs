use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Already enrolled in this course")]
    AlreadyEnrolled,

    #[error("Course is full")]
    CapacityExceeded,

    #[error("Time conflict with {course_name}")]
    TimeConflict { course_name: String },

    #[error("Course offering is closed")]
    OfferingClosed,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Login required")]
    Unauthorized,

    #[error("Not allowed: {0}")]
    Forbidden(String),

    #[error("Identity service error: {0}")]
    Upstream(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database",
            AppError::NotFound(_) => "not_found",
            AppError::AlreadyEnrolled => "already_enrolled",
            AppError::CapacityExceeded => "capacity_exceeded",
            AppError::TimeConflict { .. } => "time_conflict",
            AppError::OfferingClosed => "offering_closed",
            AppError::Conflict(_) => "conflict",
            AppError::BadRequest(_) => "bad_request",
            AppError::Unauthorized => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::Upstream(_) => "upstream",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyEnrolled
            | AppError::CapacityExceeded
            | AppError::TimeConflict { .. }
            | AppError::OfferingClosed
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self {
            AppError::Database(e) => {
                error!("database error: {}", e);
                "Database error occurred".to_string()
            }
            AppError::Upstream(e) => {
                error!("identity service error: {}", e);
                "Identity service unavailable".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            error: message,
            code: self.code(),
        });

        (status, body).into_response()
    }
}
