//! Error handling with RFC 7807 Problem Details for JSON responses

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::warn;

pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<dispatch_core::Error> for AppError {
    fn from(err: dispatch_core::Error) -> Self {
        use dispatch_core::Error;

        match err {
            Error::MalformedMessage { .. }
            | Error::InvalidRule { .. }
            | Error::InvalidRequirements { .. }
            | Error::JsonParseFailed { .. } => Self::BadRequest(err.to_string()),
            Error::UnknownResource { .. } | Error::UnknownRequirementSet { .. } => {
                Self::NotFound(err.to_string())
            }
            Error::TransportUnavailable { .. } => Self::ServiceUnavailable(err.to_string()),
            Error::ConfigReadFailed { .. }
            | Error::InvalidConfig { .. }
            | Error::TomlParseFailed { .. }
            | Error::Io(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// RFC 7807 Problem Details for HTTP APIs
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    #[serde(rename = "type")]
    problem_type: String,
    title: String,
    status: u16,
    detail: String,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            problem_type: "about:blank".to_string(),
            title: title.into(),
            status: status.as_u16(),
            detail: detail.into(),
        }
    }

    pub fn from_error(err: &AppError) -> Self {
        let status = err.status_code();
        let title = status.canonical_reason().unwrap_or("Error");
        Self::new(status, title, err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!(error = %self, "Request failed");
        }
        let response = ErrorResponse::from_error(&self);
        (
            status,
            [(http::header::CONTENT_TYPE, "application/problem+json")],
            Json(response),
        )
            .into_response()
    }
}
