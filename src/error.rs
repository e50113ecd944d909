//! Request-scoped failures and their HTTP rendering.
//!
//! Every failure is surfaced to the caller as a status code plus a JSON envelope
//! `{ code, message, details? }`. None of them are fatal to the process.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use utoipa::ToSchema;

use crate::{auth::ValidRole, repository::RepositoryError};

#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or malformed input, or a protected route reached without a subject.
    #[error("{0}")]
    InvalidRequest(String),
    /// Credentials were presented but could not be verified.
    #[error("{0}")]
    Unauthorized(String),
    /// The subject holds none of the acceptable roles.
    #[error("User does not have the required roles: {}", role_list(.required))]
    Forbidden { required: Vec<ValidRole> },
    #[error("{0}")]
    NotFound(String),
    /// Storage or other unexpected failure. The inner text is logged, never returned.
    #[error("Internal server error")]
    Internal(String),
}

/// ErrorBody
///
/// Wire shape of every error response.
#[derive(Debug, Serialize, serde::Deserialize, ToSchema)]
pub struct ErrorBody {
    #[schema(example = "forbidden")]
    pub code: String,
    #[schema(example = "User does not have the required roles: admin")]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden { .. } => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Internal(_) => "internal_error",
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            Self::Forbidden { required } => Some(json!({ "requiredRoles": required })),
            _ => None,
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Self::Internal(cause) = &self {
            tracing::error!(%cause, "request failed with internal error");
        }
        (self.status(), Json(self.to_body())).into_response()
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            // The parent or author vanished between validation and insert.
            RepositoryError::MissingReference => {
                Self::NotFound("Referenced comment or user no longer exists".to_string())
            }
            RepositoryError::Database(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    /// Unreadable or ill-typed JSON bodies are invalid requests like any other bad input.
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidRequest(rejection.body_text())
    }
}

fn role_list(roles: &[ValidRole]) -> String {
    roles
        .iter()
        .map(ValidRole::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
