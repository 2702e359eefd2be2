use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Unprocessable Entity",
    "code": "insufficient_quantity",
    "message": "Insufficient quantity: requested 40 but only 30 available",
    "request_id": "req-abc123xyz",
    "timestamp": "2025-03-01T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g. "Not Found", "Conflict")
    #[schema(example = "Unprocessable Entity")]
    pub error: String,
    /// Stable machine-readable error code
    #[schema(example = "insufficient_quantity")]
    pub code: String,
    /// Human-readable error description
    pub message: String,
    /// Request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// RFC 3339 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Insufficient quantity: {0}")]
    InsufficientQuantity(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The database refused a write because another writer holds the lock.
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(errors.to_string())
    }
}

/// Driver messages for lock contention: SQLite busy/locked, Postgres
/// serialization failures and deadlocks.
const CONTENTION_MARKERS: &[&str] = &[
    "database is locked",
    "database table is locked",
    "database is busy",
    "could not serialize access",
    "deadlock detected",
];

fn is_lock_contention(error: &DbErr) -> bool {
    let message = error.to_string().to_lowercase();
    CONTENTION_MARKERS.iter().any(|marker| message.contains(marker))
}

impl ServiceError {
    /// Wraps a `DbErr`, separating lock contention from other failures so
    /// callers can retry it.
    pub fn db_error(error: DbErr) -> Self {
        if is_lock_contention(&error) {
            ServiceError::ConcurrentModification(error.to_string())
        } else {
            ServiceError::DatabaseError(error)
        }
    }

    /// Whether retrying the whole operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification(_))
    }

    /// Stable error code surfaced to clients and used as a metric label.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "database_error",
            Self::NotFound(_) => "not_found",
            Self::ValidationError(_) => "validation_error",
            Self::InsufficientQuantity(_) => "insufficient_quantity",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Conflict(_) => "conflict",
            Self::ConcurrentModification(_) => "concurrent_modification",
            Self::InternalError(_) | Self::Other(_) => "internal_error",
        }
    }

    /// Single source of truth for the error to status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::InsufficientQuantity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidTransition(_) | Self::Conflict(_) | Self::ConcurrentModification(_) => {
                StatusCode::CONFLICT
            }
            Self::DatabaseError(_) | Self::InternalError(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message placed in the response body. Infrastructure failures are masked.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::ConcurrentModification(_) => {
                "The resource is busy, please retry".to_string()
            }
            Self::InternalError(_) | Self::Other(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), "request failed");
        }

        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            code: self.code().to_string(),
            message: self.response_message(),
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}
