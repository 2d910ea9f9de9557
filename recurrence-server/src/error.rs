//! Error handling

use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    response::{IntoResponse, Response},
    http::StatusCode,
    Json,
};
use recurrence_engine::EngineError;
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    // Input errors
    SchemaMismatch(String),
    ValidationError(String),

    // Resource errors
    NotFound(String),

    // Storage errors
    PersistenceError(String),

    // Startup artifact errors (model / threshold / reference data)
    InvalidThreshold(String),
    UpstreamArtifact(String),

    // Generic errors
    InternalError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::SchemaMismatch(msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.as_str()),
            AppError::PersistenceError(msg) => {
                tracing::error!("Persistence error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error occurred")
            }
            AppError::InvalidThreshold(msg) | AppError::UpstreamArtifact(msg) => {
                tracing::error!("Artifact error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Model artifacts unavailable")
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::SchemaMismatch { .. } => AppError::SchemaMismatch(err.to_string()),
            EngineError::InvalidThreshold(_) => AppError::InvalidThreshold(err.to_string()),
            EngineError::UpstreamArtifact { .. } => AppError::UpstreamArtifact(err.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => AppError::NotFound("Patient not found".to_string()),
            other => AppError::PersistenceError(other.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

// ============================================================================
// STORE ERRORS
// ============================================================================

/// Record store failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record {0} not found")]
    NotFound(i64),

    /// Another writer took the reference between check and insert
    #[error("reference collision: {0}")]
    UniqueViolation(String),

    /// Lock contention on the database file
    #[error("database busy: {0}")]
    Busy(String),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::UniqueViolation(db.message().to_string())
            }
            sqlx::Error::Database(db) if is_busy_code(db.code().as_deref()) => {
                StoreError::Busy(db.message().to_string())
            }
            sqlx::Error::PoolTimedOut => StoreError::Busy(err.to_string()),
            _ => StoreError::Database(err),
        }
    }
}

/// SQLITE_BUSY (5) / SQLITE_LOCKED (6), including extended codes
fn is_busy_code(code: Option<&str>) -> bool {
    code.and_then(|c| c.parse::<i32>().ok())
        .map(|c| matches!(c & 0xff, 5 | 6))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use recurrence_engine::Artifact;

    #[test]
    fn test_busy_codes() {
        assert!(is_busy_code(Some("5")));
        assert!(is_busy_code(Some("517"))); // SQLITE_BUSY_SNAPSHOT
        assert!(is_busy_code(Some("6")));
        assert!(!is_busy_code(Some("2067"))); // SQLITE_CONSTRAINT_UNIQUE
        assert!(!is_busy_code(Some("abc")));
        assert!(!is_busy_code(None));
    }

    #[test]
    fn test_sqlx_classification() {
        assert!(matches!(StoreError::from(sqlx::Error::PoolTimedOut), StoreError::Busy(_)));
        assert!(matches!(StoreError::from(sqlx::Error::RowNotFound), StoreError::Database(_)));
    }

    #[test]
    fn test_status_codes() {
        let schema = AppError::from(EngineError::SchemaMismatch {
            missing: vec!["age".into()],
            unexpected: vec![],
            invalid: vec![],
        });
        assert_eq!(schema.into_response().status(), StatusCode::BAD_REQUEST);

        let missing = AppError::from(StoreError::NotFound(7));
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);

        let busy = AppError::from(StoreError::Busy("locked".into()));
        assert_eq!(busy.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);

        let artifact = AppError::from(EngineError::artifact(Artifact::Model, "gone"));
        assert_eq!(artifact.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
