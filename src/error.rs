use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// StorageError
///
/// Failures raised by the persistence layer. These never carry a policy meaning;
/// they surface to the client as a generic 500.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// CommentError
///
/// The structured outcome of every rejected comment operation.
///
/// `NotFound` deliberately covers both "absent" and "hidden by soft-delete" so that
/// a non-privileged caller cannot tell the two apart.
#[derive(Debug, thiserror::Error)]
pub enum CommentError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("authentication required")]
    Unauthenticated,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl CommentError {
    pub fn status(&self) -> StatusCode {
        match self {
            CommentError::NotFound(_) => StatusCode::NOT_FOUND,
            CommentError::Forbidden(_) => StatusCode::FORBIDDEN,
            CommentError::Invalid(_) => StatusCode::BAD_REQUEST,
            CommentError::Unauthenticated => StatusCode::UNAUTHORIZED,
            CommentError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Malformed request input gets the same JSON error body as every other failure.

impl From<QueryRejection> for CommentError {
    fn from(rejection: QueryRejection) -> Self {
        CommentError::Invalid(rejection.body_text())
    }
}

impl From<JsonRejection> for CommentError {
    fn from(rejection: JsonRejection) -> Self {
        CommentError::Invalid(rejection.body_text())
    }
}

impl From<PathRejection> for CommentError {
    fn from(rejection: PathRejection) -> Self {
        CommentError::Invalid(rejection.body_text())
    }
}

impl IntoResponse for CommentError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            // Log the underlying storage error but keep its details out of the response.
            CommentError::Storage(e) => {
                tracing::error!("storage failure: {:?}", e);
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
