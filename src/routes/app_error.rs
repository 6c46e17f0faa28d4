//! Translation of [`ServiceError`] into HTTP responses.
//!
//! Caller-facing categories keep their message. Store failures are logged
//! with their cause and answered with an opaque 500.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{debug, error};

use crate::ServiceError;

// ---

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        // ---
        let (status, message) = match self {
            ServiceError::Validation(message) => (StatusCode::BAD_REQUEST, message),
            ServiceError::Conflict(message) => (StatusCode::CONFLICT, message),
            ServiceError::Integrity(message) => (StatusCode::BAD_REQUEST, message),
            ServiceError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ServiceError::Store(cause) => {
                error!("Internal Server Error: {}", cause);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Implement `From<$rejection>` as a validation error carrying axum's text.
macro_rules! rejection_into_validation {
    ($($rejection:ty),+ $(,)?) => {
        $(
            impl From<$rejection> for ServiceError {
                fn from(rejection: $rejection) -> Self {
                    debug!("Rejected request: {}", rejection.body_text());
                    ServiceError::Validation(rejection.body_text())
                }
            }
        )+
    };
}

rejection_into_validation!(JsonRejection, QueryRejection, PathRejection);
