//! Maps [`CoreError`] onto HTTP status codes (spec.md §7), so every handler
//! can just propagate with `?` instead of matching error variants itself.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::domain::errors::CoreError;

pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CoreError::Validation(_) => StatusCode::BAD_REQUEST,
            CoreError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Conflict(_) => StatusCode::CONFLICT,
            CoreError::PolicyDenied(_) => StatusCode::FORBIDDEN,
            CoreError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            CoreError::ExecutionFailed(_) | CoreError::RuleSnapshot(_) | CoreError::CyclicDependency(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
