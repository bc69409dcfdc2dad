use crate::models::ErrorResponse;
use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use friendgraph_core::CoreError;
use tracing::error;

/// A core error on its way out as `{status: "error", error}`.
#[derive(Debug)]
pub struct ApiError(pub CoreError);

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            CoreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            CoreError::PrivateProfile(_) => StatusCode::FORBIDDEN,
            CoreError::NotReady(_) => StatusCode::CONFLICT,
            CoreError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Database(_)
            | CoreError::Serialization(_)
            | CoreError::Join(_)
            | CoreError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(error: CoreError) -> Self {
        Self(error)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(CoreError::InvalidInput(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(CoreError::InvalidInput(rejection.body_text()))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(error: serde_json::Error) -> Self {
        Self(CoreError::Serialization(error))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }

        let body = ErrorResponse {
            status: "error".to_string(),
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
