use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use medcare_inference::InferenceError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// Every failure a handler can report. Feature modules translate their own
/// errors into one of these at the route boundary.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    /// Model asset missing; permanent until remedied outside the process.
    #[error("{0}")]
    ModelUnavailable(String),

    /// Model asset not installed yet; a later request may succeed.
    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::ModelUnavailable(_) | ApiError::Upstream(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "invalid_input",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::PayloadTooLarge(_) => "payload_too_large",
            ApiError::ModelUnavailable(_) | ApiError::ServiceUnavailable(_) => "model_unavailable",
            ApiError::Upstream(_) => "upstream_error",
            ApiError::Internal(_) => "internal_error",
        }
    }

    /// Mapping for the disease predictor, whose model is loaded once at start.
    pub fn from_prediction(err: InferenceError) -> Self {
        match err {
            InferenceError::InvalidCategory { .. } | InferenceError::InvalidInput(_) => {
                ApiError::InvalidInput(err.to_string())
            }
            InferenceError::ModelUnavailable(reason) => ApiError::ModelUnavailable(reason),
            other => ApiError::Internal(other.to_string()),
        }
    }

    /// Mapping for the lung-scan classifier, whose model may appear later.
    pub fn from_scan(err: InferenceError) -> Self {
        match err {
            InferenceError::InvalidImage(_) | InferenceError::InvalidInput(_) => {
                ApiError::InvalidInput(err.to_string())
            }
            InferenceError::ModelUnavailable(reason) => ApiError::ServiceUnavailable(reason),
            other => ApiError::Internal(format!("Prediction Error: {}", other)),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(kind = self.kind(), error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": self.kind(),
            "detail": self.to_string(),
        }));

        (status, body).into_response()
    }
}
