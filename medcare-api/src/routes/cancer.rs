use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
    routing::post,
};
use tracing::{debug, info};

use crate::error::{ApiError, ApiResult};
use crate::models::{ScanResponse, as_percentage};
use crate::service::AppState;

const FILE_FIELD: &str = "file";

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/scan", post(scan_image))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

async fn scan_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<ScanResponse> {
    let multipart = multipart
        .map_err(|e| ApiError::InvalidInput(format!("Expected a multipart upload: {}", e)))?;
    let image_bytes = read_file_field(multipart).await?;

    let result = state
        .cancer
        .scan(image_bytes)
        .await
        .map_err(ApiError::from_scan)?;

    info!(
        prediction = %result.label,
        confidence = result.confidence,
        "Lung scan classified"
    );

    Ok(Json(ScanResponse {
        prediction: result.label,
        confidence: as_percentage(result.confidence),
        raw_scores: result.scores,
    }))
}

/// Bytes of the first `file` part; other parts are ignored.
async fn read_file_field(mut multipart: Multipart) -> Result<Vec<u8>, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        if field.name() != Some(FILE_FIELD) {
            debug!(field = ?field.name(), "Skipping multipart field");
            continue;
        }

        let bytes = field.bytes().await.map_err(upload_error)?;
        return Ok(bytes.to_vec());
    }

    Err(ApiError::InvalidInput(format!(
        "Missing multipart field '{}'",
        FILE_FIELD
    )))
}

/// Oversized bodies keep their 413; every other read failure is the caller's
/// malformed upload.
fn upload_error(err: MultipartError) -> ApiError {
    let message = format!("Could not read upload: {}", err.body_text());
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(message)
    } else {
        ApiError::InvalidInput(message)
    }
}
