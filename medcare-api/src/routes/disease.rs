use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::post,
};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::models::{DISEASE_MODULE_NAME, PatientRecord, PredictResponse, round_to};
use crate::service::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/predict", post(predict_disease))
}

async fn predict_disease(
    State(state): State<AppState>,
    payload: Result<Json<PatientRecord>, JsonRejection>,
) -> ApiResult<PredictResponse> {
    let Json(record) = payload?;

    let prediction = state
        .disease
        .predict(&record)
        .map_err(ApiError::from_prediction)?;

    info!(
        prediction = %prediction.label,
        confidence = prediction.confidence,
        "Disease prediction served"
    );

    Ok(Json(PredictResponse {
        prediction: prediction.label,
        confidence: round_to(prediction.confidence, 4),
        module: DISEASE_MODULE_NAME.to_string(),
    }))
}
