use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
    routing::post,
};

use crate::error::{ApiError, ApiResult};
use crate::models::{ChatRequest, ChatResponse};
use crate::service::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

pub fn router() -> Router<AppState> {
    Router::new().route("/message", post(chat_message))
}

async fn chat_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<ChatResponse> {
    let Json(request) = payload?;
    let request_key = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    let reply = state
        .chat
        .relay(&request, request_key)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(ChatResponse {
        reply: reply.reply,
        status: "success".to_string(),
        provider: reply.provider,
    }))
}
