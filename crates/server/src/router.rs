//! # HTTP Routes
//!
//! The request/response framing around the pipeline: a single chat endpoint
//! and a health probe. The pipeline itself never fails, so handlers always
//! answer 200 with a complete response body.

use crate::state::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use lapor::{ChatQuery, ChatResponse};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    pub message: String,
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn chat(State(state): State<AppState>, Json(payload): Json<ChatRequest>) -> Json<ChatResponse> {
    let session_id = payload
        .session_id
        .unwrap_or_else(|| "anonymous".to_string());
    let query = ChatQuery::new(payload.message, session_id);
    Json(state.pipeline.process(&query).await)
}
