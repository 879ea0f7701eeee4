//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;
use crate::AppState;

#[derive(Serialize)]
pub struct RootResponse {
    pub message: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub index: IndexCheck,
    pub models: ModelInfo,
}

#[derive(Serialize)]
pub struct IndexCheck {
    pub chunks: usize,
    pub documents: usize,
}

#[derive(Serialize)]
pub struct ModelInfo {
    pub embedding: String,
    pub llm: String,
}

/// Banner for a quick "is it up" check from the frontend
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Backend is running!".to_string(),
    })
}

/// Liveness check, healthy whenever the server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

/// Readiness check, reports what the assistant can answer from
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let ready = state.index.chunks > 0;

    Json(ReadyResponse {
        status: if ready { "ready" } else { "empty_index" }.to_string(),
        index: IndexCheck {
            chunks: state.index.chunks,
            documents: state.index.documents,
        },
        models: ModelInfo {
            embedding: state.index.embedding_model.clone(),
            llm: state.llm_model.clone(),
        },
    })
}
