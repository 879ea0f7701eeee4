//! Free-text assistant endpoint

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use validator::Validate;

use crate::AppState;
use concierge_common::errors::{AppError, Result};

#[derive(Debug, Deserialize, Validate)]
pub struct AgentRequest {
    #[serde(default)]
    #[validate(length(max = 4000))]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct AgentResponse {
    pub answer: String,
}

/// Route a message through the agent
pub async fn run_agent(
    State(state): State<AppState>,
    payload: std::result::Result<Json<AgentRequest>, JsonRejection>,
) -> Result<Json<AgentResponse>> {
    let Json(request) = payload.map_err(|e| AppError::validation(e.body_text()))?;

    if request.message.trim().is_empty() {
        return Err(AppError::Validation {
            message: "No message provided".to_string(),
            field: Some("message".to_string()),
        });
    }
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("message".to_string()),
    })?;

    let start = Instant::now();
    let run = state.agent.run(&request.message).await?;

    tracing::info!(
        iterations = run.iterations,
        tools = ?run.intermediate_steps.iter().map(|s| s.tool.as_str()).collect::<Vec<_>>(),
        latency_ms = start.elapsed().as_millis() as u64,
        "Agent request completed"
    );

    Ok(Json(AgentResponse { answer: run.output }))
}
