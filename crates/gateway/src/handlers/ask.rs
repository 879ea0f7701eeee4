//! Document question answering without the agent

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;
use validator::Validate;

use crate::AppState;
use concierge_common::errors::{AppError, Result};
use concierge_search::QaAnswer;

#[derive(Debug, Deserialize, Validate)]
pub struct AskRequest {
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub question: String,
}

/// Answer a question from the indexed PDFs, with sources
pub async fn ask(
    State(state): State<AppState>,
    payload: std::result::Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<QaAnswer>> {
    let Json(request) = payload.map_err(|e| AppError::validation(e.body_text()))?;

    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("question".to_string()),
    })?;

    let answer = state.qa.answer(&request.question).await?;
    Ok(Json(answer))
}
