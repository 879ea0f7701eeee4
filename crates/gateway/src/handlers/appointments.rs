//! Direct appointment booking

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Serialize;

use crate::AppState;
use concierge_calendar::Appointment;
use concierge_common::errors::{AppError, Result};

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub message: String,
    pub calendar_link: String,
}

/// Book an appointment without going through the agent
pub async fn book_appointment(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Appointment>, JsonRejection>,
) -> Result<Json<BookingResponse>> {
    let Json(appointment) = payload.map_err(|e| AppError::validation(e.body_text()))?;

    let missing = appointment.missing_fields();
    if !missing.is_empty() {
        return Err(AppError::Validation {
            message: "Missing information".to_string(),
            field: Some(missing.join(", ")),
        });
    }

    let created = state
        .calendar
        .create_event(&appointment)
        .await
        .map_err(AppError::from)?;

    tracing::info!(event_id = %created.id, date = %appointment.date, "Appointment booked");

    Ok(Json(BookingResponse {
        message: format!(
            "Appointment booked for {} on {} at {} for {}.",
            appointment.name, appointment.date, appointment.time, appointment.purpose
        ),
        calendar_link: created.html_link,
    }))
}
