//! Calendar error types

use concierge_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("Missing information: {0}")]
    MissingField(String),

    #[error("Invalid date/time '{input}': expected YYYY-MM-DD and HH:MM ({message})")]
    InvalidDateTime { input: String, message: String },

    #[error("Cannot read client secrets at {path}: {message}")]
    Credentials { path: String, message: String },

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Token store error: {0}")]
    TokenStore(String),

    #[error(transparent)]
    Upstream(#[from] AppError),
}

impl From<CalendarError> for AppError {
    fn from(e: CalendarError) -> Self {
        match e {
            CalendarError::MissingField(field) => AppError::MissingField { field },
            e @ CalendarError::InvalidDateTime { .. } => AppError::InvalidFormat {
                message: e.to_string(),
            },
            CalendarError::Upstream(e) => e,
            other => AppError::Calendar {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_bad_date_is_client_error() {
        let err: AppError = CalendarError::InvalidDateTime {
            input: "tomorrow 3pm".into(),
            message: "input contains invalid characters".into(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_auth_failure_is_calendar_error() {
        let err: AppError = CalendarError::Authorization("invalid_grant".into()).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "create_event failed: Authorization failed: invalid_grant");
    }
}
