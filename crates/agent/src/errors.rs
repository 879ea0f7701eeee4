//! Agent error types

use concierge_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Could not parse LLM output: `{output}` ({reason})")]
    OutputParse { output: String, reason: String },

    #[error("Tool '{tool}' failed: {source}")]
    Tool {
        tool: String,
        #[source]
        source: AppError,
    },

    #[error(transparent)]
    App(#[from] AppError),
}

/// A failed run is a server error; upstream statuses like 502 are folded into 500
fn run_failure(e: AppError) -> AppError {
    if e.is_client_error() || e.status_code().as_u16() == 500 {
        e
    } else {
        AppError::Agent {
            message: e.to_string(),
        }
    }
}

impl From<AgentError> for AppError {
    fn from(e: AgentError) -> Self {
        match e {
            AgentError::App(e) => run_failure(e),
            // Calendar failures keep their own message
            AgentError::Tool { source, .. } => run_failure(source),
            other => AppError::Agent {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_common::errors::ErrorCode;

    #[test]
    fn test_llm_failure_becomes_internal_error() {
        let err: AppError = AgentError::App(AppError::Llm {
            message: "connection refused".into(),
        })
        .into();

        assert_eq!(err.status_code().as_u16(), 500);
        assert_eq!(err.code(), ErrorCode::AgentError);
        assert_eq!(err.to_string(), "LLM error: connection refused");
    }

    #[test]
    fn test_calendar_failure_keeps_message() {
        let err: AppError = AgentError::Tool {
            tool: "Google Calendar Tool".into(),
            source: AppError::Calendar {
                message: "API error 403".into(),
            },
        }
        .into();

        assert_eq!(err.status_code().as_u16(), 500);
        assert_eq!(err.to_string(), "create_event failed: API error 403");
    }

    #[test]
    fn test_parse_failure_is_internal_error() {
        let err: AppError = AgentError::OutputParse {
            output: "hmm".into(),
            reason: "missing 'Action:' after 'Thought:'".into(),
        }
        .into();
        assert_eq!(err.code(), ErrorCode::AgentError);
    }
}
