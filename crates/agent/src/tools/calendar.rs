//! Calendar booking tool
//!
//! Input problems come back as observations so the model can correct
//! itself; failures talking to the calendar abort the run.

use crate::errors::AgentError;
use crate::tool::Tool;
use async_trait::async_trait;
use concierge_calendar::{Appointment, CalendarError, CalendarService};
use concierge_common::metrics;
use std::sync::Arc;
use tracing::{info, warn};

pub const CALENDAR_TOOL_NAME: &str = "Google Calendar Tool";
const CALENDAR_TOOL_DESCRIPTION: &str =
    "Use this to create calendar events. Input should be JSON with keys: name, date, time, purpose.";

pub struct CalendarTool {
    calendar: Arc<dyn CalendarService>,
}

impl CalendarTool {
    pub fn new(calendar: Arc<dyn CalendarService>) -> Self {
        Self { calendar }
    }
}

/// Strip code fences and stray quoting models wrap JSON in
fn unwrap_json_input(input: &str) -> &str {
    let mut text = input.trim();

    if let Some(rest) = text.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        text = rest.strip_suffix("```").unwrap_or(rest).trim();
    }

    text.trim_matches(|c| c == '\'' || c == '`').trim()
}

#[async_trait]
impl Tool for CalendarTool {
    fn name(&self) -> &str {
        CALENDAR_TOOL_NAME
    }

    fn description(&self) -> &str {
        CALENDAR_TOOL_DESCRIPTION
    }

    async fn call(&self, input: &str) -> Result<String, AgentError> {
        let appointment: Appointment = match serde_json::from_str(unwrap_json_input(input)) {
            Ok(appointment) => appointment,
            Err(e) => {
                warn!(error = %e, "Calendar tool received invalid JSON");
                metrics::record_tool_call(CALENDAR_TOOL_NAME, false);
                return Ok(format!(
                    "Invalid input: {}. Input should be JSON with keys: name, date, time, purpose.",
                    e
                ));
            }
        };

        match self.calendar.create_event(&appointment).await {
            Ok(created) => {
                info!(event_id = %created.id, "Appointment booked by agent");
                metrics::record_tool_call(CALENDAR_TOOL_NAME, true);
                Ok(format!("Event created: {}", created.html_link))
            }
            Err(e @ (CalendarError::MissingField(_) | CalendarError::InvalidDateTime { .. })) => {
                metrics::record_tool_call(CALENDAR_TOOL_NAME, false);
                Ok(format!("{}. Use date YYYY-MM-DD and 24-hour time HH:MM.", e))
            }
            Err(e) => {
                metrics::record_tool_call(CALENDAR_TOOL_NAME, false);
                Err(AgentError::Tool {
                    tool: CALENDAR_TOOL_NAME.to_string(),
                    source: e.into(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_calendar::{CreatedEvent, RecordingCalendar};
    use concierge_common::errors::AppError;

    #[test]
    fn test_unwrap_json_input() {
        assert_eq!(unwrap_json_input("  {\"a\":1} "), "{\"a\":1}");
        assert_eq!(unwrap_json_input("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(unwrap_json_input("'{\"a\":1}'"), "{\"a\":1}");
        assert_eq!(unwrap_json_input("`{\"a\":1}`"), "{\"a\":1}");
    }

    #[tokio::test]
    async fn test_books_event() {
        let calendar = Arc::new(RecordingCalendar::new());
        let tool = CalendarTool::new(calendar.clone());

        let observation = tool
            .call(r#"{"name": "Lee", "date": "2025-04-02", "time": "14:00", "purpose": "Project review"}"#)
            .await
            .unwrap();

        assert!(observation.starts_with("Event created: https://calendar.google.com/"));
        let events = calendar.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].summary, "Project review");
        assert_eq!(events[0].start.date_time, "2025-04-02T14:00:00");
    }

    #[tokio::test]
    async fn test_accepts_alias_keys() {
        let calendar = Arc::new(RecordingCalendar::new());
        let tool = CalendarTool::new(calendar.clone());

        tool.call(r#"{"name": "Lee", "date_str": "2025-04-02", "time_str": "09:30", "purpose": "Call"}"#)
            .await
            .unwrap();
        assert_eq!(calendar.events()[0].start.date_time, "2025-04-02T09:30:00");
    }

    #[tokio::test]
    async fn test_bad_input_becomes_observation() {
        let calendar = Arc::new(RecordingCalendar::new());
        let tool = CalendarTool::new(calendar.clone());

        let obs = tool.call("book it for tomorrow").await.unwrap();
        assert!(obs.starts_with("Invalid input:"));

        let obs = tool
            .call(r#"{"name": "Lee", "date": "2025-04-02", "purpose": "Call"}"#)
            .await
            .unwrap();
        assert!(obs.contains("Missing information: time"));

        let obs = tool
            .call(r#"{"name": "Lee", "date": "April 2nd", "time": "2pm", "purpose": "Call"}"#)
            .await
            .unwrap();
        assert!(obs.contains("Invalid date/time"));

        assert!(calendar.events().is_empty());
    }

    #[tokio::test]
    async fn test_upstream_failure_is_error() {
        struct Broken;

        #[async_trait]
        impl CalendarService for Broken {
            async fn create_event(&self, _: &Appointment) -> Result<CreatedEvent, CalendarError> {
                Err(CalendarError::Upstream(AppError::Calendar {
                    message: "API error 500".into(),
                }))
            }
        }

        let tool = CalendarTool::new(Arc::new(Broken));
        let err = tool
            .call(r#"{"name": "Lee", "date": "2025-04-02", "time": "14:00", "purpose": "Call"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Tool { .. }));
    }
}
