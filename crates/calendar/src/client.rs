//! Calendar API client

use crate::errors::CalendarError;
use crate::event::{Appointment, CreatedEvent, EventRequest};
use crate::oauth::AccessTokenSource;
use async_trait::async_trait;
use concierge_common::config::CalendarConfig;
use concierge_common::errors::AppError;
use concierge_common::metrics;
use concierge_common::retry::{classify_status, classify_transport, with_retry};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, instrument};

/// Something that can put appointments on a calendar
#[async_trait]
pub trait CalendarService: Send + Sync {
    async fn create_event(&self, appointment: &Appointment) -> Result<CreatedEvent, CalendarError>;
}

fn calendar_error(message: String) -> AppError {
    AppError::Calendar { message }
}

/// Google Calendar v3 client
pub struct GoogleCalendarClient {
    http: reqwest::Client,
    tokens: Arc<dyn AccessTokenSource>,
    events_url: String,
    time_zone: String,
    duration_minutes: i64,
    max_retries: u32,
}

impl GoogleCalendarClient {
    pub fn new(config: &CalendarConfig, tokens: Arc<dyn AccessTokenSource>) -> Result<Self, CalendarError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            tokens,
            events_url: format!(
                "{}/calendars/{}/events",
                config.api_base.trim_end_matches('/'),
                config.calendar_id
            ),
            time_zone: config.time_zone.clone(),
            duration_minutes: config.event_duration_minutes,
            max_retries: config.max_retries,
        })
    }

    async fn insert(
        &self,
        token: &str,
        event: &EventRequest,
    ) -> std::result::Result<CreatedEvent, backoff::Error<AppError>> {
        let response = self
            .http
            .post(&self.events_url)
            .bearer_auth(token)
            .json(event)
            .send()
            .await
            .map_err(|e| classify_transport(e, calendar_error))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body, calendar_error));
        }

        response.json().await.map_err(|e| {
            backoff::Error::permanent(calendar_error(format!("Failed to parse response: {}", e)))
        })
    }
}

#[async_trait]
impl CalendarService for GoogleCalendarClient {
    #[instrument(skip(self, appointment), fields(purpose = %appointment.purpose))]
    async fn create_event(&self, appointment: &Appointment) -> Result<CreatedEvent, CalendarError> {
        // Validate before any authorization work
        let event = EventRequest::from_appointment(appointment, &self.time_zone, self.duration_minutes)?;
        let token = self.tokens.access_token().await?;

        let result = with_retry("calendar_insert", self.max_retries, || self.insert(&token, &event)).await;
        metrics::record_calendar_event(result.is_ok());

        let created = result?;
        info!(event_id = %created.id, start = %event.start.date_time, "Calendar event created");
        Ok(created)
    }
}

/// Keeps created events in memory instead of calling an API
pub struct RecordingCalendar {
    events: Mutex<Vec<EventRequest>>,
    time_zone: String,
}

impl RecordingCalendar {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            time_zone: "UTC".to_string(),
        }
    }

    /// Events created so far
    pub fn events(&self) -> Vec<EventRequest> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl Default for RecordingCalendar {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CalendarService for RecordingCalendar {
    async fn create_event(&self, appointment: &Appointment) -> Result<CreatedEvent, CalendarError> {
        let event = EventRequest::from_appointment(appointment, &self.time_zone, 60)?;

        let mut events = self
            .events
            .lock()
            .map_err(|_| AppError::Internal {
                message: "recording calendar lock poisoned".to_string(),
            })?;
        events.push(event);

        let id = format!("evt{}", events.len());
        Ok(CreatedEvent {
            html_link: format!("https://calendar.google.com/calendar/event?eid={}", id),
            id,
        })
    }
}
