//! Appointment parsing and the Calendar API event body

use crate::errors::CalendarError;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

const INPUT_FORMAT: &str = "%Y-%m-%d %H:%M";
const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// An appointment request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    #[serde(default)]
    pub name: String,
    /// `YYYY-MM-DD`
    #[serde(default, alias = "date_str")]
    pub date: String,
    /// `HH:MM`, 24-hour clock
    #[serde(default, alias = "time_str")]
    pub time: String,
    #[serde(default)]
    pub purpose: String,
}

impl Appointment {
    pub fn new(
        name: impl Into<String>,
        date: impl Into<String>,
        time: impl Into<String>,
        purpose: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            date: date.into(),
            time: time.into(),
            purpose: purpose.into(),
        }
    }

    /// Names of fields that are empty
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("name", &self.name),
            ("date", &self.date),
            ("time", &self.time),
            ("purpose", &self.purpose),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect()
    }

    /// Fail unless every field is filled in
    pub fn ensure_complete(&self) -> Result<(), CalendarError> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(CalendarError::MissingField(missing.join(", ")))
        }
    }

    /// Start of the appointment as a naive local time
    pub fn start(&self) -> Result<NaiveDateTime, CalendarError> {
        let input = format!("{} {}", self.date.trim(), self.time.trim());
        NaiveDateTime::parse_from_str(&input, INPUT_FORMAT).map_err(|e| CalendarError::InvalidDateTime {
            input,
            message: e.to_string(),
        })
    }
}

/// Start or end of an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    pub date_time: String,
    pub time_zone: String,
}

/// Body of an `events.insert` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRequest {
    pub summary: String,
    pub description: String,
    pub start: EventDateTime,
    pub end: EventDateTime,
}

impl EventRequest {
    pub fn from_appointment(
        appointment: &Appointment,
        time_zone: &str,
        duration_minutes: i64,
    ) -> Result<Self, CalendarError> {
        appointment.ensure_complete()?;

        let start = appointment.start()?;
        let end = Duration::try_minutes(duration_minutes)
            .and_then(|length| start.checked_add_signed(length))
            .ok_or_else(|| CalendarError::InvalidDateTime {
                input: format!("{} {}", appointment.date.trim(), appointment.time.trim()),
                message: format!("an event of {} minutes ends out of range", duration_minutes),
            })?;

        Ok(Self {
            summary: appointment.purpose.clone(),
            description: format!("Appointment with {}", appointment.name),
            start: EventDateTime {
                date_time: start.format(ISO_FORMAT).to_string(),
                time_zone: time_zone.to_string(),
            },
            end: EventDateTime {
                date_time: end.format(ISO_FORMAT).to_string(),
                time_zone: time_zone.to_string(),
            },
        })
    }
}

/// The parts of an inserted event callers care about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedEvent {
    pub id: String,
    #[serde(rename = "htmlLink")]
    pub html_link: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_body() {
        let appt = Appointment::new("Dana", "2025-03-14", "15:30", "Dental checkup");
        let event = EventRequest::from_appointment(&appt, "UTC", 60).unwrap();

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["summary"], "Dental checkup");
        assert_eq!(value["description"], "Appointment with Dana");
        assert_eq!(value["start"]["dateTime"], "2025-03-14T15:30:00");
        assert_eq!(value["start"]["timeZone"], "UTC");
        assert_eq!(value["end"]["dateTime"], "2025-03-14T16:30:00");
    }

    #[test]
    fn test_event_crosses_midnight() {
        let appt = Appointment::new("Dana", "2025-12-31", "23:30", "Countdown");
        let event = EventRequest::from_appointment(&appt, "Europe/Berlin", 60).unwrap();
        assert_eq!(event.end.date_time, "2026-01-01T00:30:00");
        assert_eq!(event.end.time_zone, "Europe/Berlin");
    }

    #[test]
    fn test_invalid_date() {
        let appt = Appointment::new("Dana", "14/03/2025", "15:30", "Checkup");
        let err = appt.start().unwrap_err();
        assert!(matches!(err, CalendarError::InvalidDateTime { .. }));
        assert!(err.to_string().contains("14/03/2025 15:30"));
    }

    #[test]
    fn test_missing_fields() {
        let appt = Appointment::new("Dana", "", "15:30", " ");
        assert_eq!(appt.missing_fields(), vec!["date", "purpose"]);
        assert!(matches!(
            EventRequest::from_appointment(&appt, "UTC", 60),
            Err(CalendarError::MissingField(_))
        ));
    }

    #[test]
    fn test_aliases_accepted() {
        let appt: Appointment = serde_json::from_str(
            r#"{"name":"Dana","date_str":"2025-03-14","time_str":"09:00","purpose":"Call"}"#,
        )
        .unwrap();
        assert_eq!(appt.date, "2025-03-14");
        assert_eq!(appt.time, "09:00");
    }

    #[test]
    fn test_created_event_from_api_response() {
        let event: CreatedEvent = serde_json::from_str(
            r#"{"kind":"calendar#event","id":"abc123","htmlLink":"https://calendar.google.com/event?eid=abc123","status":"confirmed"}"#,
        )
        .unwrap();
        assert_eq!(event.id, "abc123");
        assert!(event.html_link.ends_with("abc123"));
    }

    #[test]
    fn test_out_of_range_duration_is_rejected() {
        let appt = Appointment::new("Dana", "2025-03-14", "09:00", "Call");

        for minutes in [i64::MAX, i64::MIN, 400_000_000_000] {
            let err = EventRequest::from_appointment(&appt, "UTC", minutes).unwrap_err();
            assert!(matches!(err, CalendarError::InvalidDateTime { .. }));
        }
    }
}
