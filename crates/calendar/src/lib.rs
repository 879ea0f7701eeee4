//! Concierge calendar integration
//!
//! Creates appointment events through the Google Calendar API. OAuth tokens
//! are cached on disk, refreshed when they expire and, when nothing usable
//! is cached, obtained through the installed-app loopback flow.

pub mod client;
pub mod errors;
pub mod event;
pub mod oauth;

pub use client::{CalendarService, GoogleCalendarClient, RecordingCalendar};
pub use errors::CalendarError;
pub use event::{Appointment, CreatedEvent, EventRequest};
pub use oauth::{AccessTokenSource, GoogleTokenProvider, StaticToken};

/// Scope requested during authorization
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";
