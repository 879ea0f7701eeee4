//! Tools available to the agent

mod calendar;
mod documents;

pub use calendar::CalendarTool;
pub use documents::DocumentQaTool;
