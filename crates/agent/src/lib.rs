//! Concierge tool-routing agent
//!
//! A zero-shot ReAct loop: the model reads the tool descriptions, picks an
//! action, sees the observation, and repeats until it produces a final
//! answer or runs out of steps.

pub mod errors;
pub mod executor;
pub mod parser;
pub mod prompt;
pub mod tool;
pub mod tools;

pub use errors::AgentError;
pub use executor::{AgentExecutor, AgentRun, IntermediateStep};
pub use tool::Tool;
pub use tools::{CalendarTool, DocumentQaTool};
