//! Tool abstraction for the agent

use crate::errors::AgentError;
use async_trait::async_trait;

/// An action the agent can take
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to pick this tool
    fn name(&self) -> &str;

    /// Shown to the model in the prompt
    fn description(&self) -> &str;

    /// Run the tool on the raw action input and return the observation
    async fn call(&self, input: &str) -> Result<String, AgentError>;
}
