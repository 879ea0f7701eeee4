//! ReAct agent loop

use crate::errors::AgentError;
use crate::parser::{parse_output, AgentStep};
use crate::prompt::{build_prompt, render_template, STOP_SEQUENCES};
use crate::tool::Tool;
use concierge_common::config::AgentConfig;
use concierge_common::{metrics, LanguageModel};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Returned when the loop runs out of steps or time
pub const EARLY_STOP_MESSAGE: &str = "Agent stopped due to iteration limit or time limit.";

/// One tool call and what came back
#[derive(Debug, Clone, Serialize)]
pub struct IntermediateStep {
    pub tool: String,
    pub tool_input: String,
    /// Raw model output that led to the call
    pub log: String,
    pub observation: String,
}

/// Outcome of a run
#[derive(Debug, Clone, Serialize)]
pub struct AgentRun {
    pub output: String,
    pub intermediate_steps: Vec<IntermediateStep>,
    pub iterations: usize,
}

/// Drives the model through Thought/Action/Observation steps
pub struct AgentExecutor {
    llm: Arc<dyn LanguageModel>,
    tools: Vec<Arc<dyn Tool>>,
    template: String,
    stop: Vec<String>,
    max_iterations: usize,
    max_execution_time: Option<Duration>,
}

impl AgentExecutor {
    pub fn new(llm: Arc<dyn LanguageModel>, tools: Vec<Arc<dyn Tool>>) -> Self {
        let template = render_template(&tools);
        Self {
            llm,
            tools,
            template,
            stop: STOP_SEQUENCES.iter().map(|s| s.to_string()).collect(),
            max_iterations: 15,
            max_execution_time: None,
        }
    }

    pub fn from_config(llm: Arc<dyn LanguageModel>, tools: Vec<Arc<dyn Tool>>, config: &AgentConfig) -> Self {
        Self::new(llm, tools)
            .with_max_iterations(config.max_iterations)
            .with_max_execution_time((config.max_execution_secs > 0).then(|| Duration::from_secs(config.max_execution_secs)))
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_max_execution_time(mut self, limit: Option<Duration>) -> Self {
        self.max_execution_time = limit;
        self
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    fn should_continue(&self, iterations: usize, started: Instant) -> bool {
        if iterations >= self.max_iterations {
            return false;
        }
        match self.max_execution_time {
            Some(limit) => started.elapsed() < limit,
            None => true,
        }
    }

    fn scratchpad(steps: &[IntermediateStep]) -> String {
        steps
            .iter()
            .map(|s| format!("{}\nObservation: {}\nThought: ", s.log, s.observation))
            .collect()
    }

    async fn call_tool(&self, name: &str, input: &str) -> Result<String, AgentError> {
        match self.tools.iter().find(|t| t.name() == name) {
            Some(tool) => {
                debug!(tool = name, input, "Calling tool");
                tool.call(input).await
            }
            None => {
                warn!(tool = name, "Model asked for an unknown tool");
                Ok(format!(
                    "{} is not a valid tool, try one of [{}].",
                    name,
                    self.tool_names().join(", ")
                ))
            }
        }
    }

    /// Run the agent on one user message
    #[instrument(skip(self, input), fields(input_len = input.len()))]
    pub async fn run(&self, input: &str) -> Result<AgentRun, AgentError> {
        let started = Instant::now();
        let mut steps: Vec<IntermediateStep> = Vec::new();
        let mut iterations = 0;

        let result = loop {
            if !self.should_continue(iterations, started) {
                warn!(iterations, "Agent stopped before reaching a final answer");
                break Ok(EARLY_STOP_MESSAGE.to_string());
            }

            let prompt = build_prompt(&self.template, input, &Self::scratchpad(&steps));
            let output = match self.llm.complete(&prompt, &self.stop).await {
                Ok(output) => output,
                Err(e) => break Err(AgentError::from(e)),
            };
            iterations += 1;

            match parse_output(&output) {
                Ok(AgentStep::Finish(answer)) => break Ok(answer),
                Ok(AgentStep::Action { tool, input: tool_input }) => {
                    let observation = match self.call_tool(&tool, &tool_input).await {
                        Ok(observation) => observation,
                        Err(e) => break Err(e),
                    };
                    debug!(tool = %tool, observation = %observation, "Tool returned");
                    steps.push(IntermediateStep {
                        tool,
                        tool_input,
                        log: output,
                        observation,
                    });
                }
                Err(e) => break Err(e),
            }
        };

        let outcome = match &result {
            Ok(output) if output == EARLY_STOP_MESSAGE => "stopped",
            Ok(_) => "finished",
            Err(_) => "error",
        };
        metrics::record_agent_run(started.elapsed().as_secs_f64(), iterations, outcome);
        info!(iterations, outcome, elapsed_ms = started.elapsed().as_millis() as u64, "Agent run complete");

        Ok(AgentRun {
            output: result?,
            intermediate_steps: steps,
            iterations,
        })
    }
}
