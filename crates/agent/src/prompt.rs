//! Zero-shot ReAct prompt

use crate::tool::Tool;
use std::sync::Arc;

const PREFIX: &str = "Answer the following questions as best you can. You have access to the following tools:";

const FORMAT_INSTRUCTIONS: &str = "Use the following format:

Question: the input question you must answer
Thought: you should always think about what to do
Action: the action to take, should be one of [{tool_names}]
Action Input: the input to the action
Observation: the result of the action
... (this Thought/Action/Action Input/Observation can repeat N times)
Thought: I now know the final answer
Final Answer: the final answer to the original input question";

const SUFFIX: &str = "Begin!

Question: {input}
Thought:{agent_scratchpad}";

/// Where the model would start inventing tool results
pub const STOP_SEQUENCES: &[&str] = &["\nObservation:", "\n\tObservation:"];

/// Prompt template with the tool section filled in
pub fn render_template(tools: &[Arc<dyn Tool>]) -> String {
    let tool_strings = tools
        .iter()
        .map(|t| format!("{}: {}", t.name(), t.description()))
        .collect::<Vec<_>>()
        .join("\n");
    let tool_names = tools.iter().map(|t| t.name()).collect::<Vec<_>>().join(", ");

    [
        PREFIX.to_string(),
        tool_strings,
        FORMAT_INSTRUCTIONS.replace("{tool_names}", &tool_names),
        SUFFIX.to_string(),
    ]
    .join("\n\n")
}

/// Fill the template for one step.
///
/// Substituted text is copied verbatim and never scanned for placeholders.
pub fn build_prompt(template: &str, input: &str, scratchpad: &str) -> String {
    let mut prompt = String::with_capacity(template.len() + input.len() + scratchpad.len());
    let mut rest = template;

    while let Some(pos) = rest.find('{') {
        prompt.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if let Some(after) = tail.strip_prefix("{input}") {
            prompt.push_str(input);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{agent_scratchpad}") {
            prompt.push_str(scratchpad);
            rest = after;
        } else {
            prompt.push('{');
            rest = &tail[1..];
        }
    }

    prompt.push_str(rest);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AgentError;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "Echo"
        }
        fn description(&self) -> &str {
            "Repeats the input."
        }
        async fn call(&self, input: &str) -> Result<String, AgentError> {
            Ok(input.to_string())
        }
    }

    #[test]
    fn test_template_lists_tools() {
        let tools: Vec<Arc<dyn Tool>> = vec![Arc::new(Echo)];
        let template = render_template(&tools);

        assert!(template.starts_with(PREFIX));
        assert!(template.contains("\n\nEcho: Repeats the input.\n\n"));
        assert!(template.contains("should be one of [Echo]"));
        assert!(template.ends_with("Question: {input}\nThought:{agent_scratchpad}"));
    }

    #[test]
    fn test_build_prompt() {
        let prompt = build_prompt("Q: {input}\nThought:{agent_scratchpad}", "hi", " I should echo");
        assert_eq!(prompt, "Q: hi\nThought: I should echo");
    }

    #[test]
    fn test_build_prompt_does_not_expand_substituted_text() {
        let template = "Q: {input}\nThought:{agent_scratchpad}";

        let prompt = build_prompt(template, "what is {agent_scratchpad}?", " saw {input}");
        assert_eq!(prompt, "Q: what is {agent_scratchpad}?\nThought: saw {input}");

        let prompt = build_prompt("JSON like {\"a\": 1} then {input}", "x", "");
        assert_eq!(prompt, "JSON like {\"a\": 1} then x");
    }
}
