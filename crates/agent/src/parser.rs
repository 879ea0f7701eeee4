//! Parses ReAct-formatted model output

use crate::errors::AgentError;
use regex_lite::Regex;
use std::sync::OnceLock;

const FINAL_ANSWER: &str = "Final Answer:";

/// What the model decided to do
#[derive(Debug, Clone, PartialEq)]
pub enum AgentStep {
    Action { tool: String, input: String },
    Finish(String),
}

fn action_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)Action\s*\d*\s*:[\s]*(.*?)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)")
            .expect("action regex is valid")
    })
}

fn parse_error(text: &str, reason: &str) -> AgentError {
    AgentError::OutputParse {
        output: text.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse one completion into an action or a final answer
pub fn parse_output(text: &str) -> Result<AgentStep, AgentError> {
    let includes_answer = text.contains(FINAL_ANSWER);

    if let Some(caps) = action_regex().captures(text) {
        if includes_answer {
            return Err(parse_error(
                text,
                "produced both a final answer and a parse-able action",
            ));
        }

        let tool = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        let input = caps
            .get(2)
            .map(|m| m.as_str().trim_matches(' ').trim_matches('"'))
            .unwrap_or_default();

        return Ok(AgentStep::Action {
            tool: tool.to_string(),
            input: input.to_string(),
        });
    }

    if includes_answer {
        let answer = text.rsplit(FINAL_ANSWER).next().unwrap_or_default();
        return Ok(AgentStep::Finish(answer.trim().to_string()));
    }

    if !text.contains("Action:") {
        return Err(parse_error(text, "missing 'Action:' after 'Thought:'"));
    }

    Err(parse_error(text, "missing 'Action Input:' after 'Action:'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_action() {
        let step = parse_output(
            " I need the documents.\nAction: PDF Question Answering Tool\nAction Input: \"What is the refund policy?\"",
        )
        .unwrap();
        assert_eq!(
            step,
            AgentStep::Action {
                tool: "PDF Question Answering Tool".into(),
                input: "What is the refund policy?".into(),
            }
        );
    }

    #[test]
    fn test_parse_multiline_json_input() {
        let step = parse_output(
            "Thought: book it\nAction: Google Calendar Tool\nAction Input: {\"name\": \"Ann\",\n \"date\": \"2025-02-01\", \"time\": \"10:00\", \"purpose\": \"Call\"}",
        )
        .unwrap();
        match step {
            AgentStep::Action { tool, input } => {
                assert_eq!(tool, "Google Calendar Tool");
                assert!(input.starts_with('{'));
                assert!(input.ends_with('}'));
            }
            other => panic!("expected action, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_final_answer() {
        let step = parse_output(" I now know the final answer\nFinal Answer: It is booked.  ").unwrap();
        assert_eq!(step, AgentStep::Finish("It is booked.".into()));
    }

    #[test]
    fn test_both_is_error() {
        let err = parse_output("Action: Search\nAction Input: x\nFinal Answer: y").unwrap_err();
        assert!(err.to_string().contains("both a final answer"));
    }

    #[test]
    fn test_neither_is_error() {
        let err = parse_output("I am not sure what to do").unwrap_err();
        assert!(matches!(err, AgentError::OutputParse { .. }));
        assert!(err.to_string().contains("missing 'Action:'"));

        let err = parse_output("Action: Search").unwrap_err();
        assert!(err.to_string().contains("missing 'Action Input:'"));
    }
}
