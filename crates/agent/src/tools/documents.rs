//! Document question answering tool

use crate::errors::AgentError;
use crate::tool::Tool;
use async_trait::async_trait;
use concierge_common::metrics;
use concierge_search::RetrievalQa;
use std::sync::Arc;
use tracing::error;

pub const DOCUMENT_TOOL_NAME: &str = "PDF Question Answering Tool";
const DOCUMENT_TOOL_DESCRIPTION: &str = "Use this to answer questions based on uploaded PDF documents.";

/// Observation returned when the QA chain fails
pub const QA_FAILURE_MESSAGE: &str = "Sorry, I couldn't process your question due to an internal error.";

pub struct DocumentQaTool {
    qa: Arc<RetrievalQa>,
}

impl DocumentQaTool {
    pub fn new(qa: Arc<RetrievalQa>) -> Self {
        Self { qa }
    }
}

#[async_trait]
impl Tool for DocumentQaTool {
    fn name(&self) -> &str {
        DOCUMENT_TOOL_NAME
    }

    fn description(&self) -> &str {
        DOCUMENT_TOOL_DESCRIPTION
    }

    async fn call(&self, input: &str) -> Result<String, AgentError> {
        match self.qa.answer(input).await {
            Ok(answer) => {
                metrics::record_tool_call(DOCUMENT_TOOL_NAME, true);
                Ok(answer.answer)
            }
            Err(e) => {
                error!(error = %e, "Document QA failed");
                metrics::record_tool_call(DOCUMENT_TOOL_NAME, false);
                Ok(QA_FAILURE_MESSAGE.to_string())
            }
        }
    }
}
