//! Retrieval-augmented question answering
//!
//! "Stuff" strategy: every retrieved chunk goes into a single prompt and
//! the model answers in one completion.

use crate::retrieval::{RetrievedChunk, Retriever};
use concierge_common::errors::{AppError, Result};
use concierge_common::LanguageModel;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument};

const PROMPT_PREAMBLE: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

/// Reference to a chunk used to answer
#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    pub source: String,
    pub page: u32,
    pub score: f32,
}

impl From<&RetrievedChunk> for SourceRef {
    fn from(chunk: &RetrievedChunk) -> Self {
        Self {
            source: chunk.metadata.source.clone(),
            page: chunk.metadata.page,
            score: chunk.score,
        }
    }
}

/// Answer with the chunks it was grounded on
#[derive(Debug, Clone, Serialize)]
pub struct QaAnswer {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

/// Retrieval QA chain
pub struct RetrievalQa {
    retriever: Arc<dyn Retriever>,
    llm: Arc<dyn LanguageModel>,
}

impl RetrievalQa {
    pub fn new(retriever: Arc<dyn Retriever>, llm: Arc<dyn LanguageModel>) -> Self {
        Self { retriever, llm }
    }

    /// Answer `question` from the indexed documents
    #[instrument(skip(self))]
    pub async fn answer(&self, question: &str) -> Result<QaAnswer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::Validation {
                message: "No question provided".to_string(),
                field: Some("question".to_string()),
            });
        }

        let chunks = self.retriever.retrieve(question).await?;
        debug!(chunks = chunks.len(), "Context retrieved");

        let prompt = build_prompt(question, &chunks);
        let answer = self.llm.complete(&prompt, &[]).await?;

        Ok(QaAnswer {
            answer: answer.trim().to_string(),
            sources: chunks.iter().map(SourceRef::from).collect(),
        })
    }
}

/// Fill the QA prompt with the retrieved context
pub fn build_prompt(question: &str, chunks: &[RetrievedChunk]) -> String {
    let context = chunks
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{PROMPT_PREAMBLE}\n\n{context}\n\nQuestion: {question}\nHelpful Answer:")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use concierge_common::llm::ScriptedLlm;
    use concierge_common::DocumentMetadata;
    use uuid::Uuid;

    struct FixedRetriever(Vec<RetrievedChunk>);

    #[async_trait]
    impl Retriever for FixedRetriever {
        async fn retrieve(&self, _query: &str) -> Result<Vec<RetrievedChunk>> {
            Ok(self.0.clone())
        }
    }

    fn chunk(content: &str, page: u32) -> RetrievedChunk {
        RetrievedChunk {
            chunk_id: Uuid::new_v4(),
            content: content.to_string(),
            metadata: DocumentMetadata {
                source: "pdfs/policy.pdf".to_string(),
                page,
                ..Default::default()
            },
            score: 0.8,
        }
    }

    #[test]
    fn test_build_prompt() {
        let prompt = build_prompt(
            "How long is the warranty?",
            &[chunk("Warranty lasts two years.", 0), chunk("Returns within 30 days.", 1)],
        );

        assert!(prompt.starts_with("Use the following pieces of context"));
        assert!(prompt.contains("Warranty lasts two years.\n\nReturns within 30 days."));
        assert!(prompt.ends_with("Question: How long is the warranty?\nHelpful Answer:"));
    }

    #[test]
    fn test_build_prompt_keeps_braces_in_context() {
        let prompt = build_prompt(
            "What is X?",
            &[chunk("Template syntax: {question} is replaced", 0)],
        );

        assert!(prompt.contains("\n\nTemplate syntax: {question} is replaced\n\n"));
        assert_eq!(prompt.matches("What is X?").count(), 1);
    }

    #[tokio::test]
    async fn test_answer_uses_context_and_reports_sources() {
        let llm = Arc::new(ScriptedLlm::new(["  Two years.  "]));
        let qa = RetrievalQa::new(
            Arc::new(FixedRetriever(vec![chunk("Warranty lasts two years.", 2)])),
            llm.clone(),
        );

        let answer = qa.answer("How long is the warranty?").await.unwrap();
        assert_eq!(answer.answer, "Two years.");
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.sources[0].page, 2);

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Warranty lasts two years."));
    }

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let qa = RetrievalQa::new(
            Arc::new(FixedRetriever(Vec::new())),
            Arc::new(ScriptedLlm::new(Vec::<String>::new())),
        );
        let err = qa.answer("   ").await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }
}
