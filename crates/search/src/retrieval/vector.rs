//! Vector similarity search over the in-memory index
//!
//! Provides semantic search via embedding similarity

use super::{RetrievedChunk, Retriever};
use concierge_common::errors::Result;
use concierge_common::{metrics, Embedder, VectorIndex};
use std::sync::Arc;
use std::time::Instant;

/// Vector retriever over a loaded [`VectorIndex`]
pub struct VectorRetriever {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
    min_score: Option<f32>,
}

impl VectorRetriever {
    /// Create a new vector retriever
    pub fn new(index: Arc<VectorIndex>, embedder: Arc<dyn Embedder>, top_k: usize) -> Self {
        Self {
            index,
            embedder,
            top_k,
            min_score: None,
        }
    }

    /// Drop results scoring below `min_score`
    pub fn with_min_score(mut self, min_score: Option<f32>) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }
}

#[async_trait::async_trait]
impl Retriever for VectorRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>> {
        let start = Instant::now();

        if self.index.is_empty() {
            tracing::debug!("Index is empty, nothing to retrieve");
            return Ok(Vec::new());
        }

        let embedding = self.embedder.embed(query).await?;
        let min_score = self.min_score.unwrap_or(f32::NEG_INFINITY);

        let chunks: Vec<RetrievedChunk> = self
            .index
            .search(&embedding, self.top_k)?
            .into_iter()
            .filter(|hit| hit.score >= min_score)
            .map(|hit| RetrievedChunk {
                chunk_id: hit.document.id,
                content: hit.document.content,
                metadata: hit.document.metadata,
                score: hit.score,
            })
            .collect();

        metrics::record_retrieval(start.elapsed().as_secs_f64(), chunks.len());
        tracing::debug!(results = chunks.len(), top_k = self.top_k, "Vector retrieval complete");

        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_common::embeddings::MockEmbedder;
    use concierge_common::{Document, DocumentMetadata};

    async fn index_of(embedder: &MockEmbedder, texts: &[&str]) -> Arc<VectorIndex> {
        let mut index = VectorIndex::new(embedder.model_name(), embedder.dimension());
        let docs: Vec<Document> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                Document::new(
                    *t,
                    DocumentMetadata {
                        source: "pdfs/faq.pdf".to_string(),
                        page: i as u32,
                        ..Default::default()
                    },
                )
            })
            .collect();
        let owned: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        let embeddings = embedder.embed_batch(&owned).await.unwrap();
        index.insert(docs, embeddings).unwrap();
        Arc::new(index)
    }

    #[tokio::test]
    async fn test_retrieves_most_similar_first() {
        let embedder = MockEmbedder::new(128);
        let index = index_of(
            &embedder,
            &[
                "parking is available behind the building",
                "the clinic opens at eight in the morning",
                "invoices are sent monthly",
            ],
        )
        .await;

        let retriever = VectorRetriever::new(index, Arc::new(embedder), 2);
        let results = retriever.retrieve("when does the clinic open in the morning").await.unwrap();

        assert_eq!(results.len(), 2);
        assert!(results[0].content.contains("clinic"));
        assert_eq!(results[0].metadata.page, 1);
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn test_min_score_filters() {
        let embedder = MockEmbedder::new(128);
        let index = index_of(&embedder, &["alpha beta", "gamma delta"]).await;

        let retriever = VectorRetriever::new(index, Arc::new(embedder), 4).with_min_score(Some(0.9));
        let results = retriever.retrieve("alpha beta").await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "alpha beta");
    }

    #[tokio::test]
    async fn test_empty_index_returns_nothing() {
        let embedder = MockEmbedder::new(16);
        let index = Arc::new(VectorIndex::new(embedder.model_name(), 16));
        let retriever = VectorRetriever::new(index, Arc::new(embedder), 4);
        assert!(retriever.retrieve("anything").await.unwrap().is_empty());
    }
}
