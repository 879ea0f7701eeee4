//! Retrieval over the document index

mod vector;

pub use vector::VectorRetriever;

use concierge_common::errors::Result;
use concierge_common::DocumentMetadata;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Retrieved chunk with relevance score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Chunk ID
    pub chunk_id: Uuid,

    /// Chunk content
    pub content: String,

    /// Where the chunk came from
    pub metadata: DocumentMetadata,

    /// Cosine similarity to the query
    pub score: f32,
}

/// Common trait for all retrievers
#[async_trait::async_trait]
pub trait Retriever: Send + Sync {
    /// Retrieve the chunks most relevant to `query`, best first
    async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>>;
}
