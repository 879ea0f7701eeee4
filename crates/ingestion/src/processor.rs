//! Index builder
//!
//! Core logic for turning a PDF directory into a persisted vector index:
//! PDF extraction, chunking, batched embedding, and the build-or-load check
//! done at startup.

use crate::chunker::{split_documents, ChunkingConfig};
use crate::errors::IngestionError;
use crate::pdf::{list_pdfs, load_all_pdfs};
use concierge_common::config::AppConfig;
use concierge_common::{metrics, Document, Embedder, VectorIndex};
use futures::stream::{self, StreamExt, TryStreamExt};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// How an index came to be in memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOrigin {
    Loaded,
    Built,
}

/// Builds, persists, and reloads the vector index
pub struct IndexBuilder {
    embedder: Arc<dyn Embedder>,
    chunking: ChunkingConfig,
    batch_size: usize,
    concurrency: usize,
}

impl IndexBuilder {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        chunking: ChunkingConfig,
        batch_size: usize,
        concurrency: usize,
    ) -> Self {
        Self {
            embedder,
            chunking,
            batch_size: batch_size.max(1),
            concurrency: concurrency.max(1),
        }
    }

    pub fn from_config(embedder: Arc<dyn Embedder>, config: &AppConfig) -> Self {
        Self::new(
            embedder,
            ChunkingConfig::from(&config.rag),
            config.embedding.batch_size,
            config.embedding.concurrency,
        )
    }

    /// Load the index saved in `index_dir`, or build it from `pdf_dir`
    #[instrument(skip_all, fields(pdf_dir = %pdf_dir.display(), index_dir = %index_dir.display()))]
    pub async fn build_or_load(
        &self,
        pdf_dir: &Path,
        index_dir: &Path,
    ) -> Result<(VectorIndex, IndexOrigin), IngestionError> {
        if VectorIndex::exists(index_dir) {
            let index = VectorIndex::load(index_dir)?;

            if index.manifest().embedding_model != self.embedder.model_name() {
                warn!(
                    stored = %index.manifest().embedding_model,
                    configured = self.embedder.model_name(),
                    "Index was built with a different embedding model, rebuilding"
                );
                return Ok((self.rebuild(pdf_dir, index_dir).await?, IndexOrigin::Built));
            }

            if pdf_dir.is_dir() {
                let current = fingerprint_dir(pdf_dir)?;
                if current != index.manifest().sources {
                    warn!("PDF directory changed since the index was built; run `ingest --force` to refresh");
                }
            }

            metrics::record_index_size(index.len());
            info!(chunks = index.len(), "Loaded existing vector index");
            return Ok((index, IndexOrigin::Loaded));
        }

        info!("No vector index found, building one");
        Ok((self.rebuild(pdf_dir, index_dir).await?, IndexOrigin::Built))
    }

    /// Build a fresh index from `pdf_dir` and save it, ignoring any existing one
    #[instrument(skip_all, fields(pdf_dir = %pdf_dir.display()))]
    pub async fn rebuild(&self, pdf_dir: &Path, index_dir: &Path) -> Result<VectorIndex, IngestionError> {
        let start = Instant::now();

        let sources = fingerprint_dir(pdf_dir)?;
        let pages = load_all_pdfs(pdf_dir)?;
        let documents = split_documents(&pages, &self.chunking)?;

        if documents.is_empty() {
            warn!("No text found in PDF directory, the index will be empty");
        }

        let page_count = pages.len();
        let chunk_count = documents.len();

        let mut index = VectorIndex::new(self.embedder.model_name(), self.embedder.dimension());
        let embeddings = self.embed_documents(&documents).await?;
        index.insert(documents, embeddings)?;
        index.set_sources(sources);
        index.save(index_dir)?;

        metrics::record_ingestion(start.elapsed().as_secs_f64(), page_count, chunk_count);
        metrics::record_index_size(index.len());

        info!(
            pages = page_count,
            chunks = chunk_count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Vector index built"
        );

        Ok(index)
    }

    /// Embed chunk contents in batches, keeping input order
    async fn embed_documents(&self, documents: &[Document]) -> Result<Vec<Vec<f32>>, IngestionError> {
        let batches: Vec<Vec<String>> = documents
            .chunks(self.batch_size)
            .map(|batch| batch.iter().map(|d| d.content.clone()).collect())
            .collect();

        let total = batches.len();
        let embedder = &self.embedder;

        let results: Vec<Vec<Vec<f32>>> = stream::iter(batches.into_iter().enumerate())
            .map(|(i, batch)| async move {
                let embeddings = embedder.embed_batch(&batch).await?;
                tracing::debug!(batch = i + 1, total, "Embedded batch");
                Ok::<_, IngestionError>(embeddings)
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        Ok(results.into_iter().flatten().collect())
    }
}

/// SHA-256 of every PDF in `dir`, keyed by path
pub fn fingerprint_dir(dir: &Path) -> Result<BTreeMap<String, String>, IngestionError> {
    let mut sources = BTreeMap::new();
    for path in list_pdfs(dir)? {
        let bytes = std::fs::read(&path)?;
        sources.insert(path.display().to_string(), hex::encode(Sha256::digest(&bytes)));
    }
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::tests::write_pdf;
    use concierge_common::embeddings::MockEmbedder;

    fn builder(embedder: MockEmbedder) -> IndexBuilder {
        IndexBuilder::new(
            Arc::new(embedder),
            ChunkingConfig {
                chunk_size: 200,
                chunk_overlap: 20,
            },
            2,
            2,
        )
    }

    #[tokio::test]
    async fn test_build_then_load() {
        let pdfs = tempfile::tempdir().unwrap();
        let index_dir = tempfile::tempdir().unwrap();
        write_pdf(&pdfs.path().join("hours.pdf"), &["The office opens at nine", "Closed on Sundays"]);

        let builder = builder(MockEmbedder::new(64));

        let (built, origin) = builder.build_or_load(pdfs.path(), index_dir.path()).await.unwrap();
        assert_eq!(origin, IndexOrigin::Built);
        assert_eq!(built.len(), 2);
        assert_eq!(built.manifest().sources.len(), 1);

        let (loaded, origin) = builder.build_or_load(pdfs.path(), index_dir.path()).await.unwrap();
        assert_eq!(origin, IndexOrigin::Loaded);
        assert_eq!(loaded.len(), 2);
    }

    #[tokio::test]
    async fn test_load_does_not_need_pdf_dir() {
        let pdfs = tempfile::tempdir().unwrap();
        let index_dir = tempfile::tempdir().unwrap();
        write_pdf(&pdfs.path().join("a.pdf"), &["Only page"]);

        let builder = builder(MockEmbedder::new(32));
        builder.rebuild(pdfs.path(), index_dir.path()).await.unwrap();

        let missing = pdfs.path().join("gone");
        let (index, origin) = builder.build_or_load(&missing, index_dir.path()).await.unwrap();
        assert_eq!(origin, IndexOrigin::Loaded);
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_pdf_dir_without_index_fails() {
        let root = tempfile::tempdir().unwrap();
        let err = builder(MockEmbedder::new(32))
            .build_or_load(&root.path().join("pdfs"), &root.path().join("index"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestionError::DirectoryNotFound(_)));
    }

    #[tokio::test]
    async fn test_empty_directory_builds_empty_index() {
        let pdfs = tempfile::tempdir().unwrap();
        let index_dir = tempfile::tempdir().unwrap();

        let (index, _) = builder(MockEmbedder::new(16))
            .build_or_load(pdfs.path(), index_dir.path())
            .await
            .unwrap();
        assert!(index.is_empty());
        assert!(VectorIndex::exists(index_dir.path()));
    }

    #[tokio::test]
    async fn test_rebuild_preserves_chunk_order() {
        let pdfs = tempfile::tempdir().unwrap();
        let index_dir = tempfile::tempdir().unwrap();
        write_pdf(&pdfs.path().join("a.pdf"), &["alpha", "beta", "gamma", "delta", "epsilon"]);

        let embedder = MockEmbedder::new(48);
        let index = builder(MockEmbedder::new(48))
            .rebuild(pdfs.path(), index_dir.path())
            .await
            .unwrap();
        assert_eq!(index.len(), 5);

        // Each chunk must come back as its own best match
        for word in ["alpha", "gamma", "epsilon"] {
            let query = embedder.embed(word).await.unwrap();
            let hits = index.search(&query, 1).unwrap();
            assert!(hits[0].document.content.contains(word));
        }
    }

    #[test]
    fn test_fingerprint_changes_with_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"one").unwrap();
        let before = fingerprint_dir(dir.path()).unwrap();

        std::fs::write(dir.path().join("a.pdf"), b"two").unwrap();
        let after = fingerprint_dir(dir.path()).unwrap();

        assert_eq!(before.len(), 1);
        assert_ne!(before, after);
    }
}
