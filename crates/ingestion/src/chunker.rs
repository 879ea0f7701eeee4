//! Text chunking module
//!
//! Splits page text into overlapping character windows for embedding.

use crate::errors::IngestionError;
use crate::pdf::PageDocument;
use concierge_common::config::RagConfig;
use concierge_common::{Document, DocumentMetadata};
use text_splitter::{ChunkConfig, TextSplitter};
use tracing::debug;

/// Configuration for text chunking
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Overlap between neighbouring chunks in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl From<&RagConfig> for ChunkingConfig {
    fn from(config: &RagConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
        }
    }
}

impl ChunkingConfig {
    fn splitter(&self) -> Result<TextSplitter<text_splitter::Characters>, IngestionError> {
        if self.chunk_size == 0 {
            return Err(IngestionError::ChunkingError(
                "chunk_size must be greater than zero".to_string(),
            ));
        }

        let config = ChunkConfig::new(self.chunk_size)
            .with_overlap(self.chunk_overlap)
            .map_err(|e| IngestionError::ChunkingError(e.to_string()))?;

        Ok(TextSplitter::new(config))
    }
}

/// Split pages into chunk documents
pub fn split_documents(
    pages: &[PageDocument],
    config: &ChunkingConfig,
) -> Result<Vec<Document>, IngestionError> {
    let splitter = config.splitter()?;
    let mut documents = Vec::new();

    for page in pages {
        if page.text.trim().is_empty() {
            continue;
        }

        for (chunk_index, (byte_offset, chunk)) in splitter.chunk_indices(&page.text).enumerate() {
            let metadata = DocumentMetadata {
                source: page.source.clone(),
                page: page.page,
                chunk_index: chunk_index as u32,
                // Offsets are reported in characters, not bytes
                start_index: page.text[..byte_offset].chars().count(),
            };
            documents.push(Document::new(chunk, metadata));
        }
    }

    debug!(
        pages = pages.len(),
        chunk_count = documents.len(),
        chunk_size = config.chunk_size,
        chunk_overlap = config.chunk_overlap,
        "Pages chunked"
    );

    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(text: &str, page: u32) -> PageDocument {
        PageDocument {
            source: "pdfs/manual.pdf".to_string(),
            page,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_chunks_respect_size() {
        let text = "This is a test sentence. ".repeat(200);
        let config = ChunkingConfig {
            chunk_size: 200,
            chunk_overlap: 50,
        };

        let docs = split_documents(&[page(&text, 0)], &config).unwrap();
        assert!(docs.len() > 1);

        for (i, doc) in docs.iter().enumerate() {
            assert!(doc.content.chars().count() <= config.chunk_size);
            assert_eq!(doc.metadata.chunk_index as usize, i);
            assert_eq!(doc.metadata.source, "pdfs/manual.pdf");
        }
    }

    #[test]
    fn test_chunks_overlap() {
        let text = (0..400).map(|i| format!("w{} ", i)).collect::<String>();
        let config = ChunkingConfig {
            chunk_size: 100,
            chunk_overlap: 40,
        };

        let docs = split_documents(&[page(&text, 0)], &config).unwrap();
        assert!(docs.len() >= 2);

        let first_end = docs[0].metadata.start_index + docs[0].content.chars().count();
        assert!(docs[1].metadata.start_index < first_end);
    }

    #[test]
    fn test_start_index_points_into_page() {
        let text = "Intro paragraph.\n\nSecond paragraph with more words in it.";
        let config = ChunkingConfig {
            chunk_size: 20,
            chunk_overlap: 0,
        };

        let docs = split_documents(&[page(text, 3)], &config).unwrap();
        for doc in &docs {
            let start = doc.metadata.start_index;
            let slice: String = text.chars().skip(start).take(doc.content.chars().count()).collect();
            assert_eq!(slice, doc.content);
            assert_eq!(doc.metadata.page, 3);
        }
    }

    #[test]
    fn test_blank_pages_yield_nothing() {
        let docs = split_documents(&[page("", 0), page("   \n ", 1)], &ChunkingConfig::default()).unwrap();
        assert!(docs.is_empty());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let config = ChunkingConfig {
            chunk_size: 100,
            chunk_overlap: 100,
        };
        let err = split_documents(&[page("text", 0)], &config).unwrap_err();
        assert!(matches!(err, IngestionError::ChunkingError(_)));
    }
}
