//! Persisted vector index over document chunks
//!
//! The whole index lives in one JSON file: a manifest describing how it was
//! built plus every chunk with its embedding. Search is brute-force cosine
//! similarity, which is plenty for a directory of PDFs.

use crate::errors::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

/// File name of the serialized index inside the index directory
pub const INDEX_FILE_NAME: &str = "index.json";

/// Where a chunk came from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Path of the source PDF
    pub source: String,
    /// Zero-based page number
    pub page: u32,
    /// Position of the chunk within its page
    pub chunk_index: u32,
    /// Character offset of the chunk within the page text
    pub start_index: usize,
}

/// A unit of text that gets embedded and retrieved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(content: impl Into<String>, metadata: DocumentMetadata) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            metadata,
        }
    }
}

/// A retrieved chunk with its similarity to the query
#[derive(Debug, Clone, Serialize)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
}

/// How the index was built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub embedding_model: String,
    pub dimension: usize,
    pub created_at: DateTime<Utc>,
    /// Source path to content fingerprint
    #[serde(default)]
    pub sources: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    document: Document,
    embedding: Vec<f32>,
}

#[derive(Serialize, Deserialize)]
struct IndexFile {
    manifest: IndexManifest,
    entries: Vec<IndexEntry>,
}

/// In-memory flat vector index
#[derive(Debug, Clone)]
pub struct VectorIndex {
    manifest: IndexManifest,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Create an empty index for vectors produced by `embedding_model`
    pub fn new(embedding_model: impl Into<String>, dimension: usize) -> Self {
        Self {
            manifest: IndexManifest {
                embedding_model: embedding_model.into(),
                dimension,
                created_at: Utc::now(),
                sources: BTreeMap::new(),
            },
            entries: Vec::new(),
        }
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    /// Record the fingerprints of the files this index was built from
    pub fn set_sources(&mut self, sources: BTreeMap<String, String>) {
        self.manifest.sources = sources;
    }

    /// Add chunks with their embeddings
    pub fn insert(&mut self, documents: Vec<Document>, embeddings: Vec<Vec<f32>>) -> Result<()> {
        if documents.len() != embeddings.len() {
            return Err(AppError::Index {
                message: format!(
                    "Got {} documents but {} embeddings",
                    documents.len(),
                    embeddings.len()
                ),
            });
        }

        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.manifest.dimension) {
            return Err(AppError::Index {
                message: format!(
                    "Embedding dimension {} does not match index dimension {}",
                    bad.len(),
                    self.manifest.dimension
                ),
            });
        }

        self.entries.extend(
            documents
                .into_iter()
                .zip(embeddings)
                .map(|(document, embedding)| IndexEntry { document, embedding }),
        );

        Ok(())
    }

    /// Return the `k` chunks most similar to `query`, best first
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredDocument>> {
        if query.len() != self.manifest.dimension {
            return Err(AppError::Index {
                message: format!(
                    "Query dimension {} does not match index dimension {}",
                    query.len(),
                    self.manifest.dimension
                ),
            });
        }

        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, cosine_similarity(query, &entry.embedding)))
            .collect();

        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(i, score)| ScoredDocument {
                document: self.entries[i].document.clone(),
                score,
            })
            .collect())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a saved index exists in `dir`
    pub fn exists(dir: &Path) -> bool {
        dir.join(INDEX_FILE_NAME).is_file()
    }

    /// Write the index to `dir`, replacing any previous one atomically
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir).map_err(|e| AppError::Index {
            message: format!("Failed to create index directory {}: {}", dir.display(), e),
        })?;

        let file = IndexFile {
            manifest: self.manifest.clone(),
            entries: self.entries.clone(),
        };
        let bytes = serde_json::to_vec(&file)?;

        let target = dir.join(INDEX_FILE_NAME);
        let tmp = dir.join(format!("{}.tmp", INDEX_FILE_NAME));

        std::fs::write(&tmp, bytes).map_err(|e| AppError::Index {
            message: format!("Failed to write {}: {}", tmp.display(), e),
        })?;
        std::fs::rename(&tmp, &target).map_err(|e| AppError::Index {
            message: format!("Failed to move index into place: {}", e),
        })?;

        tracing::info!(path = %target.display(), chunks = self.len(), "Vector index saved");
        Ok(())
    }

    /// Load a previously saved index from `dir`
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(INDEX_FILE_NAME);
        let bytes = std::fs::read(&path).map_err(|e| AppError::Index {
            message: format!("Failed to read {}: {}", path.display(), e),
        })?;

        let file: IndexFile = serde_json::from_slice(&bytes).map_err(|e| AppError::Index {
            message: format!("Corrupt index file {}: {}", path.display(), e),
        })?;

        if let Some(bad) = file
            .entries
            .iter()
            .find(|e| e.embedding.len() != file.manifest.dimension)
        {
            return Err(AppError::Index {
                message: format!(
                    "Chunk {} has dimension {} but index declares {}",
                    bad.document.id,
                    bad.embedding.len(),
                    file.manifest.dimension
                ),
            });
        }

        tracing::info!(
            path = %path.display(),
            chunks = file.entries.len(),
            model = %file.manifest.embedding_model,
            "Vector index loaded"
        );

        Ok(Self {
            manifest: file.manifest,
            entries: file.entries,
        })
    }
}

/// Cosine similarity in [-1, 1]; zero vectors score 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    // NaN or overflowing components score as unrelated
    let score = dot / (norm_a * norm_b);
    if score.is_finite() {
        score
    } else {
        0.0
    }
}
