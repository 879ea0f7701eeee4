//! Concierge Common Library
//!
//! Shared code for the Concierge crates including:
//! - Configuration management
//! - Error types and handling
//! - Embedding and LLM client abstractions
//! - The persisted vector index
//! - Metrics and tracing setup

pub mod config;
pub mod embeddings;
pub mod errors;
pub mod index;
pub mod llm;
pub mod metrics;
pub mod retry;
pub mod telemetry;

// Re-export commonly used types
pub use config::AppConfig;
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use index::{Document, DocumentMetadata, ScoredDocument, VectorIndex};
pub use llm::LanguageModel;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model (Ollama's build of all-MiniLM-L6-v2)
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";

/// Default embedding dimension
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 384;

/// Default completion model
pub const DEFAULT_LLM_MODEL: &str = "mistral";
