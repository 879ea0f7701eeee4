//! Concierge document ingestion
//!
//! Loads PDFs, splits them into overlapping chunks, embeds the chunks and
//! keeps the resulting vector index on disk.

pub mod chunker;
pub mod errors;
pub mod pdf;
pub mod processor;

pub use chunker::{split_documents, ChunkingConfig};
pub use errors::IngestionError;
pub use pdf::{load_all_pdfs, PageDocument};
pub use processor::{IndexBuilder, IndexOrigin};
