//! Ingestion error types

use concierge_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("PDF directory '{0}' not found.")]
    DirectoryNotFound(String),

    #[error("PDF parse error for {path}: {message}")]
    PdfParseError { path: String, message: String },

    #[error("Chunking error: {0}")]
    ChunkingError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    App(#[from] AppError),
}

impl From<IngestionError> for AppError {
    fn from(e: IngestionError) -> Self {
        match e {
            IngestionError::DirectoryNotFound(dir) => AppError::NotFound {
                resource_type: "PDF directory".to_string(),
                id: dir,
            },
            IngestionError::PdfParseError { path, message } => AppError::Document { path, message },
            IngestionError::ChunkingError(message) => AppError::Configuration { message },
            IngestionError::IoError(e) => AppError::Internal {
                message: e.to_string(),
            },
            IngestionError::App(e) => e,
        }
    }
}
