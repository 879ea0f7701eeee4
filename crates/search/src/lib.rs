//! Concierge search
//!
//! Vector retrieval over the document index and the "stuff" question
//! answering chain built on top of it.

pub mod qa;
pub mod retrieval;

pub use qa::{QaAnswer, RetrievalQa, SourceRef};
pub use retrieval::{RetrievedChunk, Retriever, VectorRetriever};
