//! Embedding service abstraction
//!
//! Provides a unified interface for multiple embedding providers:
//! - Ollama (all-minilm, nomic-embed-text, ...)
//! - OpenAI-compatible endpoints (text-embedding-3-small, ...)
//! - A deterministic hashing embedder for tests and offline runs

use crate::config::EmbeddingConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::retry::{classify_status, classify_transport, with_retry};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Trait for embedding generation
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts (batch)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;
}

fn embedding_error(message: String) -> AppError {
    AppError::EmbeddingError { message }
}

fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AppError::Configuration {
            message: format!("Failed to create HTTP client: {}", e),
        })
}

/// Ollama embedding client (`POST /api/embed`)
pub struct OllamaEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimension: usize,
    max_retries: u32,
}

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    /// Create a new Ollama embedder
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimension: config.dimension,
            max_retries: config.max_retries,
        })
    }

    async fn make_request(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, backoff::Error<AppError>> {
        let url = format!("{}/api/embed", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&OllamaEmbedRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| classify_transport(e, embedding_error))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body, embedding_error));
        }

        let result: OllamaEmbedResponse = response.json().await.map_err(|e| {
            backoff::Error::permanent(embedding_error(format!("Failed to parse response: {}", e)))
        })?;

        Ok(result.embeddings)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings.into_iter().next().ok_or_else(|| AppError::EmbeddingError {
            message: "Empty response".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let result = with_retry("ollama_embed", self.max_retries, || self.make_request(texts)).await;
        metrics::record_embedding(start.elapsed().as_secs_f64(), &self.model, texts.len(), result.is_ok());

        let embeddings = result?;
        check_batch(texts.len(), &embeddings)?;
        Ok(embeddings)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// OpenAI-compatible embedding client (`POST /embeddings`).
///
/// `base_url` must include the API version, e.g. `https://api.openai.com/v1`.
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dimension: usize,
    base_url: String,
    max_retries: u32,
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    data: Vec<OpenAIEmbedding>,
}

#[derive(Deserialize)]
struct OpenAIEmbedding {
    embedding: Vec<f32>,
}

impl OpenAIEmbedder {
    /// Create a new OpenAI embedder
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
            message: "embedding.api_key is required for the openai provider".to_string(),
        })?;

        Ok(Self {
            client: build_client(config.timeout_secs)?,
            api_key,
            model: config.model.clone(),
            dimension: config.dimension,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
        })
    }

    async fn make_request(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, backoff::Error<AppError>> {
        let url = format!("{}/embeddings", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&OpenAIRequest {
                input: texts,
                model: &self.model,
            })
            .send()
            .await
            .map_err(|e| classify_transport(e, embedding_error))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body, embedding_error));
        }

        let result: OpenAIResponse = response.json().await.map_err(|e| {
            backoff::Error::permanent(embedding_error(format!("Failed to parse response: {}", e)))
        })?;

        Ok(result.data.into_iter().map(|e| e.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings.into_iter().next().ok_or_else(|| AppError::EmbeddingError {
            message: "Empty response".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // OpenAI has a limit of 2048 texts per request
        const BATCH_SIZE: usize = 100;

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(BATCH_SIZE) {
            let start = Instant::now();
            let result = with_retry("openai_embed", self.max_retries, || self.make_request(chunk)).await;
            metrics::record_embedding(start.elapsed().as_secs_f64(), &self.model, chunk.len(), result.is_ok());

            let embeddings = result?;
            check_batch(chunk.len(), &embeddings)?;
            all_embeddings.extend(embeddings);
        }

        Ok(all_embeddings)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn check_batch(expected: usize, embeddings: &[Vec<f32>]) -> Result<()> {
    if embeddings.len() != expected {
        return Err(AppError::EmbeddingError {
            message: format!("Expected {} embeddings, got {}", expected, embeddings.len()),
        });
    }
    Ok(())
}

/// Deterministic feature-hashing embedder.
///
/// Each lowercase word is hashed into a bucket, so texts sharing words
/// land close together. Good enough for tests and for running without
/// an embedding server.
pub struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension: dimension.max(1) }
    }

    fn hash_embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let digest = Sha256::digest(word.to_lowercase().as_bytes());
            let bucket = u64::from_le_bytes([
                digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
            ]) as usize
                % self.dimension;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.hash_embed(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.hash_embed(t)).collect())
    }

    fn model_name(&self) -> &str {
        "mock-embedding"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Create an embedder based on configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match config.provider.as_str() {
        "ollama" => Arc::new(OllamaEmbedder::new(config)?),
        "openai" => Arc::new(OpenAIEmbedder::new(config)?),
        "mock" => Arc::new(MockEmbedder::new(config.dimension)),
        other => {
            return Err(AppError::Configuration {
                message: format!("Unknown embedding provider: {}", other),
            })
        }
    };

    tracing::info!(
        provider = %config.provider,
        model = embedder.model_name(),
        dimension = embedder.dimension(),
        "Embedder ready"
    );

    Ok(embedder)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_mock_embedder() {
        let embedder = MockEmbedder::new(384);
        let embedding = embedder.embed("test text").await.unwrap();
        assert_eq!(embedding.len(), 384);
    }

    #[tokio::test]
    async fn test_mock_is_deterministic() {
        let embedder = MockEmbedder::new(64);
        let a = embedder.embed("Refund policy").await.unwrap();
        let b = embedder.embed("refund POLICY").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_mock_similarity_tracks_shared_words() {
        let embedder = MockEmbedder::new(256);
        let query = embedder.embed("warranty period for laptops").await.unwrap();
        let related = embedder.embed("the warranty period is two years").await.unwrap();
        let unrelated = embedder.embed("quarterly revenue grew").await.unwrap();
        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_mock_batch() {
        let embedder = MockEmbedder::new(384);
        let texts = vec!["text1".to_string(), "text2".to_string()];
        let embeddings = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[0].len(), 384);
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let embedder = MockEmbedder::new(8);
        let embedding = embedder.embed("   ").await.unwrap();
        assert!(embedding.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let config = EmbeddingConfig {
            provider: "faiss".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(matches!(
            create_embedder(&config),
            Err(AppError::Configuration { .. })
        ));
    }

    #[test]
    fn test_openai_requires_key() {
        let config = EmbeddingConfig {
            provider: "openai".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(create_embedder(&config).is_err());
    }
}
