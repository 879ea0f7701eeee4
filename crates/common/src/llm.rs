//! Completion model clients
//!
//! The agent and the QA chain only need raw text completion with stop
//! sequences, so every provider is reduced to `complete(prompt, stop)`.

use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::retry::{classify_status, classify_transport, with_retry};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Text completion model
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete `prompt`, cutting generation at the first stop sequence
    async fn complete(&self, prompt: &str, stop: &[String]) -> Result<String>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

fn llm_error(message: String) -> AppError {
    AppError::Llm { message }
}

/// Ollama completion client (`POST /api/generate`)
pub struct OllamaLlm {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_retries: u32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions<'a>,
}

#[derive(Serialize)]
struct GenerateOptions<'a> {
    temperature: f32,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop: &'a [String],
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaLlm {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }

    async fn make_request(&self, prompt: &str, stop: &[String]) -> std::result::Result<String, backoff::Error<AppError>> {
        let url = format!("{}/api/generate", self.base_url);

        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
                stop,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport(e, llm_error))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body, llm_error));
        }

        let generated: GenerateResponse = response.json().await.map_err(|e| {
            backoff::Error::permanent(llm_error(format!("Failed to parse response: {}", e)))
        })?;

        Ok(generated.response)
    }
}

#[async_trait]
impl LanguageModel for OllamaLlm {
    async fn complete(&self, prompt: &str, stop: &[String]) -> Result<String> {
        let start = Instant::now();
        let result = with_retry("ollama_generate", self.max_retries, || self.make_request(prompt, stop)).await;
        metrics::record_llm(start.elapsed().as_secs_f64(), &self.model, result.is_ok());
        result
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// OpenAI-compatible chat completion client
pub struct OpenAIChatLlm {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_retries: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop: &'a [String],
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

impl OpenAIChatLlm {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
            message: "llm.api_key is required for the openai provider".to_string(),
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }

    async fn make_request(&self, prompt: &str, stop: &[String]) -> std::result::Result<String, backoff::Error<AppError>> {
        // The chat API accepts at most four stop sequences
        let stop = &stop[..stop.len().min(4)];

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            stop,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport(e, llm_error))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body, llm_error));
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            backoff::Error::permanent(llm_error(format!("Failed to parse response: {}", e)))
        })?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| backoff::Error::permanent(llm_error("Empty response from LLM".to_string())))
    }
}

#[async_trait]
impl LanguageModel for OpenAIChatLlm {
    async fn complete(&self, prompt: &str, stop: &[String]) -> Result<String> {
        let start = Instant::now();
        let result = with_retry("openai_chat", self.max_retries, || self.make_request(prompt, stop)).await;
        metrics::record_llm(start.elapsed().as_secs_f64(), &self.model, result.is_ok());
        result
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Replays canned completions in order and records every prompt.
///
/// When the script runs dry it keeps answering with the fallback.
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
    fallback: String,
}

impl ScriptedLlm {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
            fallback: "Final Answer: I don't know.".to_string(),
        }
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }

    /// Prompts received so far
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for ScriptedLlm {
    async fn complete(&self, prompt: &str, stop: &[String]) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        let next = self
            .responses
            .lock()
            .map_err(|_| AppError::Internal {
                message: "scripted LLM lock poisoned".to_string(),
            })?
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        // Honour stop sequences the way a real backend would
        let cut = stop
            .iter()
            .filter_map(|s| next.find(s.as_str()))
            .min()
            .unwrap_or(next.len());

        Ok(next[..cut].to_string())
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Create a completion model based on configuration
pub fn create_llm(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
    let llm: Arc<dyn LanguageModel> = match config.provider.as_str() {
        "ollama" => Arc::new(OllamaLlm::new(config)?),
        "openai" => Arc::new(OpenAIChatLlm::new(config)?),
        "mock" => Arc::new(ScriptedLlm::new(Vec::<String>::new())),
        other => {
            return Err(AppError::Configuration {
                message: format!("Unknown LLM provider: {}", other),
            })
        }
    };

    tracing::info!(provider = %config.provider, model = llm.model_name(), "Language model ready");
    Ok(llm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_replays_in_order() {
        let llm = ScriptedLlm::new(["first", "second"]);
        assert_eq!(llm.complete("a", &[]).await.unwrap(), "first");
        assert_eq!(llm.complete("b", &[]).await.unwrap(), "second");
        assert_eq!(llm.complete("c", &[]).await.unwrap(), "Final Answer: I don't know.");
        assert_eq!(llm.prompts(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_scripted_applies_stop_sequence() {
        let llm = ScriptedLlm::new(["Action: lookup\nAction Input: x\nObservation: made up"]);
        let stop = vec!["\nObservation:".to_string()];
        let out = llm.complete("prompt", &stop).await.unwrap();
        assert_eq!(out, "Action: lookup\nAction Input: x");
    }

    #[test]
    fn test_generate_request_shape() {
        let stop = vec!["\nObservation:".to_string()];
        let request = GenerateRequest {
            model: "mistral",
            prompt: "hi",
            stream: false,
            options: GenerateOptions {
                temperature: 0.0,
                stop: &stop,
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["stream"], false);
        assert_eq!(value["options"]["stop"][0], "\nObservation:");
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let config = LlmConfig {
            provider: "llamafile".to_string(),
            ..LlmConfig::default()
        };
        assert!(create_llm(&config).is_err());
    }
}
