//! Ollama backend implementation.
//!
//! Ollama serves quantized models locally; giti uses its chat endpoint and
//! falls back to raw generation.

use crate::config::GenerationConfig;
use crate::error::BackendError;
use crate::llm::STOP_SEQUENCES;
use crate::prompt::SYSTEM_MESSAGE;
use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Ollama backend for local LLM inference.
pub struct OllamaBackend {
    pub model: String,
    host: String,
    params: GenerationConfig,
    client: Client,
}

impl OllamaBackend {
    /// Create a new Ollama backend.
    pub fn new(model: String, host: String, params: GenerationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            model,
            host: host.trim_end_matches('/').to_string(),
            params,
            client,
        })
    }

    fn options(&self, stop: Option<Vec<String>>) -> OllamaOptions {
        OllamaOptions {
            temperature: self.params.temperature,
            top_p: self.params.top_p,
            num_predict: self.params.max_tokens,
            seed: self.params.seed,
            num_ctx: self.params.context_size,
            stop,
        }
    }

    /// Chat completion with the Git system message.
    pub async fn chat(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/chat", self.host);

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_MESSAGE.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            stream: false,
            options: self.options(None),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to connect to Ollama")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Ollama chat request failed with status {}: {}",
                status,
                body
            ));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .context("Failed to parse Ollama chat response")?;

        debug!("Ollama chat output: {:?}", chat.message.content);
        Ok(chat.message.content.trim().to_string())
    }

    /// Raw completion with stop sequences.
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.host);

        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: self.options(Some(STOP_SEQUENCES.iter().map(|s| s.to_string()).collect())),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to connect to Ollama")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Ollama request failed with status {}: {}",
                status,
                body
            ));
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        debug!("Ollama generate output: {:?}", generated.response);
        Ok(generated.response.trim().to_string())
    }

    /// Check that Ollama is running and has the model pulled.
    pub async fn health_check(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.host);
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| BackendError::Unreachable {
                backend: "Ollama",
                host: self.host.clone(),
                reason: format!("{} (is `ollama serve` running?)", e),
            })?;

        if !response.status().is_success() {
            return Err(anyhow!("Ollama health check failed: {}", response.status()));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .context("Failed to parse Ollama model list")?;

        if tags.models.iter().any(|m| model_matches(&m.name, &self.model)) {
            Ok(())
        } else {
            Err(BackendError::ModelNotPulled {
                model: self.model.clone(),
            }
            .into())
        }
    }
}

/// Ollama reports untagged models as `name:latest`.
fn model_matches(listed: &str, wanted: &str) -> bool {
    listed == wanted || (!wanted.contains(':') && listed == format!("{}:latest", wanted))
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    top_p: f32,
    num_predict: u32,
    seed: u32,
    num_ctx: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}
