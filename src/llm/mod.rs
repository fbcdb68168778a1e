//! LLM backend implementations.
//!
//! Both backends talk to a model served locally over HTTP: Ollama, or a
//! llama.cpp `llama-server` that giti may launch itself for a GGUF file.

pub mod llamacpp;
pub mod ollama;

use crate::config::{BackendConfig, GenerationConfig};
use crate::error::BackendError;
use anyhow::Result;
use std::future::Future;
use tracing::warn;

/// Stop sequences for raw completion, so the model answers only one turn.
pub const STOP_SEQUENCES: &[&str] = &["Human:", "Assistant:", "\n\n"];

/// Enum-based backend for local inference servers.
pub enum Backend {
    Ollama(ollama::OllamaBackend),
    LlamaCpp(llamacpp::LlamaCppBackend),
}

impl Backend {
    /// Generate a completion for a fully assembled prompt.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        match self {
            Backend::Ollama(b) => with_fallback(b.chat(prompt), b.complete(prompt)).await,
            Backend::LlamaCpp(b) => with_fallback(b.chat(prompt), b.complete(prompt)).await,
        }
    }

    /// Get the backend name.
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Ollama(_) => "ollama",
            Backend::LlamaCpp(_) => "llamacpp",
        }
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        match self {
            Backend::Ollama(b) => &b.model,
            Backend::LlamaCpp(b) => b.model(),
        }
    }

    /// Check if the backend is reachable and has the model.
    pub async fn health_check(&self) -> Result<()> {
        match self {
            Backend::Ollama(b) => b.health_check().await,
            Backend::LlamaCpp(b) => b.health_check().await,
        }
    }
}

/// Try the chat endpoint first; instruction-tuned models follow the system
/// message better there. Fall back to raw completion if it fails.
async fn with_fallback<C, F>(chat: C, fallback: F) -> Result<String>
where
    C: Future<Output = Result<String>>,
    F: Future<Output = Result<String>>,
{
    match chat.await {
        Ok(text) => Ok(text),
        Err(primary) => {
            warn!("Chat completion failed, falling back to raw completion: {:#}", primary);
            fallback.await.map_err(|fallback| {
                BackendError::Generation {
                    primary: format!("{:#}", primary),
                    fallback: format!("{:#}", fallback),
                }
                .into()
            })
        }
    }
}

/// Create a backend from configuration.
///
/// For llama.cpp with a `model_path` this launches the server and waits for
/// it to load the model.
pub async fn create_backend(config: &BackendConfig, params: &GenerationConfig) -> Result<Backend> {
    match config {
        BackendConfig::Ollama { model, host } => Ok(Backend::Ollama(ollama::OllamaBackend::new(
            model.clone(),
            host.clone(),
            params.clone(),
        )?)),
        BackendConfig::LlamaCpp {
            host,
            model,
            model_path,
            server_bin,
            startup_timeout_secs,
        } => {
            let mut backend =
                llamacpp::LlamaCppBackend::new(model.clone(), host.clone(), params.clone())?;
            if let Some(path) = model_path {
                backend
                    .launch(path, server_bin, *startup_timeout_secs)
                    .await?;
            }
            Ok(Backend::LlamaCpp(backend))
        }
    }
}
