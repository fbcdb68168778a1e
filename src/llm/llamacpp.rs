//! llama.cpp server backend.
//!
//! Talks to `llama-server` through its OpenAI-compatible chat endpoint and
//! its native `/completion` endpoint. When configured with a GGUF file giti
//! launches the server itself and owns the child process.

use crate::config::GenerationConfig;
use crate::error::BackendError;
use crate::llm::STOP_SEQUENCES;
use crate::prompt::SYSTEM_MESSAGE;
use anyhow::{anyhow, Context, Result};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info};

/// llama.cpp backend.
pub struct LlamaCppBackend {
    model: String,
    host: String,
    params: GenerationConfig,
    client: Client,
    server: Option<ManagedServer>,
}

/// A `llama-server` child started by giti. Killed when dropped.
struct ManagedServer {
    model_path: PathBuf,
    child: Child,
}

impl LlamaCppBackend {
    /// Create a backend for a server at `host`.
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
            server: None,
        })
    }

    /// The loaded GGUF file name when giti manages the server, otherwise the
    /// configured model name.
    pub fn model(&self) -> &str {
        self.server
            .as_ref()
            .and_then(|s| s.model_path.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or(self.model.as_str())
    }

    /// Launch `server_bin` serving `model_path` and wait until it is ready.
    pub async fn launch(
        &mut self,
        model_path: &Path,
        server_bin: &str,
        startup_timeout_secs: u64,
    ) -> Result<()> {
        if !model_path.is_file() {
            return Err(BackendError::ModelFileNotFound(model_path.to_path_buf()).into());
        }

        let bin = which::which(server_bin)
            .map_err(|_| BackendError::ServerBinaryMissing(server_bin.to_string()))?;

        let url = Url::parse(&self.host)
            .with_context(|| format!("Invalid llama.cpp host URL: {}", self.host))?;
        let bind = url.host_str().unwrap_or("127.0.0.1").to_string();
        let port = url.port_or_known_default().unwrap_or(8080);

        info!(
            "Loading model from {} with {}...",
            model_path.display(),
            bin.display()
        );

        let child = Command::new(&bin)
            .arg("-m")
            .arg(model_path)
            .args(["-c", &self.params.context_size.to_string()])
            .args(["--host", &bind])
            .args(["--port", &port.to_string()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start {}", bin.display()))?;

        debug!("llama-server started (PID {:?})", child.id());
        self.server = Some(ManagedServer {
            model_path: model_path.to_path_buf(),
            child,
        });

        self.wait_ready(Duration::from_secs(startup_timeout_secs)).await?;
        info!("Model loaded");
        Ok(())
    }

    /// Poll `/health` until the server answers, the child exits, or the
    /// timeout elapses.
    async fn wait_ready(&mut self, timeout: Duration) -> Result<()> {
        let poll_interval = Duration::from_millis(250);
        let deadline = tokio::time::Instant::now() + timeout;

        while tokio::time::Instant::now() < deadline {
            tokio::time::sleep(poll_interval).await;

            if let Some(server) = self.server.as_mut() {
                if let Some(status) = server.child.try_wait()? {
                    return Err(anyhow!("llama-server exited during startup ({})", status));
                }
            }

            // 503 while the model is still loading.
            if self.health_check().await.is_ok() {
                return Ok(());
            }
        }

        Err(BackendError::StartupTimeout(timeout.as_secs()).into())
    }

    /// Chat completion through the OpenAI-compatible endpoint.
    pub async fn chat(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.host);

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_MESSAGE,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: self.params.max_tokens,
            temperature: self.params.temperature,
            top_p: self.params.top_p,
            seed: self.params.seed,
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to connect to llama-server")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "llama-server chat request failed with status {}: {}",
                status,
                body
            ));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .context("Failed to parse llama-server chat response")?;

        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| anyhow!("Empty response from llama-server"))?;

        debug!("llama-server chat output: {:?}", content);
        Ok(content)
    }

    /// Raw completion with stop sequences.
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/completion", self.host);

        let request = CompletionRequest {
            prompt,
            n_predict: self.params.max_tokens,
            temperature: self.params.temperature,
            top_p: self.params.top_p,
            seed: self.params.seed,
            stop: STOP_SEQUENCES,
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to connect to llama-server")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "llama-server completion failed with status {}: {}",
                status,
                body
            ));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .context("Failed to parse llama-server completion")?;

        debug!("llama-server completion output: {:?}", completion.content);
        Ok(completion.content.trim().to_string())
    }

    /// Check if the server is up and has finished loading the model.
    pub async fn health_check(&self) -> Result<()> {
        let url = format!("{}/health", self.host);
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| BackendError::Unreachable {
                backend: "llama-server",
                host: self.host.clone(),
                reason: e.to_string(),
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(anyhow!("llama-server health check failed: {}", response.status()))
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    seed: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: String,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    n_predict: u32,
    temperature: f32,
    top_p: f32,
    seed: u32,
    stop: &'a [&'a str],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn backend(host: String) -> LlamaCppBackend {
        LlamaCppBackend::new("local".to_string(), host, GenerationConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_chat_reads_first_choice() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_body(Matcher::PartialJson(json!({ "max_tokens": 100, "stream": false })))
            .with_status(200)
            .with_body(
                json!({ "choices": [{ "message": { "role": "assistant", "content": "git stash list\n" } }] })
                    .to_string(),
            )
            .create_async()
            .await;

        let out = backend(server.url()).chat("list stashes").await.unwrap();
        assert_eq!(out, "git stash list");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_chat_without_choices_is_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(json!({ "choices": [] }).to_string())
            .create_async()
            .await;

        assert!(backend(server.url()).chat("x").await.is_err());
    }

    #[tokio::test]
    async fn test_completion_uses_stop_sequences() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/completion")
            .match_body(Matcher::PartialJson(json!({
                "n_predict": 100,
                "stop": ["Human:", "Assistant:", "\n\n"]
            })))
            .with_status(200)
            .with_body(json!({ "content": " git fetch" }).to_string())
            .create_async()
            .await;

        let out = backend(server.url()).complete("fetch").await.unwrap();
        assert_eq!(out, "git fetch");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_health_check_loading_model() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/health")
            .with_status(503)
            .with_body(json!({ "error": { "message": "Loading model" } }).to_string())
            .create_async()
            .await;

        assert!(backend(server.url()).health_check().await.is_err());
    }

    #[tokio::test]
    async fn test_launch_missing_model_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = backend("http://127.0.0.1:8080".to_string());
        let err = backend
            .launch(&dir.path().join("missing.gguf"), "llama-server", 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BackendError>(),
            Some(BackendError::ModelFileNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_launch_missing_server_binary() {
        let model = tempfile::NamedTempFile::new().unwrap();
        let mut backend = backend("http://127.0.0.1:8080".to_string());
        let err = backend
            .launch(model.path(), "giti-no-such-llama-server", 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BackendError>(),
            Some(BackendError::ServerBinaryMissing(_))
        ));
    }

    /// Write an executable script standing in for `llama-server`.
    #[cfg(unix)]
    fn fake_server(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("llama-server");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_launch_waits_for_health() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("phi-2.Q4_K_M.gguf");
        std::fs::write(&model, b"GGUF").unwrap();
        let args_file = dir.path().join("args");
        let bin = fake_server(
            dir.path(),
            &format!("echo \"$@\" > {}\nexec sleep 30", args_file.display()),
        );

        let mut server = mockito::Server::new_async().await;
        let health = server
            .mock("GET", "/health")
            .with_status(200)
            .with_body(json!({ "status": "ok" }).to_string())
            .expect_at_least(1)
            .create_async()
            .await;

        let url = Url::parse(&server.url()).unwrap();
        let mut backend = backend(server.url());
        backend.launch(&model, bin.to_str().unwrap(), 5).await.unwrap();
        health.assert_async().await;
        assert_eq!(backend.model(), "phi-2.Q4_K_M.gguf");

        let mut args = String::new();
        for _ in 0..20 {
            args = std::fs::read_to_string(&args_file).unwrap_or_default();
            if !args.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        let expected = format!(
            "-m {} -c 4096 --host {} --port {}",
            model.display(),
            url.host_str().unwrap(),
            url.port().unwrap()
        );
        assert_eq!(args.trim(), expected);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_launch_server_exits_during_startup() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("model.gguf");
        std::fs::write(&model, b"GGUF").unwrap();
        let bin = fake_server(dir.path(), "echo 'error loading model' >&2\nexit 1");

        let mut backend = backend("http://127.0.0.1:9".to_string());
        let err = backend
            .launch(&model, bin.to_str().unwrap(), 5)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exited during startup"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_launch_times_out_while_loading() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("model.gguf");
        std::fs::write(&model, b"GGUF").unwrap();
        let bin = fake_server(dir.path(), "exec sleep 30");

        let mut server = mockito::Server::new_async().await;
        let _health = server
            .mock("GET", "/health")
            .with_status(503)
            .with_body(json!({ "error": { "message": "Loading model" } }).to_string())
            .create_async()
            .await;

        let mut backend = backend(server.url());
        let err = backend
            .launch(&model, bin.to_str().unwrap(), 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BackendError>(),
            Some(BackendError::StartupTimeout(1))
        ));
    }

    #[test]
    fn test_model_name_without_managed_server() {
        assert_eq!(backend("http://127.0.0.1:8080".to_string()).model(), "local");
    }
}
