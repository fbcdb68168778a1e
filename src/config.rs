//! Configuration management for giti.
//!
//! Configuration is loaded from `~/.config/giti/config.toml`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend configuration.
    #[serde(default)]
    pub backend: BackendConfig,
    /// Sampling parameters.
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Prompt assembly.
    #[serde(default)]
    pub prompt: PromptConfig,
    /// Command execution.
    #[serde(default)]
    pub execution: ExecutionConfig,
}

/// Backend configuration for local inference servers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Ollama local server.
    Ollama {
        /// Model name (default: qwen2.5-coder:1.5b).
        #[serde(default = "default_ollama_model")]
        model: String,
        /// Ollama host URL (default: http://localhost:11434).
        #[serde(default = "default_ollama_host")]
        host: String,
    },
    /// llama.cpp `llama-server`, either already running or launched by giti.
    LlamaCpp {
        /// Server URL (default: http://127.0.0.1:8080).
        #[serde(default = "default_llamacpp_host")]
        host: String,
        /// Model name sent in requests. llama-server serves whatever it loaded.
        #[serde(default = "default_llamacpp_model")]
        model: String,
        /// GGUF file. When set, giti starts `server_bin` with this model.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model_path: Option<PathBuf>,
        /// Server binary looked up in PATH.
        #[serde(default = "default_server_bin")]
        server_bin: String,
        /// How long to wait for a launched server to load the model.
        #[serde(default = "default_startup_timeout")]
        startup_timeout_secs: u64,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Ollama {
            model: default_ollama_model(),
            host: default_ollama_host(),
        }
    }
}

impl BackendConfig {
    /// llama.cpp defaults serving `model_path`.
    pub fn llamacpp(model_path: Option<PathBuf>) -> Self {
        BackendConfig::LlamaCpp {
            host: default_llamacpp_host(),
            model: default_llamacpp_model(),
            model_path,
            server_bin: default_server_bin(),
            startup_timeout_secs: default_startup_timeout(),
        }
    }
}

fn default_ollama_model() -> String {
    "qwen2.5-coder:1.5b".to_string()
}

pub fn default_ollama_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_llamacpp_host() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_llamacpp_model() -> String {
    "local".to_string()
}

fn default_server_bin() -> String {
    "llama-server".to_string()
}

fn default_startup_timeout() -> u64 {
    60
}

/// Sampling parameters passed to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    /// Fixed seed for reproducible output.
    pub seed: u32,
    /// Context window in tokens.
    pub context_size: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: 100,
            temperature: 0.1,
            top_p: 0.9,
            seed: 42,
            context_size: 4096,
        }
    }
}

/// Prompt assembly settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// How many regular examples (the most recent ones) go into the prompt.
    pub example_window: usize,
    /// Mention the current branch and remotes in the prompt.
    pub repo_context: bool,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            example_window: 10,
            repo_context: true,
        }
    }
}

/// Command execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Per-command timeout.
    pub timeout_secs: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

/// Backend overrides given on the command line.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub model: Option<String>,
    pub host: Option<String>,
    pub model_path: Option<PathBuf>,
}

impl CliOverrides {
    /// Apply the overrides. `--model-path` switches to the llama.cpp backend.
    pub fn apply(self, config: &mut Config) {
        if let Some(path) = self.model_path {
            match &mut config.backend {
                BackendConfig::LlamaCpp { model_path, .. } => *model_path = Some(path),
                BackendConfig::Ollama { .. } => {
                    config.backend = BackendConfig::llamacpp(Some(path));
                }
            }
        }

        match &mut config.backend {
            BackendConfig::Ollama { model, host } | BackendConfig::LlamaCpp { model, host, .. } => {
                if let Some(m) = self.model {
                    *model = m;
                }
                if let Some(h) = self.host {
                    *host = h;
                }
            }
        }
    }
}

impl Config {
    /// Get the config directory path.
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("giti"))
            .context("Could not determine config directory")
    }

    /// Get the config file path.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, using defaults if not found.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Save configuration to file.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Get the backend type as a string.
    pub fn backend_type(&self) -> &'static str {
        match &self.backend {
            BackendConfig::Ollama { .. } => "ollama",
            BackendConfig::LlamaCpp { .. } => "llamacpp",
        }
    }

    /// Ollama host, falling back to the default when another backend is active.
    pub fn ollama_host(&self) -> String {
        match &self.backend {
            BackendConfig::Ollama { host, .. } => host.clone(),
            BackendConfig::LlamaCpp { .. } => default_ollama_host(),
        }
    }
}
