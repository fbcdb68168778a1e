//! Error types for giti.
//!
//! Application code works with `anyhow::Result`; the enums here exist for
//! failures callers need to tell apart.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading a `USER:` / `BOT:` context file.
#[derive(Error, Debug)]
pub enum ContextFileError {
    #[error("Context file not found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read context file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: BOT: entry has no preceding USER: entry")]
    OrphanAnswer { line: usize },

    #[error("line {line}: empty {field} entry")]
    EmptyField { line: usize, field: &'static str },

    #[error("no USER:/BOT: example pairs found")]
    NoExamples,
}

/// Errors raised by inference backends.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error(
        "Model file not found at {}. Download a GGUF model first, e.g. from https://huggingface.co/models?library=gguf",
        .0.display()
    )]
    ModelFileNotFound(PathBuf),

    #[error("'{0}' not found in PATH. Install llama.cpp or set backend.server_bin in the config")]
    ServerBinaryMissing(String),

    #[error("Model '{model}' is not available in Ollama. Pull it with: giti models pull {model}")]
    ModelNotPulled { model: String },

    #[error("{backend} is not reachable at {host}: {reason}")]
    Unreachable {
        backend: &'static str,
        host: String,
        reason: String,
    },

    #[error("Error generating response: {primary}, Fallback error: {fallback}")]
    Generation { primary: String, fallback: String },

    #[error("llama-server did not become ready within {0} seconds")]
    StartupTimeout(u64),
}
