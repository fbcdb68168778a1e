//! Common test utilities

use assert_cmd::Command;
use mockito::{Mock, ServerGuard};
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// A `giti` command with config and home isolated in a temp directory.
pub fn giti(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("giti").unwrap();
    cmd.env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join(".config"))
        .env_remove("RUST_LOG")
        .current_dir(home.path());
    cmd
}

/// Write a context file into the temp directory.
pub fn write_context(home: &TempDir, content: &str) -> PathBuf {
    let path = home.path().join("context.txt");
    fs::write(&path, content).unwrap();
    path
}

/// Serve an Ollama that has the default model and answers every chat
/// request with `reply`.
pub fn mock_ollama(server: &mut ServerGuard, reply: &str) -> (Mock, Mock) {
    let tags = server
        .mock("GET", "/api/tags")
        .with_status(200)
        .with_body(json!({ "models": [{ "name": "qwen2.5-coder:1.5b", "size": 986_000_000u64 }] }).to_string())
        .create();
    let chat = server
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_body(json!({ "message": { "role": "assistant", "content": reply } }).to_string())
        .create();
    (tags, chat)
}
