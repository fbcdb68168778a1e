//! `giti models`: manage the models of a local Ollama server.

use anyhow::{anyhow, Context, Result};
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::io::Write;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    name: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    modified_at: Option<String>,
}

/// One line of the streamed `/api/pull` response.
#[derive(Debug, Deserialize)]
struct PullProgress {
    #[serde(default)]
    status: String,
    completed: Option<u64>,
    total: Option<u64>,
    error: Option<String>,
}

/// List locally available models, marking the configured one.
pub async fn list_models(host: &str, configured: Option<&str>) -> Result<()> {
    let client = Client::new();
    let url = format!("{}/api/tags", host);

    let response = client
        .get(&url)
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .context("Failed to connect to Ollama. Is it running?")?;

    if !response.status().is_success() {
        return Err(anyhow!("Failed to list models: {}", response.status()));
    }

    let data: TagsResponse = response.json().await?;

    println!("Available Models");
    println!("================\n");

    if data.models.is_empty() {
        println!("No models installed.");
        println!("\nPull a model with: giti models pull <model>");
        println!("Example: giti models pull qwen2.5-coder:1.5b");
        return Ok(());
    }

    for model in &data.models {
        let size = model.size.map(format_size).unwrap_or_else(|| "?".to_string());
        let modified = model
            .modified_at
            .as_deref()
            .map(|s| s.split('T').next().unwrap_or(s))
            .unwrap_or("?");
        let marker = if configured == Some(model.name.as_str()) {
            " (configured)"
        } else {
            ""
        };
        println!("  {} ({}) - {}{}", model.name, size, modified, marker);
    }

    Ok(())
}

/// Binary-prefixed size, one decimal above a kilobyte.
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

fn progress_line(status: &str, completed: u64, total: u64) -> String {
    let pct = if total == 0 {
        0
    } else {
        (completed as f64 / total as f64 * 100.0) as u32
    };
    format!(
        "{}: {}% ({}/{})",
        status,
        pct,
        format_size(completed),
        format_size(total)
    )
}

/// Pull a model, streaming progress.
pub async fn pull_model(host: &str, model: &str) -> Result<()> {
    println!("Pulling model: {}", model);
    println!("This may take a while depending on model size...\n");

    let client = Client::new();
    let url = format!("{}/api/pull", host);

    let response = client
        .post(&url)
        .json(&serde_json::json!({ "name": model, "stream": true }))
        .timeout(Duration::from_secs(3600))
        .send()
        .await
        .context("Failed to connect to Ollama. Is it running?")?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(anyhow!("Failed to pull model: {} - {}", status, body));
    }

    let mut stream = response.bytes_stream();
    let mut pending = String::new();
    let mut last_status = String::new();
    let mut stdout = std::io::stdout();

    while let Some(chunk) = stream.next().await {
        pending.push_str(&String::from_utf8_lossy(&chunk?));

        // Chunks can split a JSON line; keep the tail for the next round.
        while let Some(newline) = pending.find('\n') {
            let line: String = pending.drain(..=newline).collect();
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Ok(progress) = serde_json::from_str::<PullProgress>(line) else {
                continue;
            };
            if let Some(error) = progress.error {
                println!();
                return Err(anyhow!("Failed to pull model: {}", error));
            }

            match (progress.completed, progress.total) {
                (Some(completed), Some(total)) => {
                    print!("\r{}", progress_line(&progress.status, completed, total));
                    stdout.flush()?;
                }
                _ if progress.status != last_status => {
                    println!("{}", progress.status);
                }
                _ => {}
            }
            last_status = progress.status;
        }
    }

    println!("\n\nModel '{}' pulled successfully!", model);
    Ok(())
}

/// Error body Ollama sends with non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Delete a local model. A model Ollama does not know is reported as such.
pub async fn remove_model(host: &str, model: &str) -> Result<()> {
    let response = Client::new()
        .delete(format!("{}/api/delete", host))
        .json(&serde_json::json!({ "model": model }))
        .timeout(Duration::from_secs(30))
        .send()
        .await
        .context("Failed to connect to Ollama. Is it running?")?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(anyhow!(
            "Model '{}' is not installed. See `giti models list`",
            model
        ));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let reason = serde_json::from_str::<ErrorBody>(&body)
            .map(|e| e.error)
            .unwrap_or(body);
        return Err(anyhow!("Failed to remove {}: {} ({})", model, reason, status));
    }

    println!("Removed {}", model);
    Ok(())
}
