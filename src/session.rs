//! One translation round trip, and the interactive shell built on it.

use crate::executor::{ExecutionReport, Executor};
use crate::extract::extract_commands;
use crate::llm::Backend;
use crate::prompt::PromptBuilder;
use anyhow::{anyhow, Result};
use colored::Colorize;
use std::io::{BufRead, Write};
use tracing::debug;

const SHELL_HELP: &str = "
Available commands:
  - Any natural language Git query (e.g., \"commit all changes\")
  - help: Show this help message
  - exit/quit: Exit the shell
";

/// Everything needed to answer queries.
pub struct Session {
    backend: Backend,
    prompt: PromptBuilder,
    executor: Executor,
}

impl Session {
    pub fn new(backend: Backend, prompt: PromptBuilder, executor: Executor) -> Self {
        Self {
            backend,
            prompt,
            executor,
        }
    }

    /// Translate `query` and hand the commands to the executor.
    pub async fn process_query<R, W>(
        &self,
        query: &str,
        input: &mut R,
        out: &mut W,
    ) -> Result<ExecutionReport>
    where
        R: BufRead,
        W: Write,
    {
        let prompt = self.prompt.build(query);
        debug!("Prompt:\n{}", prompt);

        writeln!(out, "{}", "Thinking...".dimmed())?;
        out.flush()?;
        let response = self.backend.generate(&prompt).await?;
        debug!("Model response: {:?}", response);

        let commands = extract_commands(&response);
        if commands.is_empty() {
            return Err(anyhow!("No valid Git commands found in the response"));
        }

        self.executor.execute_commands(&commands, input, out).await
    }

    /// Read-eval-print loop. Errors for a single query are printed and the
    /// loop continues.
    pub async fn run_shell<R, W>(&self, input: &mut R, out: &mut W) -> Result<()>
    where
        R: BufRead,
        W: Write,
    {
        writeln!(out, "Welcome to giti interactive shell!")?;
        writeln!(out, "Type 'exit' or 'quit' to leave, 'help' for assistance")?;
        writeln!(out)?;

        loop {
            write!(out, "{}", "giti> ".cyan().bold())?;
            out.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                writeln!(out, "\nGoodbye!")?;
                return Ok(());
            }

            let query = line.trim();
            match query.to_lowercase().as_str() {
                "exit" | "quit" => {
                    writeln!(out, "Goodbye!")?;
                    return Ok(());
                }
                "help" => {
                    writeln!(out, "{}", SHELL_HELP)?;
                    continue;
                }
                "" => continue,
                _ => {}
            }

            if let Err(e) = self.process_query(query, input, out).await {
                writeln!(out, "{} {:#}", "Error:".red().bold(), e)?;
            }
            writeln!(out)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationConfig;
    use crate::executor::Disposition;
    use crate::llm::ollama::OllamaBackend;
    use serde_json::json;
    use std::io::Cursor;
    use std::time::Duration;

    fn session(host: String) -> Session {
        let backend = OllamaBackend::new("qwen2.5-coder:1.5b".to_string(), host, GenerationConfig::default())
            .unwrap();
        Session::new(
            Backend::Ollama(backend),
            PromptBuilder::new(vec![], 10),
            Executor::new(true, false, Duration::from_secs(5)),
        )
    }

    async fn mock_chat(server: &mut mockito::ServerGuard, content: &str) -> mockito::Mock {
        server
            .mock("POST", "/api/chat")
            .with_status(200)
            .with_body(json!({ "message": { "role": "assistant", "content": content } }).to_string())
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_process_query_dry_run() {
        let mut server = mockito::Server::new_async().await;
        let _chat = mock_chat(&mut server, "```\ngit add .\ngit commit -m \"fix bugs\"\n```").await;

        let mut input = Cursor::new(Vec::new());
        let mut out = Vec::new();
        let report = session(server.url())
            .process_query("commit everything as fix bugs", &mut input, &mut out)
            .await
            .unwrap();

        assert_eq!(report.disposition, Disposition::DryRun);
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("git add ."));
        assert!(out.contains("git commit -m \"fix bugs\""));
    }

    #[tokio::test]
    async fn test_process_query_without_commands() {
        let mut server = mockito::Server::new_async().await;
        let _chat = mock_chat(&mut server, "I cannot help with that.").await;

        let mut input = Cursor::new(Vec::new());
        let mut out = Vec::new();
        let err = session(server.url())
            .process_query("make coffee", &mut input, &mut out)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "No valid Git commands found in the response");
    }

    #[tokio::test]
    async fn test_shell_loop() {
        let mut server = mockito::Server::new_async().await;
        let chat = mock_chat(&mut server, "git branch").await;

        let mut input = Cursor::new(b"help\n\n  list branches  \nQUIT\nlist tags\n".to_vec());
        let mut out = Vec::new();
        session(server.url()).run_shell(&mut input, &mut out).await.unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("Available commands:"));
        assert!(out.contains("1. "));
        assert!(out.contains("git branch"));
        assert!(out.trim_end().ends_with("Goodbye!"));
        // "list tags" comes after quit and is never sent.
        chat.assert_async().await;
    }

    #[tokio::test]
    async fn test_shell_survives_backend_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", mockito::Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let mut input = Cursor::new(b"show history\n".to_vec());
        let mut out = Vec::new();
        session(server.url()).run_shell(&mut input, &mut out).await.unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("Error"));
        assert!(out.contains("Goodbye!"));
    }
}
