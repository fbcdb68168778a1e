//! Few-shot prompt assembly.

use crate::fewshot::{base_examples, critical_examples, Example};
use crate::repo::RepoContext;

/// System message sent alongside chat requests.
pub const SYSTEM_MESSAGE: &str =
    "You are a Git command expert. Respond only with valid Git commands, nothing else.";

const HEADER: &[&str] = &[
    "You are a Git command expert. Convert natural language descriptions into valid Git commands.",
    "",
    "CRITICAL RULES:",
    "- For TIME periods (hours, days): Use HEAD@{N.hours.ago} or --since syntax",
    "- For COMMIT counts: Use HEAD~N syntax",
    "- 'go back 6 hours' = HEAD@{6.hours.ago} (TIME)",
    "- 'go back 6 commits' = HEAD~6 (COMMITS)",
];

/// Builds prompts from the built-in examples plus any context file examples.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    examples: Vec<Example>,
    critical: Vec<Example>,
    window: usize,
    repo: Option<RepoContext>,
}

impl PromptBuilder {
    /// `extra` examples are appended after the built-in ones, so with the
    /// default window a context file's last entries are what the model sees.
    pub fn new(extra: Vec<Example>, window: usize) -> Self {
        let mut examples = base_examples();
        examples.extend(extra);
        Self {
            examples,
            critical: critical_examples(),
            window,
            repo: None,
        }
    }

    pub fn with_repo(mut self, repo: Option<RepoContext>) -> Self {
        self.repo = repo;
        self
    }

    /// The regular examples that make it into the prompt.
    pub fn windowed_examples(&self) -> &[Example] {
        let start = self.examples.len().saturating_sub(self.window);
        &self.examples[start..]
    }

    pub fn critical_examples(&self) -> &[Example] {
        &self.critical
    }

    /// Build the prompt for one query.
    pub fn build(&self, query: &str) -> String {
        let mut parts: Vec<String> = HEADER.iter().map(|s| s.to_string()).collect();

        if let Some(repo) = &self.repo {
            parts.push(repo.describe());
        }

        parts.push(String::new());
        parts.push("Examples:".to_string());

        for example in self.windowed_examples().iter().chain(self.critical.iter()) {
            parts.push(format!("Human: {}", example.user));
            parts.push(format!("Assistant: {}", example.bot));
            parts.push(String::new());
        }

        parts.push(format!("Human: {}", query.trim()));
        parts.push("Assistant:".to_string());

        parts.join("\n")
    }
}
