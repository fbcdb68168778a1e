//! Few-shot examples: the built-in set and the context file loader.
//!
//! Context files are plain text with `USER:` / `BOT:` lines:
//!
//! ```text
//! # deploy flow
//! USER: publish the release branch
//! BOT: git push origin release
//! ```

use crate::error::ContextFileError;
use std::path::Path;
use tracing::{debug, warn};

/// One natural-language request and the command(s) that answer it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    pub user: String,
    /// May hold several commands separated by newlines.
    pub bot: String,
}

impl Example {
    pub fn new(user: impl Into<String>, bot: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            bot: bot.into(),
        }
    }
}

fn pairs(raw: &[(&str, &str)]) -> Vec<Example> {
    raw.iter().map(|(u, b)| Example::new(*u, *b)).collect()
}

/// Built-in examples, grouped by topic.
pub fn base_examples() -> Vec<Example> {
    pairs(&[
        // Basic workflow
        ("check repository status", "git status"),
        ("add all changes", "git add ."),
        ("add specific file app.js", "git add app.js"),
        ("commit changes with message update README", "git commit -m \"update README\""),
        ("add and commit in one line with message fix", "git commit -am \"fix\""),
        (
            "amend last commit message to better explanation",
            "git commit --amend -m \"better explanation\"",
        ),
        ("push current branch", "git push"),
        ("push to origin main", "git push origin main"),
        ("pull latest changes", "git pull"),
        ("pull with rebase", "git pull --rebase"),
        // Branching
        ("create new branch dev-feature", "git checkout -b dev-feature"),
        ("switch to dev branch", "git checkout dev"),
        ("delete local branch dev", "git branch -d dev"),
        ("delete remote branch dev", "git push origin --delete dev"),
        ("list all branches", "git branch"),
        ("list remote branches", "git branch -r"),
        ("rename current branch to hotfix", "git branch -m hotfix"),
        // Time based
        ("go back to commit that was done 6 hours back", "git reset --hard HEAD@{6.hours.ago}"),
        ("go back 6 hours", "git reset --hard HEAD@{6.hours.ago}"),
        ("reset to 3 hours ago", "git reset --hard HEAD@{3.hours.ago}"),
        ("checkout to 2 hours ago", "git checkout HEAD@{2.hours.ago}"),
        ("find commits from last 2 days", "git log --since=\"2 days ago\" --oneline"),
        ("reset to state from 3 hours ago", "git reset --hard HEAD@{3.hours.ago}"),
        ("show changes from yesterday", "git log --since=\"yesterday\" --oneline"),
        ("go back to commit made this morning", "git log --since=\"today 00:00\" --oneline"),
        ("reset to last week", "git reset --hard HEAD@{1.week.ago}"),
        ("go back to yesterday", "git reset --hard HEAD@{1.day.ago}"),
        ("show commits from 4 hours ago", "git log --since=\"4 hours ago\" --oneline"),
        // Commit counts
        ("go back 6 commits", "git reset --hard HEAD~6"),
        ("go back 3 commits", "git reset --hard HEAD~3"),
        ("checkout 5 commits back", "git checkout HEAD~5"),
        // History navigation
        ("go back 5 commits", "git reset --hard HEAD~5"),
        ("go back 3 commits but keep changes", "git reset --soft HEAD~3"),
        ("undo last commit but keep changes", "git reset --soft HEAD~1"),
        ("undo last commit and discard changes", "git reset --hard HEAD~1"),
        ("undo last 2 commits but keep files", "git reset --soft HEAD~2"),
        // Interactive rebase
        ("squash last 3 commits into one", "git rebase -i HEAD~3"),
        ("interactive rebase last 5 commits", "git rebase -i HEAD~5"),
        ("edit last commit", "git rebase -i HEAD~1"),
        // Staging + commit
        ("commit all changes with message fix bugs", "git add .\ngit commit -m \"fix bugs\""),
        (
            "stage and commit with message added feature",
            "git add .\ngit commit -m \"added feature\"",
        ),
        // Force pushes, always with lease
        ("force push safely", "git push --force-with-lease"),
        ("force push to origin main", "git push --force-with-lease origin main"),
        // Merge and rebase
        ("merge dev into current branch", "git merge dev"),
        ("rebase current branch onto main", "git rebase main"),
        ("abort merge", "git merge --abort"),
        ("abort rebase", "git rebase --abort"),
        // Logs
        ("show commit history", "git log --oneline"),
        ("show last 10 commits", "git log -10 --oneline"),
        ("show commits by author", "git log --author=\"<author>\" --oneline"),
        ("search commits by message", "git log --grep=\"<search>\" --oneline"),
        // Stash
        ("stash changes", "git stash"),
        ("apply last stash", "git stash pop"),
        ("list all stashes", "git stash list"),
        // Remotes
        ("fetch latest changes", "git fetch"),
        ("sync with remote", "git fetch origin\ngit reset --hard origin/main"),
    ])
}

/// Time-vs-commit disambiguation pairs. Always placed last in the prompt.
pub fn critical_examples() -> Vec<Example> {
    pairs(&[
        ("go back 6 commits", "git reset --hard HEAD~6"),
        ("go back 3 commits", "git reset --hard HEAD~3"),
        ("go back 6 hours", "git reset --hard HEAD@{6.hours.ago}"),
        ("go back 3 hours", "git reset --hard HEAD@{3.hours.ago}"),
        ("reset to 2 hours ago", "git reset --hard HEAD@{2.hours.ago}"),
        ("checkout to 4 hours ago", "git checkout HEAD@{4.hours.ago}"),
        ("go back to yesterday", "git reset --hard HEAD@{1.day.ago}"),
        ("show commits from 5 hours ago", "git log --since=\"5 hours ago\" --oneline"),
    ])
}

/// Parse the contents of a context file.
pub fn parse_context(text: &str) -> Result<Vec<Example>, ContextFileError> {
    let mut examples = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(rest) = line.strip_prefix("USER:") {
            let question = rest.trim();
            if question.is_empty() {
                return Err(ContextFileError::EmptyField {
                    line: line_no,
                    field: "USER:",
                });
            }
            if let Some((prev_line, prev)) = pending.replace((line_no, question.to_string())) {
                warn!(
                    "Context file line {}: question '{}' has no BOT: answer, replaced",
                    prev_line, prev
                );
            }
        } else if let Some(rest) = line.strip_prefix("BOT:") {
            let answer = rest.trim();
            if answer.is_empty() {
                return Err(ContextFileError::EmptyField {
                    line: line_no,
                    field: "BOT:",
                });
            }
            let (_, question) = pending
                .take()
                .ok_or(ContextFileError::OrphanAnswer { line: line_no })?;
            examples.push(Example::new(question, answer));
        } else {
            debug!("Context file line {}: ignored", line_no);
        }
    }

    if let Some((line_no, question)) = pending {
        warn!(
            "Context file line {}: trailing question '{}' has no BOT: answer, dropped",
            line_no, question
        );
    }

    if examples.is_empty() {
        return Err(ContextFileError::NoExamples);
    }

    Ok(examples)
}

/// Read and parse a context file.
pub fn load_context_file(path: &Path) -> Result<Vec<Example>, ContextFileError> {
    let text = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ContextFileError::NotFound(path.to_path_buf())
        } else {
            ContextFileError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let examples = parse_context(&text)?;
    debug!("Loaded {} examples from {}", examples.len(), path.display());
    Ok(examples)
}
