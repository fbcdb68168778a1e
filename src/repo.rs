//! Repository context gathering.
//!
//! Tells the model which branch and remotes exist so generated commands
//! refer to real names instead of guessing `main` / `origin`.

use std::path::Path;
use std::process::Command;
use tracing::debug;

/// What we know about the repository in the working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoContext {
    /// Current branch, or `HEAD` when detached.
    pub branch: String,
    pub remotes: Vec<String>,
}

impl RepoContext {
    /// One-line description used in the prompt.
    pub fn describe(&self) -> String {
        if self.remotes.is_empty() {
            format!("Repository: branch {}, no remotes", self.branch)
        } else {
            format!(
                "Repository: branch {}, remotes {}",
                self.branch,
                self.remotes.join(", ")
            )
        }
    }
}

/// Gather repository context for `cwd`.
///
/// Returns `None` when git is not installed or `cwd` is not inside a work tree.
pub fn gather_repo_context(cwd: &Path) -> Option<RepoContext> {
    let inside = run_git(cwd, &["rev-parse", "--is-inside-work-tree"])?;
    if inside.trim() != "true" {
        return None;
    }
    // symbolic-ref also works on an unborn branch; it fails only when detached.
    let branch = run_git(cwd, &["symbolic-ref", "--short", "-q", "HEAD"])
        .unwrap_or_else(|| "HEAD".to_string());
    let remotes = run_git(cwd, &["remote"])
        .map(|out| parse_remotes(&out))
        .unwrap_or_default();

    Some(RepoContext {
        branch: branch.trim().to_string(),
        remotes,
    })
}

fn run_git(cwd: &Path, args: &[&str]) -> Option<String> {
    match Command::new("git").args(args).current_dir(cwd).output() {
        Ok(output) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        Ok(output) => {
            debug!(
                "git {} exited with {}: {}",
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            None
        }
        Err(e) => {
            debug!("Failed to run git: {}", e);
            None
        }
    }
}

fn parse_remotes(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
