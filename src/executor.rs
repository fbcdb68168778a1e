//! Command execution with confirmation and dry-run support.

use crate::extract::is_destructive;
use anyhow::Result;
use colored::Colorize;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// How one command ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success { stdout: String },
    Failed { code: Option<i32>, stderr: String },
    TimedOut,
    SpawnError(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

/// A command and its outcome.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub command: String,
    pub outcome: Outcome,
}

/// How the batch as a whole ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Nothing to run.
    Empty,
    DryRun,
    /// User declined the initial confirmation.
    Cancelled,
    /// User chose not to continue after a failure.
    Stopped,
    Completed,
}

#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub disposition: Disposition,
    pub results: Vec<CommandResult>,
}

impl ExecutionReport {
    fn new(disposition: Disposition) -> Self {
        Self {
            disposition,
            results: Vec::new(),
        }
    }

    /// Commands that did not succeed.
    pub fn failed(&self) -> impl Iterator<Item = &CommandResult> {
        self.results.iter().filter(|r| !r.outcome.is_success())
    }
}

/// Runs generated commands through the platform shell.
#[derive(Debug, Clone)]
pub struct Executor {
    pub dry_run: bool,
    pub no_confirm: bool,
    pub timeout: Duration,
    /// Working directory for commands. `None` inherits ours.
    pub cwd: Option<PathBuf>,
}

impl Executor {
    pub fn new(dry_run: bool, no_confirm: bool, timeout: Duration) -> Self {
        Self {
            dry_run,
            no_confirm,
            timeout,
            cwd: None,
        }
    }

    /// Show, confirm and run `commands`, reading answers from `input`.
    pub async fn execute_commands<R, W>(
        &self,
        commands: &[String],
        input: &mut R,
        out: &mut W,
    ) -> Result<ExecutionReport>
    where
        R: BufRead,
        W: Write,
    {
        if commands.is_empty() {
            writeln!(out, "{}", "No commands to execute".red())?;
            return Ok(ExecutionReport::new(Disposition::Empty));
        }

        writeln!(out, "Generated commands:")?;
        for (i, cmd) in commands.iter().enumerate() {
            writeln!(out, "  {}. {}", i + 1, cmd.bold())?;
        }
        for cmd in commands.iter().filter(|c| is_destructive(c)) {
            writeln!(
                out,
                "  {} `{}` can discard work or rewrite history",
                "warning:".yellow().bold(),
                cmd
            )?;
        }
        writeln!(out)?;

        if self.dry_run {
            writeln!(out, "Dry run mode - commands not executed")?;
            return Ok(ExecutionReport::new(Disposition::DryRun));
        }

        if !self.no_confirm && !confirm("Execute these commands? [y/N]: ", input, out)? {
            writeln!(out, "{}", "Execution cancelled".red())?;
            return Ok(ExecutionReport::new(Disposition::Cancelled));
        }

        let mut report = ExecutionReport::new(Disposition::Completed);
        let total = commands.len();

        for (i, cmd) in commands.iter().enumerate() {
            writeln!(out, "\n[{}/{}] {}", i + 1, total, cmd.bold())?;

            let outcome = self.run(cmd).await;
            self.print_outcome(&outcome, out)?;
            let failed = !outcome.is_success();

            report.results.push(CommandResult {
                command: cmd.clone(),
                outcome,
            });

            if failed
                && i + 1 < total
                && !self.no_confirm
                && !confirm("Continue with remaining commands? [y/N]: ", input, out)?
            {
                writeln!(out, "{}", "Execution stopped".red())?;
                report.disposition = Disposition::Stopped;
                return Ok(report);
            }
        }

        writeln!(out, "\nCommand execution completed")?;
        Ok(report)
    }

    fn print_outcome<W: Write>(&self, outcome: &Outcome, out: &mut W) -> Result<()> {
        match outcome {
            Outcome::Success { stdout } => {
                writeln!(out, "{}", "Success".green())?;
                if !stdout.trim().is_empty() {
                    writeln!(out, "Output:\n{}", stdout.trim_end())?;
                }
            }
            Outcome::Failed { code, stderr } => {
                let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                writeln!(out, "{}", format!("Error (exit code {})", code).red())?;
                if !stderr.trim().is_empty() {
                    writeln!(out, "Error output:\n{}", stderr.trim_end())?;
                }
            }
            Outcome::TimedOut => {
                writeln!(
                    out,
                    "{}",
                    format!("Command timed out after {} seconds", self.timeout.as_secs_f32()).red()
                )?;
            }
            Outcome::SpawnError(e) => {
                writeln!(out, "{}", format!("Unexpected error: {}", e).red())?;
            }
        }
        Ok(())
    }

    /// Run one command through the shell, capturing its output.
    async fn run(&self, cmd: &str) -> Outcome {
        let mut command = shell_command(cmd);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.cwd {
            command.current_dir(dir);
        }

        info!("Executing: {}", cmd);
        match tokio::time::timeout(self.timeout, command.output()).await {
            Err(_) => Outcome::TimedOut,
            Ok(Err(e)) => Outcome::SpawnError(e.to_string()),
            Ok(Ok(output)) => {
                debug!("{} exited with {}", cmd, output.status);
                if output.status.success() {
                    Outcome::Success {
                        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    }
                } else {
                    Outcome::Failed {
                        code: output.status.code(),
                        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    }
                }
            }
        }
    }
}

#[cfg(unix)]
fn shell_command(cmd: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(cmd);
    command
}

#[cfg(windows)]
fn shell_command(cmd: &str) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").arg(cmd);
    command
}

/// Ask a yes/no question. Empty answer and end of input mean no.
pub fn confirm<R: BufRead, W: Write>(question: &str, input: &mut R, out: &mut W) -> Result<bool> {
    loop {
        write!(out, "{}", question)?;
        out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(out, "\n{}", "Cancelled by user".red())?;
            return Ok(false);
        }

        match line.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" | "" => return Ok(false),
            _ => writeln!(out, "Please enter 'y' for yes or 'n' for no")?,
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn executor(dir: &tempfile::TempDir, dry_run: bool, no_confirm: bool) -> Executor {
        let mut executor = Executor::new(dry_run, no_confirm, Duration::from_secs(10));
        executor.cwd = Some(dir.path().to_path_buf());
        executor
    }

    fn cmds(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    async fn run(executor: &Executor, commands: &[&str], answers: &str) -> (ExecutionReport, String) {
        let mut input = Cursor::new(answers.as_bytes().to_vec());
        let mut out = Vec::new();
        let report = executor
            .execute_commands(&cmds(commands), &mut input, &mut out)
            .await
            .unwrap();
        (report, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_confirm_answers() {
        let mut out = Vec::new();
        for (answer, expected) in [("y\n", true), ("YES\n", true), ("n\n", false), ("\n", false), ("", false)] {
            let mut input = Cursor::new(answer.as_bytes());
            assert_eq!(confirm("? ", &mut input, &mut out).unwrap(), expected, "answer {:?}", answer);
        }
    }

    #[test]
    fn test_confirm_reasks_on_garbage() {
        let mut input = Cursor::new(&b"maybe\nyes\n"[..]);
        let mut out = Vec::new();
        assert!(confirm("? ", &mut input, &mut out).unwrap());
        assert!(String::from_utf8(out).unwrap().contains("Please enter 'y' for yes or 'n' for no"));
    }

    #[tokio::test]
    async fn test_dry_run_does_not_execute() {
        let dir = tempfile::tempdir().unwrap();
        let (report, out) = run(&executor(&dir, true, false), &["touch created"], "").await;

        assert_eq!(report.disposition, Disposition::DryRun);
        assert!(out.contains("1. "));
        assert!(out.contains("Dry run mode - commands not executed"));
        assert!(!dir.path().join("created").exists());
    }

    #[tokio::test]
    async fn test_declined_confirmation_cancels() {
        let dir = tempfile::tempdir().unwrap();
        let (report, out) = run(&executor(&dir, false, false), &["touch created"], "n\n").await;

        assert_eq!(report.disposition, Disposition::Cancelled);
        assert!(out.contains("Execution cancelled"));
        assert!(!dir.path().join("created").exists());
    }

    #[tokio::test]
    async fn test_confirmed_commands_run_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let (report, out) = run(
            &executor(&dir, false, false),
            &["echo one > log", "echo two >> log && cat log"],
            "y\n",
        )
        .await;

        assert_eq!(report.disposition, Disposition::Completed);
        assert_eq!(report.results.len(), 2);
        assert_eq!(
            report.results[1].outcome,
            Outcome::Success {
                stdout: "one\ntwo\n".to_string()
            }
        );
        assert!(out.contains("[2/2]"));
        assert!(out.contains("Command execution completed"));
    }

    #[tokio::test]
    async fn test_failure_asks_to_continue() {
        let dir = tempfile::tempdir().unwrap();
        let (report, out) = run(
            &executor(&dir, false, false),
            &["echo broken >&2; exit 3", "touch created"],
            "y\nn\n",
        )
        .await;

        assert_eq!(report.disposition, Disposition::Stopped);
        assert_eq!(report.results.len(), 1);
        assert_eq!(
            report.results[0].outcome,
            Outcome::Failed {
                code: Some(3),
                stderr: "broken\n".to_string()
            }
        );
        assert!(out.contains("Continue with remaining commands?"));
        assert!(!dir.path().join("created").exists());
    }

    #[tokio::test]
    async fn test_continue_after_failure_runs_remaining() {
        let dir = tempfile::tempdir().unwrap();
        let (report, out) = run(
            &executor(&dir, false, false),
            &["exit 2", "touch created"],
            "y\nyes\n",
        )
        .await;

        assert_eq!(report.disposition, Disposition::Completed);
        assert_eq!(report.results.len(), 2);
        assert!(report.results[1].outcome.is_success());
        assert!(out.contains("Continue with remaining commands?"));
        assert!(dir.path().join("created").exists());
    }

    #[tokio::test]
    async fn test_timeout_asks_to_continue() {
        let dir = tempfile::tempdir().unwrap();
        let mut executor = executor(&dir, false, false);
        executor.timeout = Duration::from_millis(200);
        let (report, out) = run(&executor, &["sleep 5", "touch created"], "y\nn\n").await;

        assert_eq!(report.disposition, Disposition::Stopped);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].outcome, Outcome::TimedOut);
        assert!(out.contains("Continue with remaining commands?"));
        assert!(!dir.path().join("created").exists());
    }

    #[tokio::test]
    async fn test_spawn_error_asks_to_continue() {
        let dir = tempfile::tempdir().unwrap();
        let mut executor = executor(&dir, false, false);
        executor.cwd = Some(dir.path().join("gone"));
        let (report, out) = run(&executor, &["git status", "git log"], "y\nn\n").await;

        assert_eq!(report.disposition, Disposition::Stopped);
        assert_eq!(report.results.len(), 1);
        assert!(matches!(report.results[0].outcome, Outcome::SpawnError(_)));
        assert!(out.contains("Unexpected error"));
        assert!(out.contains("Continue with remaining commands?"));
    }

    #[tokio::test]
    async fn test_no_confirm_runs_everything() {
        let dir = tempfile::tempdir().unwrap();
        let (report, out) = run(&executor(&dir, false, true), &["exit 1", "touch created"], "").await;

        assert_eq!(report.disposition, Disposition::Completed);
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.failed().map(|r| r.command.as_str()).collect::<Vec<_>>(), vec!["exit 1"]);
        assert!(report.results[1].outcome.is_success());
        assert!(!out.contains("Execute these commands?"));
        assert!(dir.path().join("created").exists());
    }

    #[tokio::test]
    async fn test_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let mut executor = executor(&dir, false, true);
        executor.timeout = Duration::from_millis(200);
        let (report, out) = run(&executor, &["sleep 5"], "").await;

        assert_eq!(report.results[0].outcome, Outcome::TimedOut);
        assert!(out.contains("timed out"));
    }

    #[tokio::test]
    async fn test_destructive_warning() {
        let dir = tempfile::tempdir().unwrap();
        let (_, out) = run(&executor(&dir, true, false), &["git reset --hard HEAD~1"], "").await;
        assert!(out.contains("can discard work or rewrite history"));
    }

    #[tokio::test]
    async fn test_empty_command_list() {
        let dir = tempfile::tempdir().unwrap();
        let (report, _) = run(&executor(&dir, false, false), &[], "").await;
        assert_eq!(report.disposition, Disposition::Empty);
    }
}
