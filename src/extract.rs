//! Turning raw model output into runnable command lines.

use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

/// Labels models like to put in front of the answer.
const PREAMBLES: &[&str] = &[
    "Assistant:",
    "Here's the command:",
    "Here is the command:",
    "The command is:",
    "Run:",
    "Execute:",
    "Command:",
];

fn line_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Shell prompts ("$ ", "> ") and list markers ("1.", "2)", "-", "*").
    RE.get_or_init(|| Regex::new(r"^(?:[$>]\s*|\d+[.)]\s+|[-*]\s+)+").expect("valid regex"))
}

/// Extract the git commands from a model response.
///
/// Returns an empty list when nothing usable is found.
pub fn extract_commands(output: &str) -> Vec<String> {
    let mut commands: Vec<String> = Vec::new();

    for raw in output.lines() {
        let line = raw.trim();

        if line.starts_with("Human:") {
            break;
        }
        if line.starts_with("```") {
            continue;
        }

        let line = clean_line(line);
        if !is_git_command(&line) {
            continue;
        }
        if has_shell_control(&line) {
            warn!("Dropping command with shell control syntax: {}", line);
            continue;
        }
        if commands.last() != Some(&line) {
            commands.push(line);
        }
    }

    commands
}

fn clean_line(line: &str) -> String {
    let mut line = line.trim_matches('`').trim();
    for preamble in PREAMBLES {
        if let Some(stripped) = line.strip_prefix(preamble) {
            line = stripped.trim_start();
        }
    }
    let line = line_prefix().replace(line, "");
    line.trim_matches('`').trim().to_string()
}

fn is_git_command(line: &str) -> bool {
    line.split_whitespace().next() == Some("git")
}

/// Whether `line` would make the shell do more than run one git process:
/// command separators, pipes, redirections, or command substitution.
/// Single-quoted text is literal; inside double quotes only substitution
/// counts.
pub fn has_shell_control(line: &str) -> bool {
    let mut chars = line.chars().peekable();
    let mut in_single = false;
    let mut in_double = false;

    while let Some(c) = chars.next() {
        if in_single {
            in_single = c != '\'';
            continue;
        }
        match c {
            '\\' => {
                chars.next();
            }
            '`' => return true,
            '$' if chars.peek() == Some(&'(') => return true,
            '"' => in_double = !in_double,
            '\'' if !in_double => in_single = true,
            ';' | '&' | '|' | '<' | '>' | '\n' | '\r' if !in_double => return true,
            _ => {}
        }
    }

    false
}

/// Whether a command can lose work or rewrite shared history.
pub fn is_destructive(command: &str) -> bool {
    let words: Vec<&str> = command.split_whitespace().collect();
    if words.first() != Some(&"git") {
        return false;
    }
    let sub = words.get(1).copied().unwrap_or_default();
    let has = |flag: &str| words.iter().skip(2).any(|w| *w == flag);

    match sub {
        "reset" => has("--hard"),
        "push" => {
            has("--force")
                || has("-f")
                || words.iter().skip(2).any(|w| w.starts_with('+'))
        }
        "clean" => words
            .iter()
            .skip(2)
            .any(|w| *w == "--force" || (w.starts_with('-') && !w.starts_with("--") && w.contains('f'))),
        "branch" => has("-D") || (has("--delete") && has("--force")),
        "checkout" => has("--") && has("."),
        "stash" => matches!(words.get(2), Some(&"clear") | Some(&"drop")),
        "rebase" | "filter-branch" => true,
        _ => false,
    }
}
