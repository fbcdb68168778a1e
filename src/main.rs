//! giti - natural language to Git commands.
//!
//! Builds a few-shot prompt from built-in and user-supplied examples, asks a
//! locally hosted model for the matching Git commands, and runs them after
//! confirmation.

mod config;
mod error;
mod executor;
mod extract;
mod fewshot;
mod llm;
mod models;
mod prompt;
mod repo;
mod session;
mod tui;

use anyhow::{Context, Result};
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use config::{CliOverrides, Config};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command as ProcessCommand;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "giti")]
#[command(author, version, about = "Convert natural language to Git commands using a local LLM")]
struct Cli {
    /// Natural language description of a Git operation
    #[arg(value_name = "QUERY")]
    query: Option<String>,

    /// Show commands without executing them
    #[arg(long)]
    dry_run: bool,

    /// Run in interactive REPL mode
    #[arg(long)]
    shell: bool,

    /// File of USER:/BOT: example pairs added to the prompt
    #[arg(long, value_name = "FILE", global = true)]
    context: Option<PathBuf>,

    /// Skip confirmation prompts before execution
    #[arg(long)]
    no_confirm: bool,

    /// Override the model name
    #[arg(short = 'm', long, value_name = "MODEL")]
    model: Option<String>,

    /// Override the inference server URL
    #[arg(long, value_name = "URL", global = true)]
    host: Option<String>,

    /// Serve this GGUF file with llama-server (selects the llama.cpp backend)
    #[arg(long, value_name = "FILE")]
    model_path: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage Ollama models (list, pull, remove)
    Models {
        #[command(subcommand)]
        action: ModelsAction,
    },
    /// Open configuration file in $EDITOR
    Config,
    /// Print the examples the prompt is built from (with --context, including that file)
    Examples,
}

#[derive(Subcommand)]
enum ModelsAction {
    /// List locally available models
    List,
    /// Pull/download a model from the Ollama registry
    Pull {
        /// Model name (e.g., qwen2.5-coder:1.5b)
        model: String,
    },
    /// Remove a model from local storage
    Remove {
        /// Model name to remove
        model: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command.take() {
        Some(Commands::Models { action }) => handle_models(action, cli.host).await,
        Some(Commands::Config) => handle_config(),
        Some(Commands::Examples) => handle_examples(cli.context.as_deref()),
        None => handle_translate(cli).await,
    }
}

/// Logs go to stderr so they never mix with generated commands.
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("giti={},reqwest=warn", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Single query, popup, or interactive shell.
async fn handle_translate(cli: Cli) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;
    CliOverrides {
        model: cli.model,
        host: cli.host,
        model_path: cli.model_path,
    }
    .apply(&mut config);

    // Bad context files are reported before any model is loaded.
    let extra = match &cli.context {
        Some(path) => fewshot::load_context_file(path)
            .with_context(|| format!("Invalid context file {}", path.display()))?,
        None => Vec::new(),
    };

    let query = if cli.shell {
        None
    } else if let Some(query) = cli.query {
        Some(query)
    } else if atty::is(atty::Stream::Stdin) && atty::is(atty::Stream::Stdout) {
        match tui::run_tui()? {
            tui::TuiResult::Query(q) => Some(q),
            tui::TuiResult::Cancelled => return Ok(()),
        }
    } else {
        Cli::command().print_help()?;
        std::process::exit(1);
    };

    info!(
        "Using backend: {} ({} examples from context file)",
        config.backend_type(),
        extra.len()
    );
    let backend = llm::create_backend(&config.backend, &config.generation).await?;
    backend.health_check().await.with_context(|| {
        format!(
            "Backend health check failed for {} ({})",
            backend.name(),
            backend.model()
        )
    })?;
    info!("Backend ready: {} ({})", backend.name(), backend.model());

    let repo = if config.prompt.repo_context {
        repo::gather_repo_context(&std::env::current_dir()?)
    } else {
        None
    };
    if repo.is_none() {
        info!("No repository context available");
    }

    let prompt = prompt::PromptBuilder::new(extra, config.prompt.example_window).with_repo(repo);
    let executor = executor::Executor::new(
        cli.dry_run,
        cli.no_confirm,
        Duration::from_secs(config.execution.timeout_secs),
    );
    let session = session::Session::new(backend, prompt, executor);

    let mut input = std::io::stdin().lock();
    let mut out = std::io::stdout().lock();

    match query {
        Some(query) => {
            let report = session.process_query(&query, &mut input, &mut out).await?;
            info!("Execution finished: {:?}", report.disposition);
            let failed: Vec<&str> = report.failed().map(|r| r.command.as_str()).collect();
            if !failed.is_empty() {
                info!("Failed commands: {}", failed.join(", "));
                out.flush()?;
                std::process::exit(1);
            }
        }
        None => session.run_shell(&mut input, &mut out).await?,
    }

    Ok(())
}

/// Handle models subcommand (for Ollama).
async fn handle_models(action: ModelsAction, host: Option<String>) -> Result<()> {
    let config = Config::load()?;
    let host = host.unwrap_or_else(|| config.ollama_host());
    let configured = match &config.backend {
        config::BackendConfig::Ollama { model, .. } => Some(model.as_str()),
        config::BackendConfig::LlamaCpp { .. } => None,
    };

    match action {
        ModelsAction::List => models::list_models(&host, configured).await,
        ModelsAction::Pull { model } => models::pull_model(&host, &model).await,
        ModelsAction::Remove { model } => models::remove_model(&host, &model).await,
    }
}

/// Handle the config command.
fn handle_config() -> Result<()> {
    let config_path = Config::config_path()?;

    if !config_path.exists() {
        Config::default().save()?;
        println!("Created default config at {}", config_path.display());
    }

    let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
    let status = ProcessCommand::new(&editor)
        .arg(&config_path)
        .status()
        .context("Failed to open editor")?;

    if !status.success() {
        eprintln!("Editor exited with non-zero status");
    }

    Ok(())
}

/// Handle the examples command.
fn handle_examples(context: Option<&Path>) -> Result<()> {
    let config = Config::load()?;
    let extra = match context {
        Some(path) => fewshot::load_context_file(path)
            .with_context(|| format!("Invalid context file {}", path.display()))?,
        None => Vec::new(),
    };
    let extra_count = extra.len();
    let builder = prompt::PromptBuilder::new(extra, config.prompt.example_window);

    println!("Prompt Examples");
    println!("===============\n");
    println!(
        "{} built-in, {} from context file; the last {} go into the prompt.\n",
        fewshot::base_examples().len(),
        extra_count,
        config.prompt.example_window
    );

    println!("Regular:");
    for example in builder.windowed_examples() {
        print_example(example);
    }
    println!("\nAlways included:");
    for example in builder.critical_examples() {
        print_example(example);
    }

    Ok(())
}

fn print_example(example: &fewshot::Example) {
    println!("  {}", example.user);
    for line in example.bot.lines() {
        println!("    {}", line);
    }
}
