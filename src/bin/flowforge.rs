use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use serde_json::Value;

use flowforge::utils::LoggingConfig;
use flowforge::{
    Dispatcher, DynLlmClient, ForgeConfig, LocalEchoClient, RunRequest, StaticClient,
    ValidationChain,
};

#[derive(Parser)]
#[command(name = "flowforge", version, about = "Workflow generation runtime", author)]
struct Cli {
    /// JSON configuration file; FLOWFORGE_* variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a workflow document and print the result.
    Validate {
        file: PathBuf,
        #[arg(long)]
        strict: bool,
    },
    /// Execute a run request and stream its events as JSON lines.
    Run {
        request: PathBuf,
        /// Canned generation response used instead of the echo client.
        #[arg(long)]
        response: Option<PathBuf>,
    },
    /// Print the iteration history recorded during a run request.
    History {
        request: PathBuf,
        artifact_id: String,
        #[arg(long)]
        response: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    LoggingConfig::init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Validate { file, strict } => handle_validate(config, &file, strict)?,
        Command::Run { request, response } => {
            let dispatcher = dispatcher(config, response.as_deref())?;
            handle_run(&dispatcher, &request).await?;
        }
        Command::History {
            request,
            artifact_id,
            response,
        } => {
            let dispatcher = dispatcher(config, response.as_deref())?;
            handle_run(&dispatcher, &request).await?;
            let history = dispatcher.history(&artifact_id).await?;
            println!("{}", serde_json::to_string_pretty(&history)?);
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ForgeConfig> {
    let config = match path {
        Some(path) => ForgeConfig::from_file(path)?,
        None => ForgeConfig::default(),
    };
    Ok(config.with_env_overrides()?)
}

fn dispatcher(config: ForgeConfig, response: Option<&Path>) -> anyhow::Result<Dispatcher> {
    let llm: DynLlmClient = match response {
        Some(path) => {
            let canned = fs::read_to_string(path)
                .with_context(|| format!("failed to read response file {}", path.display()))?;
            Arc::new(StaticClient::new(canned))
        }
        None => Arc::new(LocalEchoClient),
    };
    Ok(Dispatcher::with_defaults(llm, config))
}

fn handle_validate(mut config: ForgeConfig, file: &Path, strict: bool) -> anyhow::Result<()> {
    let raw = fs::read_to_string(file)
        .with_context(|| format!("failed to read workflow {}", file.display()))?;
    let document: Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", file.display()))?;
    config.validation.strict |= strict;

    let result = ValidationChain::new(&config.validation).validate(&document);
    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.is_valid {
        std::process::exit(1);
    }
    Ok(())
}

async fn handle_run(dispatcher: &Dispatcher, request: &Path) -> anyhow::Result<()> {
    let raw = fs::read_to_string(request)
        .with_context(|| format!("failed to read request {}", request.display()))?;
    let request: RunRequest = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a run request", request.display()))?;

    let mut events = dispatcher.run(request);
    while let Some(event) = events.next().await {
        println!("{}", event.to_json_line()?);
    }
    Ok(())
}
