//! Skyhook CLI — the main entry point.
//!
//! Commands:
//! - (default)  — Interactive chat, optionally seeded with a first message
//! - `init`     — Write a starter config file
//! - `models`   — List models available to the configured API key

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use skyhook_config::DEFAULT_CONFIG_FILE;

mod commands;
mod console;

#[derive(Parser)]
#[command(
    name = "skyhook",
    about = "Skyhook — a tool-calling Gemini agent for the terminal",
    version,
    author,
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// First input for the chat session, handled before the prompt appears.
    /// A slash command (e.g. `/load`) works here too.
    #[arg(trailing_var_arg = true)]
    prompt: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter config file
    Init,

    /// List models available to the configured API key
    Models,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Some(Commands::Init) => commands::init::run(&cli.config)?,
        Some(Commands::Models) => commands::models::run(&cli.config).await?,
        None => commands::chat::run(&cli.config, cli.prompt).await?,
    }

    Ok(())
}
