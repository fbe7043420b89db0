//! `skyhook` (default command) — the interactive chat session.
//!
//! Wires the configured Gemini clients, capability modules, and usage log
//! into an orchestrator, then reads input line by line. Lines starting with
//! `/` are session commands; everything else goes to the model.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use skyhook_agent::Orchestrator;
use skyhook_config::AppConfig;
use skyhook_core::client::GenerateClient;
use skyhook_core::module::ModuleRegistry;
use skyhook_core::progress::{ProgressSink, UsageRecorder};
use skyhook_core::tier::TierSelector;
use skyhook_providers::GeminiClient;
use skyhook_telemetry::UsageLog;
use skyhook_tools::{ControlModule, ExpertsModule, FileModule, HttpModule};

use crate::console::{self, ConsoleSink, CYAN, RESET};

/// Default path for `/save` and `/load`.
pub const DEFAULT_HISTORY_FILE: &str = "chat_history.json";

pub async fn run(
    config_path: &Path,
    prompt: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load(config_path)?;
    if let Err(e) = config.validate() {
        eprintln!();
        eprintln!("  ERROR: {e}");
        eprintln!();
        eprintln!("  Set the GEMINI_API_KEY environment variable, or run `skyhook init`");
        eprintln!("  and fill in api_key in {}.", config_path.display());
        eprintln!();
        return Err(e.into());
    }
    let api_key = config.api_key.clone().unwrap_or_default();

    let recorder: Arc<dyn UsageRecorder> = Arc::new(UsageLog::new(&config.log_dir));

    let capable: Arc<dyn GenerateClient> = Arc::new(
        GeminiClient::new(api_key.clone(), config.capable_model.clone())
            .with_recorder(recorder.clone()),
    );
    let fast: Arc<dyn GenerateClient> = Arc::new(
        GeminiClient::new(api_key, config.fast_model.clone()).with_recorder(recorder.clone()),
    );

    let selector = TierSelector::shared(fast.clone(), capable.clone());
    let sink: Arc<dyn ProgressSink> = Arc::new(ConsoleSink::new());

    // Summarized reads only pay off when the fast tier is actually cheaper.
    let mut file_module = FileModule::new(&config.workspace_dir)?;
    if config.has_distinct_fast_model() {
        file_module = file_module.with_fast_client(fast.clone());
    }

    let mut registry = ModuleRegistry::new();
    registry.register(Box::new(file_module));
    registry.register(Box::new(HttpModule::new()));
    registry.register(Box::new(ControlModule::new(selector.clone())));
    registry.register(Box::new(
        ExpertsModule::new(capable.clone()).with_sink(sink.clone()),
    ));

    let mut orchestrator = Orchestrator::new(selector, registry, sink.clone())
        .with_recorder(recorder)
        .with_system_instruction(config.system_instruction.clone())
        .with_max_iterations(config.max_iterations);

    println!("=== Skyhook ===");
    if config.has_distinct_fast_model() {
        println!("{CYAN}[Config] Capable model: {}{RESET}", config.capable_model);
        println!("{CYAN}[Config] Fast model   : {}{RESET}", config.fast_model);
    } else {
        println!("{CYAN}[Config] Model: {}{RESET}", config.capable_model);
    }
    println!("Type a message to chat, or /help for session commands.");

    // A startup argument is treated exactly like the first typed line, so
    // `skyhook /load` and `skyhook summarize notes.txt` both work.
    if !prompt.is_empty() {
        let first = prompt.join(" ");
        println!("\n{CYAN}[Startup] {first}{RESET}");
        if !step(&first, &mut orchestrator, sink.as_ref()).await {
            return Ok(());
        }
    }

    loop {
        print!("\n{CYAN}User: {RESET}");
        std::io::stdout().flush()?;

        let Some(line) = console::read_stdin_line().await else {
            break; // EOF
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if !step(input, &mut orchestrator, sink.as_ref()).await {
            break;
        }
    }

    println!("\nGoodbye.");
    Ok(())
}

/// Handle one input line. Returns `false` when the session should end.
async fn step(input: &str, orchestrator: &mut Orchestrator, sink: &dyn ProgressSink) -> bool {
    match parse_command(input) {
        Some(Ok(command)) => apply_command(command, orchestrator, sink),
        Some(Err(unknown)) => {
            sink.report_info(&format!(
                "[System] Unknown command: {unknown}. Type /help for a list of commands."
            ));
            true
        }
        None => {
            if let Err(e) = orchestrator.run(input).await {
                // Already surfaced through the sink; keep the session alive.
                tracing::debug!(error = %e, "Message processing failed");
            }
            true
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum SlashCommand {
    Save(PathBuf),
    Load(PathBuf),
    New,
    Help,
    Exit,
}

/// Recognize a session command. `None` means the line is a chat message;
/// `Some(Err(..))` is an unrecognized command name.
fn parse_command(input: &str) -> Option<Result<SlashCommand, String>> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (name, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (trimmed, ""),
    };
    let path = || {
        if rest.is_empty() {
            PathBuf::from(DEFAULT_HISTORY_FILE)
        } else {
            PathBuf::from(rest)
        }
    };

    let command = match name.to_lowercase().as_str() {
        "/save" => SlashCommand::Save(path()),
        "/load" => SlashCommand::Load(path()),
        "/new" => SlashCommand::New,
        "/help" => SlashCommand::Help,
        "/exit" | "/quit" => SlashCommand::Exit,
        other => return Some(Err(other.to_string())),
    };
    Some(Ok(command))
}

/// Execute a session command. Returns `false` when the session should end.
fn apply_command(command: SlashCommand, orchestrator: &mut Orchestrator, sink: &dyn ProgressSink) -> bool {
    match command {
        SlashCommand::Save(path) => {
            match orchestrator.save_history(&path) {
                Ok(()) => sink.report_info(&format!(
                    "[System] Conversation saved to {}.",
                    path.display()
                )),
                Err(e) => sink.report_error(&format!("Failed to save conversation: {e}")),
            }
            true
        }
        SlashCommand::Load(path) => {
            match orchestrator.load_history(&path) {
                Ok(()) => sink.report_info(&format!(
                    "[System] Loaded {} turn(s) from {}.",
                    orchestrator.transcript().len(),
                    path.display()
                )),
                Err(e) => sink.report_error(&format!("Failed to load conversation: {e}")),
            }
            true
        }
        SlashCommand::New => {
            orchestrator.new_session();
            sink.report_info("[System] Started a new conversation.");
            true
        }
        SlashCommand::Help => {
            println!("Session commands:");
            println!("  /save [path]   Save the conversation (default: {DEFAULT_HISTORY_FILE})");
            println!("  /load [path]   Load a saved conversation (default: {DEFAULT_HISTORY_FILE})");
            println!("  /new           Start a new conversation");
            println!("  /help          Show this help");
            println!("  /exit          Quit");
            true
        }
        SlashCommand::Exit => false,
    }
}
