//! Terminal progress reporting.
//!
//! Colored, line-oriented output for the orchestrator's progress events.
//! Tool results are clipped to one short line; the full text still reaches
//! the model and the usage log.

use std::io::Write;

use async_trait::async_trait;

use skyhook_core::progress::ProgressSink;

const YELLOW: &str = "\x1b[33m";
const GREEN: &str = "\x1b[32m";
const GRAY: &str = "\x1b[90m";
const RED: &str = "\x1b[31m";
const MAGENTA: &str = "\x1b[35m";
pub const CYAN: &str = "\x1b[36m";
pub const RESET: &str = "\x1b[0m";

pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProgressSink for ConsoleSink {
    fn report_thinking(&self, round: u32, model: &str) {
        println!("\n{YELLOW}[Thinking Round {round} ({model})] ...{RESET}");
    }

    fn report_tool_call(&self, name: &str, _arguments: &str) {
        println!("{GREEN}Action: {name}{RESET}");
    }

    fn report_tool_result(&self, summary: &str) {
        println!("{GRAY}Result: {}{RESET}", clip(summary, 100));
    }

    fn report_text(&self, text: &str, model: &str) {
        println!("\nAI ({model}): {text}");
    }

    fn report_error(&self, message: &str) {
        println!("\n{RED}Error: {message}{RESET}");
    }

    fn report_info(&self, message: &str) {
        println!("{MAGENTA}{message}{RESET}");
    }

    async fn prompt_continue(&self, message: &str) -> bool {
        print!("\n{YELLOW}[PROMPT] {message} (Y/N): {RESET}");
        let _ = std::io::stdout().flush();

        match read_stdin_line().await {
            Some(line) => {
                let answer = line.trim().to_lowercase();
                answer == "y" || answer == "yes"
            }
            None => false,
        }
    }
}

/// Read one line from stdin without tying the terminal to an async reader.
/// A background buffer over stdin would swallow input typed for the next
/// prompt, so this blocks a dedicated thread instead.
pub async fn read_stdin_line() -> Option<String> {
    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        match std::io::stdin().read_line(&mut line) {
            Ok(0) => None, // EOF
            Ok(_) => Some(line),
            Err(_) => None,
        }
    })
    .await
    .ok()
    .flatten()
}

fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let clipped: String = text.chars().take(max_chars).collect();
        format!("{clipped}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_keeps_short_text() {
        assert_eq!(clip("short", 100), "short");
    }

    #[test]
    fn clip_truncates_long_text() {
        let long = "x".repeat(150);
        let clipped = clip(&long, 100);
        assert_eq!(clipped.len(), 103);
        assert!(clipped.ends_with("..."));
    }

    #[test]
    fn clip_respects_char_boundaries() {
        let text = "日本語のテキスト";
        assert_eq!(clip(text, 3), "日本語...");
    }
}
