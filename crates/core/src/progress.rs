//! Progress and usage reporting — the injected observability surface.
//!
//! The orchestrator never talks to a console or a log file directly; it
//! emits progress events to a [`ProgressSink`] and per-round usage to a
//! [`UsageRecorder`], both handed in at construction. This keeps the round
//! loop testable without real I/O.

use async_trait::async_trait;

use crate::client::UsageStats;

/// Visual/progress feedback for a running conversation.
///
/// Implemented by the console frontend; tests supply scripted fakes.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// A round is starting against the given model.
    fn report_thinking(&self, round: u32, model: &str);

    /// The model requested a tool invocation.
    fn report_tool_call(&self, name: &str, arguments: &str);

    /// A tool produced a result (display summary, never raw binary).
    fn report_tool_result(&self, summary: &str);

    /// The model produced response text.
    fn report_text(&self, text: &str, model: &str);

    fn report_error(&self, message: &str);

    fn report_info(&self, message: &str);

    /// Ask the user whether to keep going past the iteration bound.
    /// Suspends until answered.
    async fn prompt_continue(&self, message: &str) -> bool;
}

/// Observability collaborator for API usage and tool actions.
pub trait UsageRecorder: Send + Sync {
    /// One generation round finished.
    fn record_round(&self, model: &str, elapsed_ms: u64, usage: &UsageStats);

    /// A tool was dispatched; `summary` is a truncated result preview.
    fn record_action(&self, tool: &str, summary: &str);

    /// Something went wrong worth keeping in the log.
    fn record_error(&self, message: &str);

    /// A service call failed; request and response bodies are kept for
    /// post-mortem inspection.
    fn record_api_error(&self, message: &str, request_body: &str, response_body: &str);
}

/// A recorder that drops everything. Useful as a default and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRecorder;

impl UsageRecorder for NullRecorder {
    fn record_round(&self, _model: &str, _elapsed_ms: u64, _usage: &UsageStats) {}
    fn record_action(&self, _tool: &str, _summary: &str) {}
    fn record_error(&self, _message: &str) {}
    fn record_api_error(&self, _message: &str, _request_body: &str, _response_body: &str) {}
}
