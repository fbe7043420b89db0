//! GenerateClient trait — the abstraction over the generation service.
//!
//! A client knows how to send the transcript (plus tool declarations and a
//! system instruction) to one concrete model and hand back the model's turn.
//! The orchestrator drives it through `generate()` without knowing which
//! backend or tier is active — pure polymorphism.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::transcript::Turn;

/// A tool declaration sent to the service so the model knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    /// The tool name (e.g., "list_files").
    pub name: String,

    /// Description of what the tool does.
    pub description: String,

    /// JSON Schema describing the tool's parameters.
    pub parameters: serde_json::Value,
}

/// One generation round-trip's input.
///
/// Borrows the transcript: the orchestrator retains exclusive ownership and
/// the client never holds conversation state between rounds.
#[derive(Debug, Clone)]
pub struct GenerateRequest<'a> {
    /// The full ordered conversation so far.
    pub contents: &'a [Turn],

    /// Tool declarations for the active tier.
    pub tools: &'a [ToolDeclaration],

    /// Optional system instruction.
    pub system_instruction: Option<&'a str>,
}

/// Token usage reported by the service for one round. Informational only —
/// never used for control decisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    pub prompt_tokens: u32,
    pub response_tokens: u32,
    pub total_tokens: u32,
}

/// A parsed, validated generation response.
#[derive(Debug, Clone)]
pub struct GenerateResponse {
    /// The model's turn (role is always `Role::Model`).
    pub turn: Turn,

    /// Usage metadata, when the service reports it.
    pub usage: Option<UsageStats>,
}

/// A model visible on the service's listing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub display_name: String,
}

/// The core client trait. One instance is bound to one concrete model; the
/// tier selector decides which instance serves a given round.
#[async_trait]
pub trait GenerateClient: Send + Sync {
    /// The concrete model this client is bound to (e.g., "gemini-2.5-flash").
    fn model_name(&self) -> &str;

    /// Perform one generation round-trip. This is the orchestrator's single
    /// suspension point per round.
    async fn generate(
        &self,
        request: GenerateRequest<'_>,
    ) -> std::result::Result<GenerateResponse, ClientError>;

    /// List models available to this client's credentials.
    ///
    /// Default implementation returns an empty list.
    async fn list_models(&self) -> std::result::Result<Vec<ModelInfo>, ClientError> {
        Ok(Vec::new())
    }
}
