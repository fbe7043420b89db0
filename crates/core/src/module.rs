//! CapabilityModule trait — pluggable tool providers.
//!
//! Each module declares a set of tools for the active tier and can execute
//! the ones it owns. The orchestrator concatenates declarations from all
//! registered modules in registration order, and dispatches a call to the
//! first module that claims it. Registration order is an observable
//! contract, not an implementation detail.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::ToolDeclaration;
use crate::tier::ModelTier;
use crate::transcript::BinaryPayload;

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool to invoke.
    pub name: String,

    /// Arguments as a JSON object.
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// What a tool produced.
///
/// Failures inside a tool are not errors at this level: a module catches its
/// own problems and describes them in `text` so the conversation can
/// continue with the model seeing ordinary tool output.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    /// Human/model-readable result text.
    pub text: String,

    /// Optional binary content (e.g., an image the tool read). Relocated to
    /// a user turn by the multimodal injector before anything is appended.
    pub binary: Option<BinaryPayload>,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            binary: None,
        }
    }

    pub fn with_binary(text: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            text: text.into(),
            binary: Some(BinaryPayload::new(mime_type, bytes)),
        }
    }
}

/// Outcome of offering a call to one module.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// The module owned the tool and produced a result.
    Handled(ToolOutput),
    /// Not this module's tool; try the next one.
    NotHandled,
}

/// A pluggable unit declaring and executing a named set of tools.
///
/// Modules are stateless with respect to the transcript. Any module-local
/// session state must be keyed by a caller-supplied identifier so repeated
/// calls cannot leak state across logical sessions.
#[async_trait]
pub trait CapabilityModule: Send + Sync {
    /// The tool declarations this module offers for the given tier.
    fn declare_tools(&self, tier: ModelTier) -> Vec<ToolDeclaration>;

    /// Try to execute a call. Returns [`Dispatch::NotHandled`] when the name
    /// is not one of this module's tools.
    async fn dispatch(&self, call: &ToolCall) -> Dispatch;
}

/// An ordered collection of capability modules.
pub struct ModuleRegistry {
    modules: Vec<Box<dyn CapabilityModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
        }
    }

    /// Register a module. Order of registration is preserved for both
    /// declaration listing and dispatch resolution.
    pub fn register(&mut self, module: Box<dyn CapabilityModule>) {
        self.modules.push(module);
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Concatenated declarations from all modules, in registration order.
    pub fn declarations(&self, tier: ModelTier) -> Vec<ToolDeclaration> {
        self.modules
            .iter()
            .flat_map(|m| m.declare_tools(tier))
            .collect()
    }

    /// Execute a call against the first module that claims it.
    ///
    /// An unmatched name yields a benign "unknown tool" result rather than an
    /// error, so the conversation can continue.
    pub async fn dispatch(&self, call: &ToolCall) -> ToolOutput {
        for module in &self.modules {
            if let Dispatch::Handled(output) = module.dispatch(call).await {
                return output;
            }
        }
        tracing::warn!(tool = %call.name, "No module claimed tool call");
        ToolOutput::text(format!("Error: unknown tool '{}'.", call.name))
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
