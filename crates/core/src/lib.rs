//! # Skyhook Core
//!
//! Domain types, traits, and error definitions for the Skyhook conversation
//! orchestrator. This crate has **zero framework dependencies** — it defines
//! the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the orchestration loop is defined as a trait here:
//! the generation backend ([`client::GenerateClient`]), the capability
//! modules ([`module::CapabilityModule`]), and the observability surface
//! ([`progress::ProgressSink`], [`progress::UsageRecorder`]). Implementations
//! live in their respective crates, which keeps the round loop testable with
//! scripted fakes and the dependency graph pointing inward on core.

pub mod client;
pub mod error;
pub mod module;
pub mod progress;
pub mod tier;
pub mod transcript;

// Re-export key types at crate root for ergonomics
pub use client::{GenerateClient, GenerateRequest, GenerateResponse, ModelInfo, ToolDeclaration, UsageStats};
pub use error::{ClientError, Error, Result};
pub use module::{CapabilityModule, Dispatch, ModuleRegistry, ToolCall, ToolOutput};
pub use progress::{NullRecorder, ProgressSink, UsageRecorder};
pub use tier::{ModelTier, SharedTierSelector, TierSelector};
pub use transcript::{BinaryPayload, Part, Role, Transcript, Turn};
