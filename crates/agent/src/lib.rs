//! The Skyhook orchestrator.
//!
//! Drives the multi-turn tool-calling loop against the active generation
//! client: request, execute requested tools, reframe binary results into
//! user turns, repeat until the model answers with plain text or the round
//! bound is hit.

pub mod injector;
pub mod orchestrator;
mod session;

pub use injector::{MediaPolicy, Reframed};
pub use orchestrator::{LoopState, Orchestrator, RunOutcome};
