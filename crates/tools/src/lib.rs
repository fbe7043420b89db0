//! Built-in capability modules for Skyhook.
//!
//! Each module implements [`skyhook_core::CapabilityModule`]: it declares a
//! set of tools and executes the ones it owns. Failures inside a module are
//! reported as ordinary text results so the conversation keeps going; only
//! the orchestrator decides what is fatal.

pub mod control;
pub mod experts;
pub mod file;
pub mod http;

pub use control::ControlModule;
pub use experts::ExpertsModule;
pub use file::FileModule;
pub use http::HttpModule;
