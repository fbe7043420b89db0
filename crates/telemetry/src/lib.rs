//! Usage logging for Skyhook sessions.
//!
//! Writes a plain-text daily log of model rounds, tool actions, and errors,
//! plus full request/response dumps for API failures under `err/`. Logging
//! never interferes with the session: failures to write are reported via
//! `tracing` and otherwise swallowed.

pub mod usage_log;

pub use usage_log::UsageLog;
