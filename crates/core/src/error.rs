//! Error types for the Skyhook domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Skyhook operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Generation service errors ---
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    // --- Snapshot / serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- File I/O (snapshots, logs) ---
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by a generation round-trip.
///
/// All of these abort the current round: the orchestrator rolls back any
/// dangling model turn, persists a recovery snapshot, and surfaces the error
/// to the caller. None are retried automatically. Tool failures are *not*
/// represented here — a failing tool dispatch becomes an ordinary textual
/// result the model can react to.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// HTTP 429 from the generation service.
    #[error("API quota exceeded: {0}")]
    QuotaExceeded(String),

    /// HTTP 400 where the body indicates the model cannot do tool calling.
    #[error("model '{model}' does not support tool calling: {message}")]
    UnsupportedOperation { model: String, message: String },

    /// Any other non-2xx response. Status and body are retained.
    #[error("service error (status {status}): {body}")]
    Service { status: u16, body: String },

    /// The response arrived but its candidate/part structure was malformed.
    #[error("failed to parse service response: {0}")]
    ResponseParse(String),

    /// The request never produced an HTTP response (DNS, refused, timeout).
    #[error("network error: {0}")]
    Network(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_error_retains_status_and_body() {
        let err = ClientError::Service {
            status: 503,
            body: "backend unavailable".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("503"));
        assert!(msg.contains("backend unavailable"));
    }

    #[test]
    fn client_error_converts_to_top_level() {
        let err: Error = ClientError::QuotaExceeded("daily limit reached".into()).into();
        assert!(err.to_string().contains("quota"));
    }

    #[test]
    fn unsupported_operation_names_the_model() {
        let err = ClientError::UnsupportedOperation {
            model: "gemini-1.0-pro".into(),
            message: "Function calling is not enabled".into(),
        };
        assert!(err.to_string().contains("gemini-1.0-pro"));
    }
}
