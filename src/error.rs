//! Error types for the OAuth flow simulator
//!
//! This module defines all error types used throughout the simulator,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for simulator operations
///
/// Only failures that abort a simulated flow live here. Soft outcomes
/// (an absent callback receiver, an exchange timeout, a failed final
/// verification) are reported as values rather than errors.
#[derive(Error, Debug)]
pub enum SimError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Token generation or verification errors
    #[error("Token error: {0}")]
    Token(String),

    /// Dynamic client registration was rejected by the backend
    #[error("Client registration failed with HTTP {status}: {body}")]
    Registration {
        /// HTTP status code returned by the registration endpoint
        status: u16,
        /// Response body, possibly empty
        body: String,
    },

    /// Authorization server metadata discovery errors
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Callback delivery or reception errors
    #[error("Callback error: {0}")]
    Callback(String),

    /// MCP protocol-level errors (JSON-RPC error objects, malformed results)
    #[error("MCP error: {0}")]
    Mcp(String),

    /// MCP transport errors (connection failures, non-2xx responses)
    #[error("MCP transport error: {0}")]
    McpTransport(String),

    /// Backend server process errors
    #[error("Server process error: {0}")]
    Server(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

/// Result type alias for simulator operations
///
/// Uses `anyhow::Error` so callers can attach context while still being
/// able to downcast to [`SimError`].
pub type Result<T> = anyhow::Result<T>;
