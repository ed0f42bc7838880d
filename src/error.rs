//! Error types for ChatForge
//!
//! This module defines all error types used throughout the crate,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for ChatForge operations
///
/// The variants mirror the crate's failure taxonomy: durable-store
/// failures, lookup failures, gateway configuration problems, and the
/// three adapter failure classes (transport, protocol, semantic).
#[derive(Error, Debug)]
pub enum ChatForgeError {
    /// Durable store unavailable or corrupted
    #[error("Storage error: {0}")]
    Storage(String),

    /// Referenced chat or message does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// No usable gateway endpoint configured
    #[error("Gateway is not configured: {0}")]
    NotConfigured(String),

    /// Network-level failure: no response, connection refused, timeout
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Backend responded with an unexpected or malformed shape
    #[error("Protocol failure: {0}")]
    Protocol(String),

    /// Backend returned a structured error payload
    #[error("Backend error: {0}")]
    Semantic(String),

    /// Import bundle version mismatch or malformed bundle
    #[error("Format error: {0}")]
    Format(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Message delivery-status transition rejected by the state machine
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidStatusTransition {
        /// Status the message currently has
        from: String,
        /// Status the caller tried to move to
        to: String,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Embedded database errors
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),
}

impl ChatForgeError {
    /// Whether this error is the transport failure class
    ///
    /// Transport failures are the only class the gateway retries; a
    /// timeout counts as transport, not semantic.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Result type alias for ChatForge operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation. Callers that
/// need the failure class downcast to [`ChatForgeError`].
pub type Result<T> = anyhow::Result<T>;

/// Extract the [`ChatForgeError`] class from an `anyhow` error, if any
pub fn classify(error: &anyhow::Error) -> Option<&ChatForgeError> {
    error.downcast_ref::<ChatForgeError>()
}
