//! Backend adapter trait and canonical completion types
//!
//! An adapter translates one canonical completion request into a
//! specific backend family's wire protocol and the response back into
//! plain reply text. Adapters differ only in wire shaping; failure
//! classification (transport / protocol / semantic) is shared.

use crate::error::{ChatForgeError, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Role of a conversation turn supplied as context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// A turn authored by the user (or any non-AI participant)
    User,
    /// A turn authored by the AI backend
    Assistant,
}

impl Role {
    /// Wire label for chat-completions style requests
    pub fn wire_label(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Display label used in flattened transcripts
    pub fn transcript_label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

/// One turn of conversation context
#[derive(Debug, Clone)]
pub struct Turn {
    /// Who authored the turn
    pub role: Role,
    /// The turn's text
    pub content: String,
}

impl Turn {
    /// A user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// An assistant turn
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Canonical completion request handed to an adapter
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System prompt; may be empty
    pub system_prompt: String,
    /// Recent conversation history, oldest first
    pub history: Vec<Turn>,
    /// The user message to answer
    pub user_message: String,
    /// Model identifier
    pub model: String,
    /// Maximum output tokens
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

/// Translation layer from a canonical request to one backend family
///
/// Implementations must distinguish the three failure classes:
/// [`ChatForgeError::Transport`] when no response arrives,
/// [`ChatForgeError::Protocol`] when the response shape is unexpected,
/// and [`ChatForgeError::Semantic`] when the backend reports an error.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Short adapter name for logs
    fn name(&self) -> &'static str;

    /// Per-call timeout; expiry is a transport failure
    fn timeout(&self) -> Duration;

    /// Generate a reply for the request; returns the trimmed reply text
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Flatten history turns into `"Role: text\n"` lines
pub fn transcript_lines(history: &[Turn]) -> String {
    let mut out = String::new();
    for turn in history {
        out.push_str(turn.role.transcript_label());
        out.push_str(": ");
        out.push_str(&turn.content);
        out.push('\n');
    }
    out
}

/// Join a configured endpoint with a well-known path suffix
///
/// The suffix is appended unless the endpoint already ends with it, so
/// both `http://host:1234` and `http://host:1234/v1/chat/completions`
/// style configurations work.
pub(crate) fn join_endpoint(endpoint: &str, suffix: &str) -> String {
    let base = endpoint.trim_end_matches('/');
    if base.ends_with(suffix) {
        base.to_string()
    } else {
        format!("{}{}", base, suffix)
    }
}

/// Build the shared HTTP client for an adapter
pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("chatforge/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| {
            ChatForgeError::Transport(format!("Failed to create HTTP client: {}", e)).into()
        })
}

/// Map a reqwest send error to the transport failure class
pub(crate) fn transport_error(adapter: &str, e: reqwest::Error) -> ChatForgeError {
    if e.is_timeout() {
        ChatForgeError::Transport(format!("{} request timed out: {}", adapter, e))
    } else {
        ChatForgeError::Transport(format!("{} request failed: {}", adapter, e))
    }
}

/// Map a response decode error to the protocol failure class
pub(crate) fn protocol_error(adapter: &str, e: impl std::fmt::Display) -> ChatForgeError {
    ChatForgeError::Protocol(format!("{} returned an unexpected response: {}", adapter, e))
}

/// Turn a non-success HTTP response into a semantic failure
pub(crate) async fn semantic_error(adapter: &str, response: reqwest::Response) -> ChatForgeError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    tracing::error!("{} returned error {}: {}", adapter, status, body);
    ChatForgeError::Semantic(format!("{} returned {}: {}", adapter, status, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_labels() {
        assert_eq!(Role::User.wire_label(), "user");
        assert_eq!(Role::Assistant.wire_label(), "assistant");
        assert_eq!(Role::User.transcript_label(), "User");
        assert_eq!(Role::Assistant.transcript_label(), "Assistant");
    }

    #[test]
    fn test_turn_constructors() {
        let turn = Turn::user("hello");
        assert_eq!(turn.role, Role::User);
        assert_eq!(turn.content, "hello");
        let turn = Turn::assistant("hi");
        assert_eq!(turn.role, Role::Assistant);
    }

    #[test]
    fn test_transcript_lines_format() {
        let history = vec![Turn::user("How are you?"), Turn::assistant("Fine, thanks.")];
        assert_eq!(
            transcript_lines(&history),
            "User: How are you?\nAssistant: Fine, thanks.\n"
        );
    }

    #[test]
    fn test_transcript_lines_empty_history() {
        assert_eq!(transcript_lines(&[]), "");
    }

    #[test]
    fn test_join_endpoint_appends_suffix() {
        assert_eq!(
            join_endpoint("http://localhost:11434", "/api/generate"),
            "http://localhost:11434/api/generate"
        );
        assert_eq!(
            join_endpoint("http://localhost:11434/", "/api/generate"),
            "http://localhost:11434/api/generate"
        );
    }

    #[test]
    fn test_join_endpoint_keeps_existing_suffix() {
        assert_eq!(
            join_endpoint("http://localhost:11434/api/generate", "/api/generate"),
            "http://localhost:11434/api/generate"
        );
        assert_eq!(
            join_endpoint("http://localhost:11434/api/generate/", "/api/generate"),
            "http://localhost:11434/api/generate"
        );
    }

    #[test]
    fn test_build_client_succeeds() {
        assert!(build_client(Duration::from_secs(5)).is_ok());
    }
}
