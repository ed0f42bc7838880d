//! Backend adapter set for ChatForge
//!
//! One adapter per supported AI backend family, plus the ordered rule
//! table that picks an adapter from the configured endpoint URL. The
//! rules are a closed, ordered set: first match wins, and no match
//! falls back to the chat-completions style.

pub mod base;
pub mod chat_completions;
pub mod conversational;
pub mod prompt_completion;

pub use base::{transcript_lines, BackendAdapter, CompletionRequest, Role, Turn};
pub use chat_completions::ChatCompletionsAdapter;
pub use conversational::ConversationalAdapter;
pub use prompt_completion::PromptCompletionAdapter;

use crate::error::Result;
use crate::settings::GatewayConfig;

/// Backend family an endpoint resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    /// OpenAI-compatible `/chat/completions` backends (default)
    ChatCompletions,
    /// Ollama-style `/api/generate` backends
    PromptCompletion,
    /// Web-UI-hosted conversational backends
    ConversationalTurn,
}

/// One entry of the endpoint selection table
pub struct SelectionRule {
    /// Rule name for logs and diagnostics
    pub name: &'static str,
    /// Predicate over the lowercased endpoint URL
    pub matches: fn(&str) -> bool,
    /// Adapter family selected when the predicate holds
    pub kind: AdapterKind,
}

fn is_ollama_host(url: &str) -> bool {
    url.contains("ollama") || url.contains("11434")
}

fn is_webui_host(url: &str) -> bool {
    url.contains("text-generation") || url.contains(":5000") || url.contains(":7860")
}

/// The ordered endpoint selection rules
///
/// Evaluated top to bottom against the lowercased endpoint; the first
/// matching rule wins.
pub const SELECTION_RULES: &[SelectionRule] = &[
    SelectionRule {
        name: "ollama-host",
        matches: is_ollama_host,
        kind: AdapterKind::PromptCompletion,
    },
    SelectionRule {
        name: "webui-host",
        matches: is_webui_host,
        kind: AdapterKind::ConversationalTurn,
    },
];

/// Pick the adapter family for an endpoint URL
pub fn select_kind(endpoint: &str) -> AdapterKind {
    let url = endpoint.to_lowercase();
    for rule in SELECTION_RULES {
        if (rule.matches)(&url) {
            tracing::debug!("Endpoint matched selection rule {:?}", rule.name);
            return rule.kind;
        }
    }
    AdapterKind::ChatCompletions
}

/// Build the adapter for a configuration snapshot
///
/// # Errors
///
/// Returns error if HTTP client initialization fails
pub fn build_adapter(config: &GatewayConfig) -> Result<Box<dyn BackendAdapter>> {
    let adapter: Box<dyn BackendAdapter> = match select_kind(&config.endpoint) {
        AdapterKind::ChatCompletions => Box::new(ChatCompletionsAdapter::new(
            config.endpoint.clone(),
            config.api_key.clone(),
        )?),
        AdapterKind::PromptCompletion => {
            Box::new(PromptCompletionAdapter::new(config.endpoint.clone())?)
        }
        AdapterKind::ConversationalTurn => {
            Box::new(ConversationalAdapter::new(config.endpoint.clone())?)
        }
    };
    tracing::debug!(
        "Selected {} adapter for endpoint {}",
        adapter.name(),
        config.endpoint
    );
    Ok(adapter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_generate_url_selects_prompt_completion() {
        assert_eq!(
            select_kind("http://localhost:11434/api/generate"),
            AdapterKind::PromptCompletion
        );
    }

    #[test]
    fn test_ollama_hostname_selects_prompt_completion() {
        assert_eq!(
            select_kind("https://ollama.internal.example.com"),
            AdapterKind::PromptCompletion
        );
    }

    #[test]
    fn test_webui_port_selects_conversational() {
        assert_eq!(
            select_kind("http://localhost:5000"),
            AdapterKind::ConversationalTurn
        );
        assert_eq!(
            select_kind("http://localhost:7860/api/v1/chat"),
            AdapterKind::ConversationalTurn
        );
        assert_eq!(
            select_kind("http://text-generation.local"),
            AdapterKind::ConversationalTurn
        );
    }

    #[test]
    fn test_openai_url_selects_chat_completions() {
        assert_eq!(
            select_kind("https://api.openai.com/v1"),
            AdapterKind::ChatCompletions
        );
    }

    #[test]
    fn test_unrecognized_url_defaults_to_chat_completions() {
        assert_eq!(
            select_kind("https://my-weird-backend.example.com"),
            AdapterKind::ChatCompletions
        );
        assert_eq!(select_kind(""), AdapterKind::ChatCompletions);
    }

    #[test]
    fn test_selection_is_case_insensitive() {
        assert_eq!(
            select_kind("http://OLLAMA.example.com"),
            AdapterKind::PromptCompletion
        );
    }

    #[test]
    fn test_first_match_wins() {
        // Matches both rules; ollama is listed first
        assert_eq!(
            select_kind("http://ollama.example.com:5000"),
            AdapterKind::PromptCompletion
        );
    }

    #[test]
    fn test_rule_table_is_enumerable() {
        let names: Vec<&str> = SELECTION_RULES.iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["ollama-host", "webui-host"]);
    }

    #[test]
    fn test_build_adapter_matches_selection() {
        let mut config = GatewayConfig {
            endpoint: "http://localhost:11434".to_string(),
            ..Default::default()
        };
        let adapter = build_adapter(&config).expect("build");
        assert_eq!(adapter.name(), "prompt-completion");

        config.endpoint = "https://api.openai.com/v1".to_string();
        let adapter = build_adapter(&config).expect("build");
        assert_eq!(adapter.name(), "chat-completions");

        config.endpoint = "http://localhost:5000".to_string();
        let adapter = build_adapter(&config).expect("build");
        assert_eq!(adapter.name(), "conversational");
    }

    #[test]
    fn test_adapter_timeouts_reflect_backend_speed() {
        use std::time::Duration;
        let chat = ChatCompletionsAdapter::new("http://x", None).unwrap();
        let prompt = PromptCompletionAdapter::new("http://x").unwrap();
        let conv = ConversationalAdapter::new("http://x").unwrap();
        assert_eq!(chat.timeout(), Duration::from_secs(30));
        assert_eq!(prompt.timeout(), Duration::from_secs(60));
        assert_eq!(conv.timeout(), Duration::from_secs(45));
    }
}
