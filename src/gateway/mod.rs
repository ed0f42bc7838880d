//! Completion gateway
//!
//! Sits between the conversation store and the backend adapters: loads
//! the configuration snapshot, shapes recent chat history into the
//! canonical completion request, picks an adapter for the endpoint, and
//! invokes it under a bounded retry policy. Only transport failures are
//! retried; protocol and semantic failures propagate on first sight.

use crate::adapters::{build_adapter, transcript_lines, CompletionRequest, Turn};
use crate::error::{classify, ChatForgeError, Result};
use crate::settings::{GatewayConfig, SettingsStore};
use crate::store::{ConversationStore, Message, MessageKind};

/// Number of recent messages supplied as context
pub const CONTEXT_WINDOW: usize = 10;

/// Canned probe message for connection tests
pub const PROBE_MESSAGE: &str = "Hello, this is a test message.";

/// Placeholder returned when summarization fails
pub const SUMMARY_FALLBACK: &str = "Summary unavailable.";

/// Instruction wrapped around a transcript for summarization
const SUMMARY_INSTRUCTION: &str =
    "Summarize the following conversation in two or three sentences:";

/// Completion attempts per call, transport failures only
const MAX_ATTEMPTS: u32 = 2;

/// Outcome of a connection probe
///
/// Carries either the backend's reply or the rendered failure; the
/// probe itself never errors and never persists anything.
#[derive(Debug)]
pub struct ConnectionReport {
    /// Whether the probe round-tripped
    pub ok: bool,
    /// The backend's reply when it did
    pub response: Option<String>,
    /// The rendered failure when it did not
    pub error: Option<String>,
}

/// Gateway from stored conversations to AI backend completions
///
/// Cheap to clone; clones share the underlying stores. The
/// configuration is re-read at the start of every call, so a concurrent
/// settings change never affects an in-flight completion.
#[derive(Clone)]
pub struct CompletionGateway {
    store: ConversationStore,
    settings: SettingsStore,
}

impl CompletionGateway {
    /// Create a gateway over the given stores
    pub fn new(store: ConversationStore, settings: SettingsStore) -> Self {
        Self { store, settings }
    }

    /// Generate a reply to a user message in the context of a chat
    ///
    /// The most recent persisted messages form the context window; the
    /// message being answered travels separately and is excluded from
    /// the window if it was already persisted. System notices carry no
    /// conversational content and are skipped.
    ///
    /// # Errors
    ///
    /// Returns `NotConfigured` if no endpoint is set, or the adapter's
    /// failure with its class intact.
    pub async fn generate_reply(&self, chat_id: &str, user_message: &str) -> Result<String> {
        let config = self.configured()?;
        let history = self.context_window(chat_id, user_message)?;
        self.complete(&config, history, user_message.to_string())
            .await
    }

    /// Probe the configured backend with a canned message
    ///
    /// Never persists anything and never errors; the outcome is
    /// reported either way.
    pub async fn test_connection(&self) -> ConnectionReport {
        let result = match self.configured() {
            Ok(config) => {
                self.complete(&config, Vec::new(), PROBE_MESSAGE.to_string())
                    .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(response) => ConnectionReport {
                ok: true,
                response: Some(response),
                error: None,
            },
            Err(e) => {
                tracing::warn!("Connection test failed: {:#}", e);
                ConnectionReport {
                    ok: false,
                    response: None,
                    error: Some(format!("{:#}", e)),
                }
            }
        }
    }

    /// Summarize a message list through the backend
    ///
    /// Summarization is advisory, so any failure collapses to the fixed
    /// placeholder instead of propagating.
    pub async fn summarize(&self, messages: &[Message]) -> String {
        let transcript = transcript_lines(&to_turns(messages));
        let prompt = format!("{}\n\n{}", SUMMARY_INSTRUCTION, transcript);

        let result = match self.configured() {
            Ok(config) => self.complete(&config, Vec::new(), prompt).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!("Summarization failed, using placeholder: {:#}", e);
                SUMMARY_FALLBACK.to_string()
            }
        }
    }

    /// Load the configuration snapshot, requiring an endpoint
    fn configured(&self) -> Result<GatewayConfig> {
        let config = self.settings.load()?;
        if !config.is_configured() {
            return Err(ChatForgeError::NotConfigured(
                "no backend endpoint is set".to_string(),
            )
            .into());
        }
        Ok(config)
    }

    /// Build the context window for a chat
    ///
    /// Takes the last [`CONTEXT_WINDOW`] non-system messages. If the
    /// newest of them is the user turn being answered (persisted before
    /// generation), it is dropped from the window.
    fn context_window(&self, chat_id: &str, user_message: &str) -> Result<Vec<Turn>> {
        let mut messages: Vec<Message> = self
            .store
            .list_messages(chat_id)?
            .into_iter()
            .filter(|m| m.kind != MessageKind::System)
            .collect();

        if let Some(last) = messages.last() {
            if !last.is_from_ai() && last.body == user_message {
                messages.pop();
            }
        }

        let start = messages.len().saturating_sub(CONTEXT_WINDOW);
        Ok(to_turns(&messages[start..]))
    }

    /// Run one completion under the retry policy
    async fn complete(
        &self,
        config: &GatewayConfig,
        history: Vec<Turn>,
        user_message: String,
    ) -> Result<String> {
        let adapter = build_adapter(config)?;
        let request = CompletionRequest {
            system_prompt: config.system_prompt.clone(),
            history,
            user_message,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        };

        let mut attempt = 1;
        loop {
            tracing::debug!(
                "Completion attempt {}/{} via {} adapter",
                attempt,
                MAX_ATTEMPTS,
                adapter.name()
            );
            match adapter.complete(&request).await {
                Ok(reply) => return Ok(reply),
                Err(e) => {
                    let transient = classify(&e).map(|c| c.is_transport()).unwrap_or(false);
                    if transient && attempt < MAX_ATTEMPTS {
                        tracing::warn!("Transport failure, retrying: {:#}", e);
                        attempt += 1;
                        continue;
                    }
                    return Err(e);
                }
            }
        }
    }
}

/// Map stored messages to completion turns
///
/// The AI sender maps to the assistant role; every other participant
/// maps to the user role.
fn to_turns(messages: &[Message]) -> Vec<Turn> {
    messages
        .iter()
        .map(|m| {
            if m.is_from_ai() {
                Turn::assistant(m.body.clone())
            } else {
                Turn::user(m.body.clone())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::GatewayConfigPatch;
    use crate::store::{ChatDraft, MessageDraft};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_gateway() -> (CompletionGateway, ConversationStore, SettingsStore, tempfile::TempDir) {
        let (store, dir) = crate::store::tests::create_test_store();
        let db = crate::store::open_db_at(dir.path().join("settings.db")).expect("open db");
        let settings = SettingsStore::new(db);
        let gateway = CompletionGateway::new(store.clone(), settings.clone());
        (gateway, store, settings, dir)
    }

    fn point_at(settings: &SettingsStore, endpoint: &str) {
        settings
            .save(GatewayConfigPatch {
                endpoint: Some(endpoint.to_string()),
                ..Default::default()
            })
            .expect("save settings");
    }

    async fn chat_backend(reply: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": reply}}]
            })))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_generate_reply_requires_configuration() {
        let (gateway, store, _settings, _dir) = create_test_gateway();
        let chat = store.create_chat(ChatDraft::default()).expect("create");

        let err = gateway.generate_reply(&chat.id, "Hi").await.unwrap_err();
        assert!(matches!(
            classify(&err),
            Some(ChatForgeError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn test_generate_reply_round_trip() {
        let (gateway, store, settings, _dir) = create_test_gateway();
        let server = chat_backend("Hello back").await;
        point_at(&settings, &server.uri());

        let chat = store.create_chat(ChatDraft::default()).expect("create");
        store
            .append_message(&chat.id, MessageDraft::from_user("Hi"))
            .expect("append");

        let reply = gateway.generate_reply(&chat.id, "Hi").await.expect("reply");
        assert_eq!(reply, "Hello back");
    }

    #[tokio::test]
    async fn test_context_window_excludes_answered_turn_and_system_notices() {
        let (gateway, store, settings, _dir) = create_test_gateway();
        let server = chat_backend("ok").await;
        point_at(&settings, &server.uri());

        let chat = store.create_chat(ChatDraft::default()).expect("create");
        store
            .append_message(&chat.id, MessageDraft::from_user("earlier question"))
            .expect("append");
        store
            .append_message(&chat.id, MessageDraft::from_ai("earlier answer"))
            .expect("append");
        store
            .append_message(&chat.id, MessageDraft::system_notice("Chat exported"))
            .expect("append");
        store
            .append_message(&chat.id, MessageDraft::from_user("new question"))
            .expect("append");

        gateway
            .generate_reply(&chat.id, "new question")
            .await
            .expect("reply");

        let requests = server.received_requests().await.expect("requests");
        let body: serde_json::Value =
            serde_json::from_slice(&requests[0].body).expect("request body");
        let contents: Vec<&str> = body["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["content"].as_str().unwrap())
            .collect();
        // System prompt, the two real history turns, then the new turn once
        assert_eq!(
            contents,
            vec![
                "You are a helpful assistant.",
                "earlier question",
                "earlier answer",
                "new question"
            ]
        );
        assert_eq!(body["messages"][2]["role"], "assistant");
    }

    #[tokio::test]
    async fn test_context_window_is_bounded() {
        let (gateway, store, settings, _dir) = create_test_gateway();
        let server = chat_backend("ok").await;
        point_at(&settings, &server.uri());

        let chat = store.create_chat(ChatDraft::default()).expect("create");
        for i in 0..15 {
            store
                .append_message(&chat.id, MessageDraft::from_user(format!("message {}", i)))
                .expect("append");
        }

        gateway
            .generate_reply(&chat.id, "the new one")
            .await
            .expect("reply");

        let requests = server.received_requests().await.expect("requests");
        let body: serde_json::Value =
            serde_json::from_slice(&requests[0].body).expect("request body");
        let messages = body["messages"].as_array().unwrap();
        // system + 10 history turns + the new user turn
        assert_eq!(messages.len(), 12);
        assert_eq!(messages[1]["content"], "message 5");
    }

    #[tokio::test]
    async fn test_semantic_failure_is_not_retried() {
        let (gateway, store, settings, _dir) = create_test_gateway();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;
        point_at(&settings, &server.uri());

        let chat = store.create_chat(ChatDraft::default()).expect("create");
        let err = gateway.generate_reply(&chat.id, "Hi").await.unwrap_err();
        assert!(matches!(classify(&err), Some(ChatForgeError::Semantic(_))));
        server.verify().await;
    }

    #[tokio::test]
    async fn test_transport_failure_propagates_after_retries() {
        let (gateway, store, settings, _dir) = create_test_gateway();
        point_at(&settings, "http://127.0.0.1:1");

        let chat = store.create_chat(ChatDraft::default()).expect("create");
        let err = gateway.generate_reply(&chat.id, "Hi").await.unwrap_err();
        assert!(matches!(
            classify(&err),
            Some(ChatForgeError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_connection_probe_success() {
        let (gateway, store, settings, _dir) = create_test_gateway();
        let server = chat_backend("Probe acknowledged").await;
        point_at(&settings, &server.uri());

        let report = gateway.test_connection().await;
        assert!(report.ok);
        assert_eq!(report.response.as_deref(), Some("Probe acknowledged"));
        assert!(report.error.is_none());

        // Probing must not create any records
        assert!(store.list_chats().expect("list").is_empty());
    }

    #[tokio::test]
    async fn test_connection_probe_failure_is_reported_not_raised() {
        let (gateway, _store, settings, _dir) = create_test_gateway();
        point_at(&settings, "http://127.0.0.1:1");

        let report = gateway.test_connection().await;
        assert!(!report.ok);
        assert!(report.response.is_none());
        assert!(report.error.is_some());
    }

    #[tokio::test]
    async fn test_connection_probe_unconfigured() {
        let (gateway, _store, _settings, _dir) = create_test_gateway();
        let report = gateway.test_connection().await;
        assert!(!report.ok);
        assert!(report.error.is_some());
    }

    #[tokio::test]
    async fn test_summarize_returns_backend_text() {
        let (gateway, store, settings, _dir) = create_test_gateway();
        let server = chat_backend("They greeted each other.").await;
        point_at(&settings, &server.uri());

        let chat = store.create_chat(ChatDraft::default()).expect("create");
        store
            .append_message(&chat.id, MessageDraft::from_user("Hi"))
            .expect("append");
        store
            .append_message(&chat.id, MessageDraft::from_ai("Hello"))
            .expect("append");

        let messages = store.list_messages(&chat.id).expect("list");
        let summary = gateway.summarize(&messages).await;
        assert_eq!(summary, "They greeted each other.");

        let requests = server.received_requests().await.expect("requests");
        let body: serde_json::Value =
            serde_json::from_slice(&requests[0].body).expect("request body");
        let prompt = body["messages"]
            .as_array()
            .unwrap()
            .last()
            .unwrap()["content"]
            .as_str()
            .unwrap();
        assert!(prompt.contains("Summarize the following conversation"));
        assert!(prompt.contains("User: Hi\nAssistant: Hello\n"));
    }

    #[tokio::test]
    async fn test_summarize_failure_collapses_to_placeholder() {
        let (gateway, _store, settings, _dir) = create_test_gateway();
        point_at(&settings, "http://127.0.0.1:1");

        let summary = gateway.summarize(&[]).await;
        assert_eq!(summary, SUMMARY_FALLBACK);
    }
}
