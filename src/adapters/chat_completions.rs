//! Chat-completions style adapter
//!
//! Speaks the OpenAI-compatible `/chat/completions` wire format, which
//! also covers credential-less self-hosted servers exposing the same
//! API. The reply is the first choice's message content, trimmed.

use crate::adapters::base::{
    build_client, join_endpoint, protocol_error, semantic_error, transport_error, BackendAdapter,
    CompletionRequest,
};
use crate::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-call timeout for hosted chat-completions backends
const TIMEOUT: Duration = Duration::from_secs(30);

/// Path suffix of the completions endpoint
const COMPLETIONS_SUFFIX: &str = "/chat/completions";

/// Request body for the chat-completions API
#[derive(Debug, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    temperature: f32,
}

/// Message structure shared by request and response
#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default)]
    content: String,
}

/// Response body from the chat-completions API
#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    choices: Vec<Choice>,
}

/// One completion choice
#[derive(Debug, Deserialize)]
struct Choice {
    message: WireMessage,
}

/// Adapter for OpenAI-compatible chat-completions backends
pub struct ChatCompletionsAdapter {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl ChatCompletionsAdapter {
    /// Create an adapter for the given endpoint and optional credential
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            client: build_client(TIMEOUT)?,
            endpoint: endpoint.into(),
            api_key,
        })
    }

    /// Shape the canonical request into the wire message list
    fn wire_messages(request: &CompletionRequest) -> Vec<WireMessage> {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        if !request.system_prompt.is_empty() {
            messages.push(WireMessage {
                role: "system".to_string(),
                content: request.system_prompt.clone(),
            });
        }
        for turn in &request.history {
            messages.push(WireMessage {
                role: turn.role.wire_label().to_string(),
                content: turn.content.clone(),
            });
        }
        messages.push(WireMessage {
            role: "user".to_string(),
            content: request.user_message.clone(),
        });
        messages
    }
}

#[async_trait]
impl BackendAdapter for ChatCompletionsAdapter {
    fn name(&self) -> &'static str {
        "chat-completions"
    }

    fn timeout(&self) -> Duration {
        TIMEOUT
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = ChatCompletionsRequest {
            model: request.model.clone(),
            messages: Self::wire_messages(request),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let url = join_endpoint(&self.endpoint, COMPLETIONS_SUFFIX);
        tracing::debug!(
            "Sending chat-completions request: {} messages to {}",
            body.messages.len(),
            url
        );

        let mut builder = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(self.name(), e))?;

        if !response.status().is_success() {
            return Err(semantic_error(self.name(), response).await.into());
        }

        let parsed: ChatCompletionsResponse = response
            .json()
            .await
            .map_err(|e| protocol_error(self.name(), e))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| protocol_error(self.name(), "no choices in response"))?;

        Ok(choice.message.content.trim().to_string())
    }
}
