//! Conversational-turn style adapter
//!
//! Speaks the chat API of local web-UI-hosted generators: the user
//! message travels as `user_input` with the prior conversation flattened
//! into a `context` string, and the reply is the last entry of the
//! returned visible-history list.

use crate::adapters::base::{
    build_client, join_endpoint, protocol_error, semantic_error, transcript_lines,
    transport_error, BackendAdapter, CompletionRequest,
};
use crate::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-call timeout for web-UI-hosted generators
const TIMEOUT: Duration = Duration::from_secs(45);

/// Path suffix of the chat endpoint
const CHAT_SUFFIX: &str = "/api/v1/chat";

/// Request body for the conversational chat API
#[derive(Debug, Serialize)]
struct ConversationalRequest {
    user_input: String,
    max_new_tokens: u32,
    temperature: f32,
    context: String,
}

/// Response body from the conversational chat API
#[derive(Debug, Deserialize)]
struct ConversationalResponse {
    results: Vec<ConversationalResult>,
}

/// One result entry
#[derive(Debug, Deserialize)]
struct ConversationalResult {
    history: VisibleHistory,
}

/// Visible conversation history: `[input, output]` pairs
#[derive(Debug, Deserialize)]
struct VisibleHistory {
    visible: Vec<Vec<String>>,
}

/// Adapter for web-UI-hosted conversational backends
pub struct ConversationalAdapter {
    client: Client,
    endpoint: String,
}

impl ConversationalAdapter {
    /// Create an adapter for the given endpoint
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: build_client(TIMEOUT)?,
            endpoint: endpoint.into(),
        })
    }

    /// Flatten system prompt and history into the context string
    fn flatten_context(request: &CompletionRequest) -> String {
        let mut context = String::new();
        if !request.system_prompt.is_empty() {
            context.push_str(&request.system_prompt);
            context.push_str("\n\n");
        }
        context.push_str(&transcript_lines(&request.history));
        context
    }
}

#[async_trait]
impl BackendAdapter for ConversationalAdapter {
    fn name(&self) -> &'static str {
        "conversational"
    }

    fn timeout(&self) -> Duration {
        TIMEOUT
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = ConversationalRequest {
            user_input: request.user_message.clone(),
            max_new_tokens: request.max_tokens,
            temperature: request.temperature,
            context: Self::flatten_context(request),
        };

        let url = join_endpoint(&self.endpoint, CHAT_SUFFIX);
        tracing::debug!("Sending conversational request to {}", url);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(self.name(), e))?;

        if !response.status().is_success() {
            return Err(semantic_error(self.name(), response).await.into());
        }

        let parsed: ConversationalResponse = response
            .json()
            .await
            .map_err(|e| protocol_error(self.name(), e))?;

        let result = parsed
            .results
            .into_iter()
            .next()
            .ok_or_else(|| protocol_error(self.name(), "no results in response"))?;

        let last = result
            .history
            .visible
            .into_iter()
            .last()
            .ok_or_else(|| protocol_error(self.name(), "visible history is empty"))?;

        // Each visible entry is an [input, output] pair
        let reply = last
            .into_iter()
            .nth(1)
            .ok_or_else(|| protocol_error(self.name(), "visible entry has no output"))?;
        Ok(reply.trim().to_string())
    }
}
