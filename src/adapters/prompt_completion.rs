//! Prompt-completion style adapter
//!
//! Speaks the Ollama `/api/generate` wire format: the conversation is
//! flattened into a single transcript string and generated against in
//! one shot. Local generators are slow to load models, so this adapter
//! carries the longest timeout.

use crate::adapters::base::{
    build_client, join_endpoint, protocol_error, semantic_error, transcript_lines,
    transport_error, BackendAdapter, CompletionRequest,
};
use crate::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-call timeout for local single-endpoint generators
const TIMEOUT: Duration = Duration::from_secs(60);

/// Path suffix of the generate endpoint
const GENERATE_SUFFIX: &str = "/api/generate";

/// Request body for the generate API
#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

/// Generation options
#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

/// Response body from the generate API
///
/// A backend-reported failure arrives as an `error` field instead of a
/// `response` field.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Adapter for Ollama-style prompt-completion backends
pub struct PromptCompletionAdapter {
    client: Client,
    endpoint: String,
}

impl PromptCompletionAdapter {
    /// Create an adapter for the given endpoint
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: build_client(TIMEOUT)?,
            endpoint: endpoint.into(),
        })
    }

    /// Flatten system prompt, history and user turn into one prompt
    fn flatten_prompt(request: &CompletionRequest) -> String {
        let mut prompt = String::new();
        if !request.system_prompt.is_empty() {
            prompt.push_str(&request.system_prompt);
            prompt.push_str("\n\n");
        }
        prompt.push_str(&transcript_lines(&request.history));
        prompt.push_str("User: ");
        prompt.push_str(&request.user_message);
        prompt.push('\n');
        prompt
    }
}

#[async_trait]
impl BackendAdapter for PromptCompletionAdapter {
    fn name(&self) -> &'static str {
        "prompt-completion"
    }

    fn timeout(&self) -> Duration {
        TIMEOUT
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = GenerateRequest {
            model: request.model.clone(),
            prompt: Self::flatten_prompt(request),
            stream: false,
            options: GenerateOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        let url = join_endpoint(&self.endpoint, GENERATE_SUFFIX);
        tracing::debug!("Sending prompt-completion request to {}", url);

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

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| protocol_error(self.name(), e))?;

        if let Some(error) = parsed.error {
            return Err(crate::error::ChatForgeError::Semantic(format!(
                "{} reported: {}",
                self.name(),
                error
            ))
            .into());
        }

        let reply = parsed
            .response
            .ok_or_else(|| protocol_error(self.name(), "response field missing"))?;
        Ok(reply.trim().to_string())
    }
}
