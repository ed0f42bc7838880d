//! Gateway configuration persistence
//!
//! Exactly one gateway configuration is active at a time. It lives in a
//! single durable record keyed by a fixed name, with explicit
//! load-at-startup and save-on-change semantics. Saving merges a
//! partial patch with the current configuration and never silently
//! drops unspecified fields.

use crate::error::{ChatForgeError, Result};
use serde::{Deserialize, Serialize};

/// Key holding the configuration record
const SETTINGS_KEY: &[u8] = b"settings";

/// Bounds for the max-output-tokens setting
pub const MAX_TOKENS_RANGE: std::ops::RangeInclusive<u32> = 50..=2000;

/// Bounds for the sampling temperature setting
pub const TEMPERATURE_RANGE: std::ops::RangeInclusive<f32> = 0.0..=1.0;

/// The active gateway configuration
///
/// `endpoint` empty means the gateway is not configured; `api_key` is an
/// opaque credential carried as-is to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the completion backend
    pub endpoint: String,
    /// Optional opaque credential sent as a bearer token
    #[serde(default)]
    pub api_key: Option<String>,
    /// Model identifier passed to the backend
    pub model: String,
    /// Maximum output tokens, clamped to [`MAX_TOKENS_RANGE`]
    pub max_tokens: u32,
    /// Sampling temperature, clamped to [`TEMPERATURE_RANGE`]
    pub temperature: f32,
    /// System prompt prepended to every completion
    pub system_prompt: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: None,
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 500,
            temperature: 0.7,
            system_prompt: "You are a helpful assistant.".to_string(),
        }
    }
}

impl GatewayConfig {
    /// Whether a usable endpoint is set
    pub fn is_configured(&self) -> bool {
        !self.endpoint.trim().is_empty()
    }

    /// Clamp numeric settings into their allowed bounds
    ///
    /// Out-of-range persisted values are clamped rather than rejected,
    /// so a one-off bad write cannot brick the settings record.
    fn clamp(mut self) -> Self {
        if !MAX_TOKENS_RANGE.contains(&self.max_tokens) {
            let clamped = self
                .max_tokens
                .clamp(*MAX_TOKENS_RANGE.start(), *MAX_TOKENS_RANGE.end());
            tracing::warn!(
                "max_tokens {} out of range, clamping to {}",
                self.max_tokens,
                clamped
            );
            self.max_tokens = clamped;
        }
        if !TEMPERATURE_RANGE.contains(&self.temperature) {
            let clamped = self
                .temperature
                .clamp(*TEMPERATURE_RANGE.start(), *TEMPERATURE_RANGE.end());
            tracing::warn!(
                "temperature {} out of range, clamping to {}",
                self.temperature,
                clamped
            );
            self.temperature = clamped;
        }
        self
    }
}

/// A partial configuration change
///
/// Unset fields leave the current value untouched. Setting `api_key` to
/// an empty string clears the stored credential.
#[derive(Debug, Clone, Default)]
pub struct GatewayConfigPatch {
    /// New endpoint URL; empty string unsets the endpoint
    pub endpoint: Option<String>,
    /// New credential; empty string clears it
    pub api_key: Option<String>,
    /// New model identifier
    pub model: Option<String>,
    /// New max output tokens
    pub max_tokens: Option<u32>,
    /// New sampling temperature
    pub temperature: Option<f32>,
    /// New system prompt
    pub system_prompt: Option<String>,
}

/// Durable store for the gateway configuration
///
/// Cheap to clone; clones share the same underlying database.
#[derive(Clone)]
pub struct SettingsStore {
    db: sled::Db,
}

impl SettingsStore {
    /// Create a settings store over an already-opened database
    pub fn new(db: sled::Db) -> Self {
        Self { db }
    }

    /// Load the last-saved configuration, or defaults if none exists
    ///
    /// Numeric fields are clamped into bounds on the way out.
    pub fn load(&self) -> Result<GatewayConfig> {
        match self
            .db
            .get(SETTINGS_KEY)
            .map_err(|e| ChatForgeError::Storage(e.to_string()))?
        {
            Some(raw) => {
                let config: GatewayConfig = serde_json::from_slice(&raw)
                    .map_err(|e| ChatForgeError::Storage(format!("corrupt settings: {}", e)))?;
                Ok(config.clamp())
            }
            None => Ok(GatewayConfig::default()),
        }
    }

    /// Merge a patch into the current configuration and persist it
    ///
    /// Returns the merged result. A non-empty endpoint that does not
    /// parse as a URL is rejected before anything is written.
    pub fn save(&self, patch: GatewayConfigPatch) -> Result<GatewayConfig> {
        let mut config = self.load()?;

        if let Some(endpoint) = patch.endpoint {
            let trimmed = endpoint.trim().to_string();
            if !trimmed.is_empty() {
                url::Url::parse(&trimmed).map_err(|e| {
                    ChatForgeError::Config(format!("invalid endpoint {:?}: {}", trimmed, e))
                })?;
            }
            config.endpoint = trimmed;
        }
        if let Some(api_key) = patch.api_key {
            config.api_key = if api_key.is_empty() {
                None
            } else {
                Some(api_key)
            };
        }
        if let Some(model) = patch.model {
            config.model = model;
        }
        if let Some(max_tokens) = patch.max_tokens {
            config.max_tokens = max_tokens;
        }
        if let Some(temperature) = patch.temperature {
            config.temperature = temperature;
        }
        if let Some(system_prompt) = patch.system_prompt {
            config.system_prompt = system_prompt;
        }

        let config = config.clamp();
        self.persist(&config)?;
        tracing::debug!("Saved gateway configuration (model={})", config.model);
        Ok(config)
    }

    /// Reset to defaults and persist the reset
    pub fn clear(&self) -> Result<GatewayConfig> {
        let config = GatewayConfig::default();
        self.persist(&config)?;
        tracing::info!("Gateway configuration reset to defaults");
        Ok(config)
    }

    fn persist(&self, config: &GatewayConfig) -> Result<()> {
        let raw = serde_json::to_vec(config).map_err(ChatForgeError::Serialization)?;
        self.db
            .insert(SETTINGS_KEY, raw)
            .map_err(|e| ChatForgeError::Storage(e.to_string()))?;
        self.db
            .flush()
            .map_err(|e| ChatForgeError::Storage(e.to_string()))?;
        Ok(())
    }
}
