//! Anthropic Messages API backend (generation only).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use proref_core::defaults::HTTP_TIMEOUT_SECS;
use proref_core::{Error, GenerationBackend, GenerationOptions, Result};

use crate::config::{ModelTask, ProviderKind, ProviderSettings};
use crate::http::{build_client, check_status, transport_error};

pub const DEFAULT_ANTHROPIC_URL: &str = "https://api.anthropic.com";

/// Value of the `anthropic-version` header.
pub const ANTHROPIC_API_VERSION: &str = "2023-06-01";

/// `max_tokens` is mandatory for this API; used when the caller sets none.
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_seconds: u64,
}

impl AnthropicConfig {
    pub fn from_settings(settings: &ProviderSettings, task: ModelTask) -> Result<Self> {
        let model = settings.model_for(task);
        if model.is_empty() {
            return Err(Error::Config(
                "No Anthropic model configured for this task".to_string(),
            ));
        }
        Ok(Self {
            base_url: settings
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_ANTHROPIC_URL.to_string()),
            api_key: settings.require_api_key(ProviderKind::Anthropic)?.to_string(),
            model: model.to_string(),
            timeout_seconds: HTTP_TIMEOUT_SECS,
        })
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

pub struct AnthropicBackend {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicBackend {
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let client = build_client(Duration::from_secs(config.timeout_seconds))?;
        info!(
            subsystem = "inference",
            component = "anthropic",
            model = %config.model,
            "Initializing Anthropic backend"
        );
        Ok(Self { client, config })
    }
}

#[async_trait]
impl GenerationBackend for AnthropicBackend {
    #[instrument(
        skip(self, prompt),
        fields(subsystem = "inference", component = "anthropic", op = "generate", model = %self.config.model, prompt_len = prompt.len())
    )]
    async fn generate(&self, prompt: &str, options: GenerationOptions) -> Result<String> {
        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            temperature: options.temperature,
        };

        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;

        let result: MessagesResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        debug!(stop_reason = ?result.stop_reason, "Message received");
        result
            .content
            .into_iter()
            .find(|block| block.block_type == "text")
            .and_then(|block| block.text)
            .ok_or_else(|| Error::Inference("Response has no text content".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_settings_uses_task_model() {
        let mut settings = ProviderSettings::anthropic_defaults();
        settings.api_key = "sk-ant".to_string();
        let config = AnthropicConfig::from_settings(&settings, ModelTask::TestCases).unwrap();
        assert_eq!(config.model, "claude-3-5-haiku-20241022");
        assert_eq!(config.base_url, DEFAULT_ANTHROPIC_URL);
    }

    #[test]
    fn test_from_settings_without_model_or_key() {
        let mut settings = ProviderSettings::anthropic_defaults();
        assert!(matches!(
            AnthropicConfig::from_settings(&settings, ModelTask::Questions),
            Err(Error::Config(_))
        ));
        settings.api_key = "sk-ant".to_string();
        assert!(matches!(
            AnthropicConfig::from_settings(&settings, ModelTask::Embedding),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_request_serialization() {
        let request = MessagesRequest {
            model: "claude",
            max_tokens: DEFAULT_MAX_TOKENS,
            messages: vec![Message {
                role: "user",
                content: "hi",
            }],
            temperature: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["max_tokens"], 2048);
        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json.get("temperature").is_none());
    }
}
