//! Google Gemini `generateContent` backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use proref_core::defaults::HTTP_TIMEOUT_SECS;
use proref_core::{Error, GenerationBackend, GenerationOptions, Result};

use crate::config::{ModelTask, ProviderKind, ProviderSettings};
use crate::http::{build_client, check_status, transport_error};

pub const DEFAULT_GOOGLE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_seconds: u64,
}

impl GoogleConfig {
    pub fn from_settings(settings: &ProviderSettings, task: ModelTask) -> Result<Self> {
        let model = settings.model_for(task);
        if model.is_empty() {
            return Err(Error::Config(
                "No Google model configured for this task".to_string(),
            ));
        }
        Ok(Self {
            base_url: settings
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_GOOGLE_URL.to_string()),
            api_key: settings.require_api_key(ProviderKind::Google)?.to_string(),
            model: model.to_string(),
            timeout_seconds: HTTP_TIMEOUT_SECS,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

pub struct GoogleBackend {
    client: Client,
    config: GoogleConfig,
}

impl GoogleBackend {
    pub fn new(config: GoogleConfig) -> Result<Self> {
        let client = build_client(Duration::from_secs(config.timeout_seconds))?;
        info!(
            subsystem = "inference",
            component = "google",
            model = %config.model,
            "Initializing Google backend"
        );
        Ok(Self { client, config })
    }
}

#[async_trait]
impl GenerationBackend for GoogleBackend {
    #[instrument(
        skip(self, prompt),
        fields(subsystem = "inference", component = "google", op = "generate", model = %self.config.model, prompt_len = prompt.len())
    )]
    async fn generate(&self, prompt: &str, options: GenerationOptions) -> Result<String> {
        let generation_config = (options.temperature.is_some() || options.max_tokens.is_some())
            .then_some(GenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_tokens,
            });
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            generation_config,
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;

        let result: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        let candidate = result
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| Error::Inference("No candidates in response".to_string()))?;

        let text: String = candidate
            .content
            .parts
            .into_iter()
            .map(|part| part.text)
            .collect();
        if text.is_empty() {
            return Err(Error::Inference("Response has no text content".to_string()));
        }
        Ok(text)
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
        let mut settings = ProviderSettings::google_defaults();
        settings.api_key = "g-key".to_string();
        let config = GoogleConfig::from_settings(&settings, ModelTask::TestCases).unwrap();
        assert_eq!(config.model, "gemini-1.5-flash");
        assert_eq!(config.base_url, DEFAULT_GOOGLE_URL);
    }

    #[test]
    fn test_request_serialization_camel_case() {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: "hi" }],
            }],
            generation_config: Some(GenerationConfig {
                temperature: Some(0.5),
                max_output_tokens: Some(500),
            }),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 500);
    }
}
