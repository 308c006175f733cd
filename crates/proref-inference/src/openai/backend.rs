//! OpenAI inference backend implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, instrument};

use proref_core::defaults::{EMBEDDING_DIMENSION, HTTP_TIMEOUT_SECS};
use proref_core::{EmbeddingBackend, Error, GenerationBackend, GenerationOptions, Result};

use super::types::*;
use crate::config::{ModelTask, ProviderKind, ProviderSettings};
use crate::http::{build_client, check_status, transport_error};

/// Default OpenAI API endpoint.
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Default embedding model.
pub const DEFAULT_EMBED_MODEL: &str = "text-embedding-3-small";

/// Default generation model.
pub const DEFAULT_GEN_MODEL: &str = "gpt-4-turbo";

/// Configuration for the OpenAI backend.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Base URL for the API endpoint.
    pub base_url: String,
    pub api_key: String,
    /// Model to use for embeddings.
    pub embed_model: String,
    /// Model to use for generation.
    pub gen_model: String,
    /// Expected embedding dimension.
    pub embed_dimension: usize,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OPENAI_URL.to_string(),
            api_key: String::new(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            gen_model: DEFAULT_GEN_MODEL.to_string(),
            embed_dimension: EMBEDDING_DIMENSION,
            timeout_seconds: HTTP_TIMEOUT_SECS,
        }
    }
}

impl OpenAIConfig {
    /// Config for `task` from the provider settings. Fails without an API key.
    pub fn from_settings(settings: &ProviderSettings, task: ModelTask) -> Result<Self> {
        let defaults = Self::default();
        let gen_model = match settings.model_for(task) {
            "" => defaults.gen_model.clone(),
            model => model.to_string(),
        };
        let embed_model = match settings.model_embedding.as_str() {
            "" => defaults.embed_model.clone(),
            model => model.to_string(),
        };
        Ok(Self {
            base_url: settings
                .base_url
                .clone()
                .unwrap_or(defaults.base_url),
            api_key: settings.require_api_key(ProviderKind::OpenAI)?.to_string(),
            embed_model,
            gen_model,
            ..defaults
        })
    }
}

/// OpenAI backend for embeddings and chat completions.
pub struct OpenAIBackend {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIBackend {
    /// Create a new OpenAI backend with the given configuration.
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let client = build_client(Duration::from_secs(config.timeout_seconds))?;

        info!(
            subsystem = "inference",
            component = "openai",
            base_url = %config.base_url,
            embed_model = %config.embed_model,
            gen_model = %config.gen_model,
            "Initializing OpenAI backend"
        );

        Ok(Self { client, config })
    }

    /// Get the current configuration.
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    fn build_request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint);
        self.client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAIBackend {
    #[instrument(
        skip(self, texts),
        fields(subsystem = "inference", component = "openai", op = "embed_texts", model = %self.config.embed_model)
    )]
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        debug!(text_count = texts.len(), "Requesting embeddings");

        let request = EmbeddingRequest {
            model: self.config.embed_model.clone(),
            input: texts.to_vec(),
            encoding_format: Some("float".to_string()),
        };

        let response = self
            .build_request("/embeddings")
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("Failed to parse response: {}", e)))?;

        if result.data.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                result.data.len()
            )));
        }

        let mut data = result.data;
        data.sort_by_key(|d| d.index);

        let vectors: Vec<Vec<f32>> = data.into_iter().map(|d| d.embedding).collect();
        debug!(result_count = vectors.len(), "Generated embeddings");
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.config.embed_dimension
    }

    fn model_name(&self) -> &str {
        &self.config.embed_model
    }
}

#[async_trait]
impl GenerationBackend for OpenAIBackend {
    #[instrument(
        skip(self, prompt),
        fields(subsystem = "inference", component = "openai", op = "generate", model = %self.config.gen_model, prompt_len = prompt.len())
    )]
    async fn generate(&self, prompt: &str, options: GenerationOptions) -> Result<String> {
        let request = ChatCompletionRequest {
            model: self.config.gen_model.clone(),
            messages: vec![ChatMessage::user(prompt)],
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        let response = self
            .build_request("/chat/completions")
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        let choice = result
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Inference("No choices in response".to_string()))?;

        debug!(finish_reason = ?choice.finish_reason, "Completion received");
        choice
            .message
            .content
            .ok_or_else(|| Error::Inference("Completion has no content".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.config.gen_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OpenAIConfig::default();
        assert_eq!(config.base_url, DEFAULT_OPENAI_URL);
        assert_eq!(config.embed_model, "text-embedding-3-small");
        assert_eq!(config.embed_dimension, 1536);
        assert_eq!(config.timeout_seconds, HTTP_TIMEOUT_SECS);
    }

    #[test]
    fn test_from_settings_picks_task_model() {
        let mut settings = ProviderSettings::openai_defaults();
        settings.api_key = "sk-test".to_string();

        let questions = OpenAIConfig::from_settings(&settings, ModelTask::Questions).unwrap();
        assert_eq!(questions.gen_model, "gpt-4-turbo");
        let cases = OpenAIConfig::from_settings(&settings, ModelTask::TestCases).unwrap();
        assert_eq!(cases.gen_model, "gpt-3.5-turbo");
        assert_eq!(cases.api_key, "sk-test");
        assert_eq!(cases.base_url, DEFAULT_OPENAI_URL);
    }

    #[test]
    fn test_from_settings_base_url_override() {
        let settings = ProviderSettings {
            api_key: "sk-test".to_string(),
            base_url: Some("http://localhost:9999/v1".to_string()),
            ..Default::default()
        };
        let config = OpenAIConfig::from_settings(&settings, ModelTask::Chat).unwrap();
        assert_eq!(config.base_url, "http://localhost:9999/v1");
        assert_eq!(config.gen_model, DEFAULT_GEN_MODEL);
        assert_eq!(config.embed_model, DEFAULT_EMBED_MODEL);
    }

    #[test]
    fn test_from_settings_requires_key() {
        let settings = ProviderSettings::openai_defaults();
        let result = OpenAIConfig::from_settings(&settings, ModelTask::Questions);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_backend_accessors() {
        let backend = OpenAIBackend::new(OpenAIConfig::default()).unwrap();
        assert_eq!(EmbeddingBackend::model_name(&backend), DEFAULT_EMBED_MODEL);
        assert_eq!(GenerationBackend::model_name(&backend), DEFAULT_GEN_MODEL);
        assert_eq!(backend.dimension(), 1536);
    }
}
