//! Backend construction from [`InferenceConfig`].
//!
//! Text generation goes to the configured `ai_provider`. Embeddings always
//! use OpenAI, so stored vectors stay comparable when the provider changes.

use std::sync::Arc;

use tracing::debug;

use proref_core::{EmbeddingBackend, GenerationBackend, Result};

use crate::anthropic::{AnthropicBackend, AnthropicConfig};
use crate::config::{InferenceConfig, ModelTask, ProviderKind};
use crate::google::{GoogleBackend, GoogleConfig};
use crate::openai::{OpenAIBackend, OpenAIConfig};

/// Generation backend of the active provider, using its model for `task`.
pub fn generation_backend(
    config: &InferenceConfig,
    task: ModelTask,
) -> Result<Arc<dyn GenerationBackend>> {
    let settings = config.active();
    debug!(
        subsystem = "inference",
        component = "provider",
        provider = %config.ai_provider,
        task = ?task,
        "Building generation backend"
    );

    let backend: Arc<dyn GenerationBackend> = match config.ai_provider {
        ProviderKind::OpenAI => Arc::new(OpenAIBackend::new(OpenAIConfig::from_settings(
            settings, task,
        )?)?),
        ProviderKind::Anthropic => Arc::new(AnthropicBackend::new(
            AnthropicConfig::from_settings(settings, task)?,
        )?),
        ProviderKind::Google => Arc::new(GoogleBackend::new(GoogleConfig::from_settings(
            settings, task,
        )?)?),
    };
    Ok(backend)
}

/// The OpenAI embedding backend, regardless of the active provider.
pub fn embedding_backend(config: &InferenceConfig) -> Result<Arc<dyn EmbeddingBackend>> {
    let openai = OpenAIConfig::from_settings(&config.openai, ModelTask::Embedding)?;
    Ok(Arc::new(OpenAIBackend::new(openai)?))
}
