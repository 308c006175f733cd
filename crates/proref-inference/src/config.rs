//! Provider selection and per-task model configuration.
//!
//! The layout mirrors the `config.json` document: an `ai_provider` key
//! choosing the active provider plus one settings block per provider.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use proref_core::{Error, Result};

/// LLM vendor used for text generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAI,
    Anthropic,
    Google,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            "google" => Ok(Self::Google),
            other => Err(Error::Config(format!("Unknown AI provider: {}", other))),
        }
    }
}

/// What a model is being used for. Each task can map to a different model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTask {
    Questions,
    TestCases,
    Chat,
    Embedding,
}

/// Credentials and model names for one provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub api_key: String,
    pub model_questions: String,
    pub model_testcases: String,
    pub model_chat: String,
    /// Empty for providers without an embedding endpoint.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub model_embedding: String,
    /// Override of the vendor's API root (proxies, tests).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl ProviderSettings {
    pub fn openai_defaults() -> Self {
        Self {
            model_questions: "gpt-4-turbo".to_string(),
            model_testcases: "gpt-3.5-turbo".to_string(),
            model_chat: "gpt-4-turbo".to_string(),
            model_embedding: "text-embedding-3-small".to_string(),
            ..Default::default()
        }
    }

    pub fn anthropic_defaults() -> Self {
        Self {
            model_questions: "claude-3-5-sonnet-20241022".to_string(),
            model_testcases: "claude-3-5-haiku-20241022".to_string(),
            model_chat: "claude-3-5-sonnet-20241022".to_string(),
            ..Default::default()
        }
    }

    pub fn google_defaults() -> Self {
        Self {
            model_questions: "gemini-1.5-pro".to_string(),
            model_testcases: "gemini-1.5-flash".to_string(),
            model_chat: "gemini-1.5-pro".to_string(),
            model_embedding: "text-embedding-004".to_string(),
            ..Default::default()
        }
    }

    /// Model configured for `task`; empty if none is set.
    pub fn model_for(&self, task: ModelTask) -> &str {
        match task {
            ModelTask::Questions => &self.model_questions,
            ModelTask::TestCases => &self.model_testcases,
            ModelTask::Chat => &self.model_chat,
            ModelTask::Embedding => &self.model_embedding,
        }
    }

    /// The API key, or a configuration error naming the provider.
    pub fn require_api_key(&self, provider: ProviderKind) -> Result<&str> {
        if self.api_key.trim().is_empty() {
            return Err(Error::Config(format!(
                "No API key configured for provider '{}'",
                provider
            )));
        }
        Ok(&self.api_key)
    }
}

/// Inference section of the application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceConfig {
    #[serde(default)]
    pub ai_provider: ProviderKind,
    #[serde(default = "ProviderSettings::openai_defaults")]
    pub openai: ProviderSettings,
    #[serde(default = "ProviderSettings::anthropic_defaults")]
    pub anthropic: ProviderSettings,
    #[serde(default = "ProviderSettings::google_defaults")]
    pub google: ProviderSettings,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            ai_provider: ProviderKind::default(),
            openai: ProviderSettings::openai_defaults(),
            anthropic: ProviderSettings::anthropic_defaults(),
            google: ProviderSettings::google_defaults(),
        }
    }
}

impl InferenceConfig {
    pub fn settings(&self, provider: ProviderKind) -> &ProviderSettings {
        match provider {
            ProviderKind::OpenAI => &self.openai,
            ProviderKind::Anthropic => &self.anthropic,
            ProviderKind::Google => &self.google,
        }
    }

    pub fn settings_mut(&mut self, provider: ProviderKind) -> &mut ProviderSettings {
        match provider {
            ProviderKind::OpenAI => &mut self.openai,
            ProviderKind::Anthropic => &mut self.anthropic,
            ProviderKind::Google => &mut self.google,
        }
    }

    /// Settings of the active provider.
    pub fn active(&self) -> &ProviderSettings {
        self.settings(self.ai_provider)
    }

    /// Model the active provider uses for `task`.
    pub fn model_for_task(&self, task: ModelTask) -> &str {
        self.active().model_for(task)
    }
}
