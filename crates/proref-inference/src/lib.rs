//! # proref-inference
//!
//! LLM access for proref.
//!
//! This crate provides:
//! - Vendor backends implementing [`GenerationBackend`]: OpenAI, Anthropic
//!   and Google, selected by [`ProviderKind`]
//! - The OpenAI [`EmbeddingBackend`] and the retrying [`Embedder`]
//! - Generators for refinement questions, test cases and quality scores
//!
//! # Feature Flags
//!
//! - `mock`: expose [`mock::MockInferenceBackend`] to other crates' tests
//!
//! [`GenerationBackend`]: proref_core::GenerationBackend
//! [`EmbeddingBackend`]: proref_core::EmbeddingBackend

pub mod anthropic;
pub mod config;
pub mod embedder;
pub mod google;
mod http;
pub mod openai;
pub mod provider;
pub mod quality;
pub mod questions;
pub mod test_cases;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use anthropic::{AnthropicBackend, AnthropicConfig};
pub use config::{InferenceConfig, ModelTask, ProviderKind, ProviderSettings};
pub use embedder::Embedder;
pub use google::{GoogleBackend, GoogleConfig};
pub use openai::{OpenAIBackend, OpenAIConfig};
pub use provider::{embedding_backend, generation_backend};
pub use quality::QualityScorer;
pub use questions::QuestionGenerator;
pub use test_cases::TestCaseGenerator;

/// Trimmed field text, or `None` when absent or blank.
pub(crate) fn ticket_text(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;
    use proref_core::Ticket;

    pub fn test_ticket(title: Option<&str>, description: Option<&str>) -> Ticket {
        Ticket {
            key: "PROJ-1".to_string(),
            title: title.map(str::to_string),
            description: description.map(str::to_string),
            status: "To Do".to_string(),
            issue_type: "story".to_string(),
            updated_at: None,
            fetched_at: Utc::now(),
            questions_generated: false,
            test_cases_generated: false,
            content_hash: None,
            content_changed: false,
            quality: None,
            quality_scored_at: None,
        }
    }
}
