//! Mock inference backend for deterministic testing.
//!
//! Implements both [`EmbeddingBackend`] and [`GenerationBackend`] without
//! network access. Every call is recorded so tests can assert on call
//! counts and the exact text a component sent.
//!
//! # Example
//!
//! ```rust
//! use proref_inference::mock::MockInferenceBackend;
//!
//! let mock = MockInferenceBackend::new()
//!     .with_response("Generate up to 5", "TC-1: Valid login\nSTEPS:\n1. Log in")
//!     .with_default_response("- Which roles can log in?");
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use proref_core::defaults::EMBEDDING_DIMENSION;
use proref_core::{EmbeddingBackend, Error, GenerationBackend, GenerationOptions, Result};

/// How the mock misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// The first `n` calls fail with a retryable [`Error::Request`].
    Transient(usize),
    /// Every call fails with [`Error::Http`] carrying this status.
    Status(u16),
}

#[derive(Debug, Clone)]
pub struct MockConfig {
    pub dimension: usize,
    pub default_response: String,
    /// `(prompt substring, response)`, first match wins.
    pub fixed_responses: Vec<(String, String)>,
    pub failure: Option<MockFailure>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            dimension: EMBEDDING_DIMENSION,
            default_response: String::new(),
            fixed_responses: Vec::new(),
            failure: None,
        }
    }
}

/// A recorded backend call.
#[derive(Debug, Clone)]
pub struct MockCall {
    /// "embed" or "generate".
    pub operation: String,
    pub input: String,
    pub options: Option<GenerationOptions>,
}

pub struct MockInferenceBackend {
    config: Arc<MockConfig>,
    call_log: Mutex<Vec<MockCall>>,
    failures_left: AtomicUsize,
}

impl MockInferenceBackend {
    pub fn new() -> Self {
        Self {
            config: Arc::new(MockConfig::default()),
            call_log: Mutex::new(Vec::new()),
            failures_left: AtomicUsize::new(0),
        }
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        Arc::make_mut(&mut self.config).dimension = dimension;
        self
    }

    /// Response returned when no fixed response matches.
    pub fn with_default_response(mut self, response: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).default_response = response.into();
        self
    }

    /// Return `response` for prompts containing `prompt_fragment`.
    pub fn with_response(
        mut self,
        prompt_fragment: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        Arc::make_mut(&mut self.config)
            .fixed_responses
            .push((prompt_fragment.into(), response.into()));
        self
    }

    pub fn with_transient_failures(mut self, count: usize) -> Self {
        Arc::make_mut(&mut self.config).failure = Some(MockFailure::Transient(count));
        self.failures_left = AtomicUsize::new(count);
        self
    }

    pub fn with_failure_status(mut self, status: u16) -> Self {
        Arc::make_mut(&mut self.config).failure = Some(MockFailure::Status(status));
        self
    }

    pub fn config(&self) -> &MockConfig {
        &self.config
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.call_log.lock().unwrap().clone()
    }

    pub fn embed_call_count(&self) -> usize {
        self.count_of("embed")
    }

    pub fn generate_call_count(&self) -> usize {
        self.count_of("generate")
    }

    pub fn clear_calls(&self) {
        self.call_log.lock().unwrap().clear();
    }

    fn count_of(&self, operation: &str) -> usize {
        self.call_log
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    fn log_call(&self, operation: &str, input: &str, options: Option<GenerationOptions>) {
        self.call_log.lock().unwrap().push(MockCall {
            operation: operation.to_string(),
            input: input.to_string(),
            options,
        });
    }

    fn check_failure(&self) -> Result<()> {
        match self.config.failure {
            Some(MockFailure::Status(status)) => Err(Error::Http {
                status,
                message: "simulated failure".to_string(),
            }),
            Some(MockFailure::Transient(_)) => {
                let remaining = self.failures_left.load(Ordering::SeqCst);
                if remaining > 0 {
                    self.failures_left.store(remaining - 1, Ordering::SeqCst);
                    Err(Error::Request("simulated connection reset".to_string()))
                } else {
                    Ok(())
                }
            }
            None => Ok(()),
        }
    }
}

impl Default for MockInferenceBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingBackend for MockInferenceBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        for text in texts {
            self.log_call("embed", text, None);
        }
        self.check_failure()?;
        Ok(texts
            .iter()
            .map(|text| MockEmbeddingGenerator::generate(text, self.config.dimension))
            .collect())
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embed"
    }
}

#[async_trait]
impl GenerationBackend for MockInferenceBackend {
    async fn generate(&self, prompt: &str, options: GenerationOptions) -> Result<String> {
        self.log_call("generate", prompt, Some(options));
        self.check_failure()?;

        let response = self
            .config
            .fixed_responses
            .iter()
            .find(|(fragment, _)| prompt.contains(fragment.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| self.config.default_response.clone());
        Ok(response)
    }

    fn model_name(&self) -> &str {
        "mock-gen"
    }
}

/// Mock embedding generator with deterministic output.
pub struct MockEmbeddingGenerator;

impl MockEmbeddingGenerator {
    /// Unit vector derived from the characters of `text`. Same text, same vector.
    pub fn generate(text: &str, dimension: usize) -> Vec<f32> {
        let mut vec = vec![0.0f32; dimension];
        if dimension == 0 {
            return vec;
        }
        for (i, c) in text.chars().enumerate() {
            let idx = (c as usize + i) % dimension;
            vec[idx] += 0.1;
        }
        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in vec.iter_mut() {
                *x /= norm;
            }
        }
        vec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_embedding_is_deterministic() {
        let mock = MockInferenceBackend::new().with_dimension(16);
        let a = mock.embed_texts(&["same".to_string()]).await.unwrap();
        let b = mock.embed_texts(&["same".to_string()]).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].len(), 16);
        assert_eq!(mock.embed_call_count(), 2);
    }

    #[tokio::test]
    async fn test_fixed_response_by_fragment() {
        let mock = MockInferenceBackend::new()
            .with_response("SCORE", "SCORE: 9")
            .with_default_response("fallback");
        let options = GenerationOptions::default().with_temperature(0.3);

        assert_eq!(
            mock.generate("reply with SCORE:", options).await.unwrap(),
            "SCORE: 9"
        );
        assert_eq!(mock.generate("other", options).await.unwrap(), "fallback");
        assert_eq!(mock.generate_call_count(), 2);
        assert_eq!(mock.calls()[0].options, Some(options));
    }

    #[tokio::test]
    async fn test_transient_failures_then_success() {
        let mock = MockInferenceBackend::new().with_transient_failures(1);
        let first = mock.generate("p", GenerationOptions::default()).await;
        assert!(matches!(first, Err(Error::Request(_))));
        assert!(mock.generate("p", GenerationOptions::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_status_failure_every_call() {
        let mock = MockInferenceBackend::new().with_failure_status(500);
        for _ in 0..2 {
            let err = mock.embed_texts(&["x".to_string()]).await.unwrap_err();
            assert!(matches!(err, Error::Http { status: 500, .. }));
        }
    }
}
