//! Single-text embedding with blank short-circuit, truncation and retry.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, instrument};

use proref_core::defaults::{EMBEDDING_DIMENSION, EMBED_MAX_CHARS};
use proref_core::{EmbeddingBackend, Error, Result, RetryPolicy, Ticket};

/// Turns ticket text into a fixed-length vector through an [`EmbeddingBackend`].
pub struct Embedder {
    backend: Arc<dyn EmbeddingBackend>,
    retry: RetryPolicy,
    shutdown: Option<watch::Receiver<bool>>,
}

impl Embedder {
    pub fn new(backend: Arc<dyn EmbeddingBackend>) -> Self {
        Self {
            backend,
            retry: RetryPolicy::default(),
            shutdown: None,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Abort backoff waits once `shutdown` turns `true`.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    /// Embed `text`.
    ///
    /// Blank text yields a zero vector without calling the backend. Text
    /// longer than [`EMBED_MAX_CHARS`] characters is truncated first. A
    /// vector whose length is not [`EMBEDDING_DIMENSION`] is rejected.
    #[instrument(skip(self, text), fields(subsystem = "inference", component = "embedder", op = "embed", text_len = text.len()))]
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            debug!("Blank text, returning zero vector");
            return Ok(vec![0.0; EMBEDDING_DIMENSION]);
        }

        let input = vec![truncate_chars(text, EMBED_MAX_CHARS).trim().to_string()];
        let (backend, input) = (&self.backend, &input);
        let call = move || async move { backend.embed_texts(input).await };

        let mut vectors = match self.shutdown.clone() {
            Some(mut shutdown) => {
                self.retry
                    .run_with_shutdown("embed", call, &mut shutdown)
                    .await?
            }
            None => self.retry.run("embed", call).await?,
        };

        if vectors.is_empty() {
            return Err(Error::Embedding("Backend returned no vectors".to_string()));
        }
        let vector = vectors.swap_remove(0);
        if vector.len() != EMBEDDING_DIMENSION {
            return Err(Error::Embedding(format!(
                "Model {} returned a {}-dimensional vector, expected {}",
                self.backend.model_name(),
                vector.len(),
                EMBEDDING_DIMENSION
            )));
        }
        Ok(vector)
    }

    /// Embed a ticket's `title\n\ndescription` text.
    pub async fn embed_ticket(&self, ticket: &Ticket) -> Result<Vec<f32>> {
        self.embed(&ticket.embedding_text()).await
    }
}

/// The first `max_chars` characters of `text`.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
