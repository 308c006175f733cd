//! Core traits for proref abstractions.
//!
//! These traits define the seams between the pipeline stages so that
//! storage, LLM providers, and the tracker can be swapped or mocked.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// TICKET REPOSITORY
// =============================================================================

/// Repository for ticket records and their regeneration flags.
#[async_trait]
pub trait TicketRepository: Send + Sync {
    /// Merge one freshly fetched ticket into persisted state.
    async fn reconcile(&self, incoming: &IncomingTicket) -> Result<ReconcileOutcome>;

    /// Reconcile a batch in order, stopping at the first storage error.
    async fn reconcile_all(&self, incoming: &[IncomingTicket]) -> Result<ReconcileSummary> {
        let mut summary = ReconcileSummary::default();
        for ticket in incoming {
            summary.record(self.reconcile(ticket).await?);
        }
        Ok(summary)
    }

    /// Fetch a ticket by key.
    async fn get(&self, key: &str) -> Result<Option<Ticket>>;

    /// List every ticket ordered by key.
    async fn list_all(&self) -> Result<Vec<Ticket>>;

    /// Tickets still waiting for refinement questions (spikes excluded).
    async fn pending_questions(&self) -> Result<Vec<Ticket>>;

    /// Tickets still waiting for test cases (title and description required).
    async fn pending_test_cases(&self) -> Result<Vec<Ticket>>;

    /// Clear `content_changed`. Returns `false` when the ticket is absent.
    async fn mark_content_reviewed(&self, key: &str) -> Result<bool>;

    /// Clear the selected generated flags and `content_changed`.
    async fn reset_for_regeneration(
        &self,
        key: &str,
        reset_questions: bool,
        reset_tests: bool,
    ) -> Result<bool>;

    /// Persist a quality assessment, overwriting any previous one.
    async fn save_quality_score(&self, key: &str, score: &QualityScore) -> Result<bool>;

    /// Record that generation of `kind` completed for a ticket.
    async fn mark_generated(&self, key: &str, kind: ContentKind) -> Result<bool>;

    /// Aggregate counters.
    async fn stats(&self) -> Result<TicketStats>;
}

// =============================================================================
// EMBEDDING REPOSITORY
// =============================================================================

/// Persistent map from ticket key to embedding vector.
#[async_trait]
pub trait EmbeddingRepository: Send + Sync {
    /// Insert or replace the vector for a ticket.
    ///
    /// Ticket vectors are [`EMBEDDING_DIMENSION`](crate::defaults::EMBEDDING_DIMENSION)
    /// long; the embedder rejects anything else before it reaches storage.
    async fn save_embedding(&self, ticket_key: &str, vector: &[f32]) -> Result<()>;

    /// Vector for a ticket, if one has been stored.
    async fn get_embedding(&self, ticket_key: &str) -> Result<Option<Vec<f32>>>;

    /// Every stored vector with its ticket's key and title.
    async fn get_all_embeddings(&self) -> Result<Vec<StoredEmbedding>>;

    /// Number of stored vectors.
    async fn count(&self) -> Result<i64>;
}

// =============================================================================
// GENERATED CONTENT REPOSITORY
// =============================================================================

/// History of generated questions and test cases.
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Append a new record and return its id.
    async fn insert(&self, ticket_key: &str, kind: ContentKind, payload: JsonValue)
        -> Result<i64>;

    /// Append a record and set the ticket's matching "generated" flag in one
    /// transaction. Neither change is kept if either fails.
    async fn record_generation(
        &self,
        ticket_key: &str,
        kind: ContentKind,
        payload: JsonValue,
    ) -> Result<i64>;

    /// Most recent record for a ticket and kind.
    async fn latest(&self, ticket_key: &str, kind: ContentKind)
        -> Result<Option<GeneratedContent>>;

    /// All records for a ticket, newest first.
    async fn list_for_ticket(&self, ticket_key: &str) -> Result<Vec<GeneratedContent>>;

    /// Records not yet posted to the tracker, oldest first.
    async fn list_unpublished(&self) -> Result<Vec<GeneratedContent>>;

    /// Flag a record as posted.
    async fn mark_published(&self, id: i64) -> Result<()>;

    /// Published and pending counts per kind.
    async fn publication_stats(&self) -> Result<PublicationStats>;
}

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// Backend for generating text embeddings.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embeddings for the given texts, one vector per input.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Expected dimension of embedding vectors.
    fn dimension(&self) -> usize;

    /// Model name being used.
    fn model_name(&self) -> &str;
}

/// Backend for text generation (LLM).
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate a completion for a single user prompt.
    async fn generate(&self, prompt: &str, options: GenerationOptions) -> Result<String>;

    /// Model name being used.
    fn model_name(&self) -> &str;
}

// =============================================================================
// TRACKER TRAITS
// =============================================================================

/// Source of backlog tickets.
#[async_trait]
pub trait TicketSource: Send + Sync {
    /// Fetch the current backlog, already mapped to plain-text tickets.
    async fn fetch_tickets(&self) -> Result<Vec<IncomingTicket>>;
}

/// Sink for formatted comments on tracker tickets.
#[async_trait]
pub trait CommentPublisher: Send + Sync {
    /// Post a rich-text document body as a comment on `ticket_key`.
    async fn post_comment(&self, ticket_key: &str, body: &JsonValue) -> Result<()>;
}
