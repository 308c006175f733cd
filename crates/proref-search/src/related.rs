//! Related-ticket search by linear scan over stored embeddings.

use std::cmp::Ordering;

use tracing::{debug, instrument, trace};

use proref_core::defaults::{RELATED_THRESHOLD, RELATED_TOP_K};
use proref_core::{EmbeddingRepository, RelatedTicket, Result};

use crate::similarity::cosine_similarity;

/// Parameters for [`RelatedTicketFinder::find_related`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelatedQuery {
    /// Minimum similarity for a ticket to be included.
    pub threshold: f32,
    /// Maximum number of results.
    pub top_k: usize,
}

impl Default for RelatedQuery {
    fn default() -> Self {
        Self {
            threshold: RELATED_THRESHOLD,
            top_k: RELATED_TOP_K,
        }
    }
}

impl RelatedQuery {
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }
}

/// Finds tickets whose embeddings are close to a given ticket's embedding.
pub struct RelatedTicketFinder<R> {
    store: R,
}

impl<R: EmbeddingRepository> RelatedTicketFinder<R> {
    pub fn new(store: R) -> Self {
        Self { store }
    }

    /// Tickets at least `threshold`-similar to `ticket_key`, best first.
    ///
    /// The query ticket itself is never included. A ticket without a stored
    /// embedding has no related tickets. Equal scores are ordered by key.
    #[instrument(skip(self), fields(subsystem = "search", component = "related", op = "find_related"))]
    pub async fn find_related(
        &self,
        ticket_key: &str,
        query: RelatedQuery,
    ) -> Result<Vec<RelatedTicket>> {
        let Some(target) = self.store.get_embedding(ticket_key).await? else {
            debug!("No embedding stored for query ticket");
            return Ok(Vec::new());
        };

        let mut related: Vec<RelatedTicket> = self
            .store
            .get_all_embeddings()
            .await?
            .into_iter()
            .filter(|stored| stored.ticket.key != ticket_key)
            .filter_map(|stored| {
                let score = cosine_similarity(&target, &stored.vector);
                trace!(candidate = %stored.ticket.key, score, "Scored candidate");
                (score >= query.threshold).then(|| RelatedTicket {
                    key: stored.ticket.key,
                    title: stored.ticket.title,
                    score,
                })
            })
            .collect();

        related.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.key.cmp(&b.key))
        });
        related.truncate(query.top_k);

        debug!(result_count = related.len(), "Related tickets found");
        Ok(related)
    }

    /// Human-readable summary of [`find_related`](Self::find_related).
    pub async fn related_summary(&self, ticket_key: &str, query: RelatedQuery) -> Result<String> {
        let related = self.find_related(ticket_key, query).await?;
        Ok(format_related_summary(&related))
    }
}

/// Render related tickets as an indented list with percentage scores.
pub fn format_related_summary(related: &[RelatedTicket]) -> String {
    if related.is_empty() {
        return "No closely related tickets found.".to_string();
    }

    let mut lines = vec!["Related Tickets:".to_string()];
    for ticket in related {
        lines.push(format!(
            "  - {}: {} ({:.0}% similar)",
            ticket.key,
            ticket.title.as_deref().unwrap_or(""),
            ticket.score * 100.0
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use proref_core::{StoredEmbedding, TicketSummary};

    /// In-memory embedding store for exercising the scan logic.
    struct FakeStore {
        entries: Vec<(String, Vec<f32>)>,
    }

    impl FakeStore {
        fn new(entries: &[(&str, &[f32])]) -> Self {
            Self {
                entries: entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_vec()))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl EmbeddingRepository for FakeStore {
        async fn save_embedding(&self, _ticket_key: &str, _vector: &[f32]) -> Result<()> {
            unimplemented!("read-only fake")
        }

        async fn get_embedding(&self, ticket_key: &str) -> Result<Option<Vec<f32>>> {
            Ok(self
                .entries
                .iter()
                .find(|(k, _)| k == ticket_key)
                .map(|(_, v)| v.clone()))
        }

        async fn get_all_embeddings(&self) -> Result<Vec<StoredEmbedding>> {
            Ok(self
                .entries
                .iter()
                .map(|(k, v)| StoredEmbedding {
                    ticket: TicketSummary {
                        key: k.clone(),
                        title: Some(format!("Title {}", k)),
                    },
                    vector: v.clone(),
                })
                .collect())
        }

        async fn count(&self) -> Result<i64> {
            Ok(self.entries.len() as i64)
        }
    }

    fn keys(related: &[RelatedTicket]) -> Vec<&str> {
        related.iter().map(|r| r.key.as_str()).collect()
    }

    #[tokio::test]
    async fn test_missing_target_returns_empty() {
        let finder = RelatedTicketFinder::new(FakeStore::new(&[("A", &[1.0, 0.0])]));
        let related = finder
            .find_related("Z", RelatedQuery::default())
            .await
            .unwrap();
        assert!(related.is_empty());
    }

    #[tokio::test]
    async fn test_excludes_self_and_applies_threshold() {
        let finder = RelatedTicketFinder::new(FakeStore::new(&[
            ("A", &[1.0, 0.0]),
            ("B", &[0.9, 0.1]),
            ("C", &[0.0, 1.0]),
        ]));
        let related = finder
            .find_related("A", RelatedQuery::default())
            .await
            .unwrap();

        assert_eq!(keys(&related), vec!["B"]);
        assert!(related[0].score >= 0.8);
        assert_eq!(related[0].title.as_deref(), Some("Title B"));
    }

    #[tokio::test]
    async fn test_sorted_descending_and_truncated() {
        let finder = RelatedTicketFinder::new(FakeStore::new(&[
            ("Q", &[1.0, 0.0]),
            ("LOW", &[0.6, 0.4]),
            ("HIGH", &[0.99, 0.01]),
            ("MID", &[0.8, 0.2]),
        ]));
        let related = finder
            .find_related("Q", RelatedQuery::default().with_threshold(0.0).with_top_k(2))
            .await
            .unwrap();

        assert_eq!(keys(&related), vec!["HIGH", "MID"]);
        assert!(related[0].score >= related[1].score);
    }

    #[tokio::test]
    async fn test_equal_scores_ordered_by_key() {
        let finder = RelatedTicketFinder::new(FakeStore::new(&[
            ("Q", &[1.0, 0.0]),
            ("PROJ-9", &[2.0, 0.0]),
            ("PROJ-1", &[3.0, 0.0]),
            ("PROJ-5", &[1.0, 0.0]),
        ]));
        let related = finder
            .find_related("Q", RelatedQuery::default())
            .await
            .unwrap();
        assert_eq!(keys(&related), vec!["PROJ-1", "PROJ-5", "PROJ-9"]);
    }

    #[tokio::test]
    async fn test_top_k_zero_returns_nothing() {
        let finder = RelatedTicketFinder::new(FakeStore::new(&[
            ("A", &[1.0, 0.0]),
            ("B", &[1.0, 0.0]),
        ]));
        let related = finder
            .find_related("A", RelatedQuery::default().with_top_k(0))
            .await
            .unwrap();
        assert!(related.is_empty());
    }

    #[tokio::test]
    async fn test_zero_vector_target_matches_nothing_above_zero() {
        let finder = RelatedTicketFinder::new(FakeStore::new(&[
            ("A", &[0.0, 0.0]),
            ("B", &[1.0, 0.0]),
        ]));
        let related = finder
            .find_related("A", RelatedQuery::default())
            .await
            .unwrap();
        assert!(related.is_empty());
    }

    #[tokio::test]
    async fn test_summary_lists_matches() {
        let finder = RelatedTicketFinder::new(FakeStore::new(&[
            ("A", &[1.0, 0.0]),
            ("B", &[1.0, 0.0]),
        ]));
        let summary = finder
            .related_summary("A", RelatedQuery::default())
            .await
            .unwrap();
        assert_eq!(summary, "Related Tickets:\n  - B: Title B (100% similar)");
    }

    #[test]
    fn test_summary_empty() {
        assert_eq!(
            format_related_summary(&[]),
            "No closely related tickets found."
        );
    }
}
