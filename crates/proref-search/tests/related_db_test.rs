//! Related-ticket search against the SQLite embedding store.

use proref_core::{EmbeddingRepository, TicketRepository};
use proref_db::test_fixtures::{incoming, test_database};
use proref_search::{RelatedQuery, RelatedTicketFinder};

const DAY_1: &str = "2024-01-01T10:00:00.000+0000";

#[tokio::test]
async fn test_find_related_over_stored_embeddings() {
    let db = test_database().await;
    let fixtures: [(&str, &str, [f32; 3]); 4] = [
        ("PROJ-1", "Login with password", [1.0, 0.0, 0.0]),
        ("PROJ-2", "Login with SSO", [0.95, 0.05, 0.0]),
        ("PROJ-3", "Password reset", [0.85, 0.3, 0.1]),
        ("PROJ-4", "Export report", [0.0, 0.0, 1.0]),
    ];
    for (key, title, vector) in &fixtures {
        db.tickets
            .reconcile(&incoming(key, title, "body", Some(DAY_1)))
            .await
            .unwrap();
        db.embeddings.save_embedding(key, vector).await.unwrap();
    }

    let finder = RelatedTicketFinder::new(db.embeddings.clone());
    let related = finder
        .find_related("PROJ-1", RelatedQuery::default())
        .await
        .unwrap();

    let keys: Vec<&str> = related.iter().map(|r| r.key.as_str()).collect();
    assert_eq!(keys, vec!["PROJ-2", "PROJ-3"]);
    assert_eq!(related[0].title.as_deref(), Some("Login with SSO"));
    assert!(related.iter().all(|r| r.score >= 0.8));

    let summary = finder
        .related_summary("PROJ-4", RelatedQuery::default())
        .await
        .unwrap();
    assert_eq!(summary, "No closely related tickets found.");
}

#[tokio::test]
async fn test_ticket_without_embedding_has_no_related() {
    let db = test_database().await;
    db.tickets
        .reconcile(&incoming("PROJ-1", "A", "a", Some(DAY_1)))
        .await
        .unwrap();

    let finder = RelatedTicketFinder::new(db.embeddings.clone());
    let related = finder
        .find_related("PROJ-1", RelatedQuery::default().with_threshold(-1.0))
        .await
        .unwrap();
    assert!(related.is_empty());
}
