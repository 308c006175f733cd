//! Test fixtures for database integration tests.
//!
//! ```rust,ignore
//! use proref_db::test_fixtures::{incoming, test_database};
//!
//! let db = test_database().await;
//! db.tickets.reconcile(&incoming("PROJ-1", "Title", "Body", Some("2024-01-01T10:00:00.000+0000"))).await?;
//! ```

use chrono::DateTime;

use crate::{Database, IncomingTicket};

/// Timestamp format used by the tracker's `updated` field.
pub const TRACKER_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

/// Fresh migrated in-memory database. Panics on failure.
pub async fn test_database() -> Database {
    Database::in_memory()
        .await
        .expect("Failed to create in-memory test database")
}

/// Build an [`IncomingTicket`] with a tracker-formatted timestamp.
pub fn incoming(key: &str, title: &str, description: &str, updated: Option<&str>) -> IncomingTicket {
    IncomingTicket {
        key: key.to_string(),
        title: Some(title.to_string()),
        description: Some(description.to_string()),
        status: "To Do".to_string(),
        issue_type: "story".to_string(),
        updated_at: updated.map(|ts| {
            DateTime::parse_from_str(ts, TRACKER_TIMESTAMP_FORMAT)
                .expect("Invalid fixture timestamp")
        }),
    }
}
