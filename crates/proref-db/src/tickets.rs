//! Ticket repository: reconciliation of fetched tickets and flag helpers.
//!
//! Reconciliation merges a freshly fetched [`IncomingTicket`] into the stored
//! record. The remote `updated` timestamp decides whether anything is written;
//! the content fingerprint decides which regeneration state changes:
//!
//! | Stored record | Timestamp | Fingerprint | Effect |
//! |---------------|-----------|-------------|--------|
//! | absent        | -         | -           | insert, both flags false |
//! | present       | not newer | -           | nothing |
//! | present       | newer or missing | changed | overwrite, `content_changed = true` |
//! | present       | newer or missing | same    | overwrite, `questions_generated = false` |
//!
//! The test-case flag is intentionally untouched in the last row.

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, instrument};

use proref_core::{
    compute_content_hash, ContentKind, Error, IncomingTicket, QualityScore, ReconcileOutcome,
    Result, Ticket, TicketRepository, TicketStats,
};

const TICKET_COLUMNS: &str = "key, title, description, status, issue_type, updated_at, \
     fetched_at, questions_generated, test_cases_generated, content_hash, content_changed, \
     quality_score, quality_summary, quality_issues, quality_suggestions, quality_scored_at";

/// SQLite implementation of [`TicketRepository`].
#[derive(Clone)]
pub struct SqliteTicketRepository {
    pool: SqlitePool,
}

impl SqliteTicketRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_where(&self, clause: &str) -> Result<Vec<Ticket>> {
        let query = format!(
            "SELECT {} FROM ticket {} ORDER BY key",
            TICKET_COLUMNS, clause
        );
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Storage)?;
        rows.iter().map(ticket_from_row).collect()
    }
}

/// Whether an incoming snapshot should overwrite the stored one.
///
/// Strictly newer wins; a missing timestamp on either side always updates.
pub fn should_update(incoming: Option<NaiveDateTime>, stored: Option<NaiveDateTime>) -> bool {
    match (incoming, stored) {
        (Some(incoming), Some(stored)) => incoming > stored,
        _ => true,
    }
}

#[async_trait]
impl TicketRepository for SqliteTicketRepository {
    #[instrument(skip(self, incoming), fields(subsystem = "db", component = "tickets", op = "reconcile", ticket_key = %incoming.key))]
    async fn reconcile(&self, incoming: &IncomingTicket) -> Result<ReconcileOutcome> {
        let new_hash = compute_content_hash(
            incoming.title.as_deref(),
            incoming.description.as_deref(),
        );
        let incoming_updated = incoming.updated_at_naive();
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(Error::Storage)?;

        let existing = sqlx::query("SELECT updated_at, content_hash FROM ticket WHERE key = ?")
            .bind(&incoming.key)
            .fetch_optional(&mut *tx)
            .await
            .map_err(Error::Storage)?;

        let outcome = match existing {
            None => {
                sqlx::query(
                    "INSERT INTO ticket (key, title, description, status, issue_type, updated_at,
                         fetched_at, questions_generated, test_cases_generated, content_hash,
                         content_changed)
                     VALUES (?, ?, ?, ?, ?, ?, ?, 0, 0, ?, 0)",
                )
                .bind(&incoming.key)
                .bind(&incoming.title)
                .bind(&incoming.description)
                .bind(&incoming.status)
                .bind(&incoming.issue_type)
                .bind(incoming_updated)
                .bind(now)
                .bind(&new_hash)
                .execute(&mut *tx)
                .await
                .map_err(Error::Storage)?;
                ReconcileOutcome::Inserted
            }
            Some(row) => {
                let stored_updated: Option<NaiveDateTime> = row.get("updated_at");
                let old_hash: Option<String> = row.get("content_hash");

                if !should_update(incoming_updated, stored_updated) {
                    debug!(?incoming_updated, ?stored_updated, "Stored snapshot is current");
                    ReconcileOutcome::Skipped
                } else {
                    let content_changed = old_hash.as_deref().is_some_and(|old| old != new_hash);
                    let state_clause = if content_changed {
                        "content_changed = 1"
                    } else {
                        "questions_generated = 0"
                    };
                    let query = format!(
                        "UPDATE ticket SET title = ?, description = ?, status = ?, issue_type = ?,
                             updated_at = ?, fetched_at = ?, content_hash = ?, {}
                         WHERE key = ?",
                        state_clause
                    );
                    sqlx::query(&query)
                        .bind(&incoming.title)
                        .bind(&incoming.description)
                        .bind(&incoming.status)
                        .bind(&incoming.issue_type)
                        .bind(incoming_updated)
                        .bind(now)
                        .bind(&new_hash)
                        .bind(&incoming.key)
                        .execute(&mut *tx)
                        .await
                        .map_err(Error::Storage)?;
                    ReconcileOutcome::Updated { content_changed }
                }
            }
        };

        tx.commit().await.map_err(Error::Storage)?;

        info!(outcome = %outcome, "Ticket reconciled");
        Ok(outcome)
    }

    async fn get(&self, key: &str) -> Result<Option<Ticket>> {
        let query = format!("SELECT {} FROM ticket WHERE key = ?", TICKET_COLUMNS);
        let row = sqlx::query(&query)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Storage)?;
        row.as_ref().map(ticket_from_row).transpose()
    }

    async fn list_all(&self) -> Result<Vec<Ticket>> {
        self.fetch_where("").await
    }

    async fn pending_questions(&self) -> Result<Vec<Ticket>> {
        self.fetch_where("WHERE questions_generated = 0 AND lower(issue_type) != 'spike'")
            .await
    }

    async fn pending_test_cases(&self) -> Result<Vec<Ticket>> {
        self.fetch_where(
            "WHERE test_cases_generated = 0
               AND title IS NOT NULL AND trim(title) != ''
               AND description IS NOT NULL AND trim(description) != ''",
        )
        .await
    }

    async fn mark_content_reviewed(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE ticket SET content_changed = 0 WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(Error::Storage)?;
        Ok(result.rows_affected() > 0)
    }

    async fn reset_for_regeneration(
        &self,
        key: &str,
        reset_questions: bool,
        reset_tests: bool,
    ) -> Result<bool> {
        let mut assignments = vec!["content_changed = 0"];
        if reset_questions {
            assignments.push("questions_generated = 0");
        }
        if reset_tests {
            assignments.push("test_cases_generated = 0");
        }
        let query = format!(
            "UPDATE ticket SET {} WHERE key = ?",
            assignments.join(", ")
        );
        let result = sqlx::query(&query)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(Error::Storage)?;

        debug!(
            subsystem = "db",
            component = "tickets",
            op = "reset_for_regeneration",
            ticket_key = key,
            reset_questions,
            reset_tests,
            found = result.rows_affected() > 0,
            "Regeneration flags reset"
        );
        Ok(result.rows_affected() > 0)
    }

    async fn save_quality_score(&self, key: &str, score: &QualityScore) -> Result<bool> {
        score.validate()?;

        let result = sqlx::query(
            "UPDATE ticket SET quality_score = ?, quality_summary = ?, quality_issues = ?,
                 quality_suggestions = ?, quality_scored_at = ?
             WHERE key = ?",
        )
        .bind(score.score as i64)
        .bind(&score.summary)
        .bind(serde_json::to_string(&score.issues)?)
        .bind(serde_json::to_string(&score.suggestions)?)
        .bind(Utc::now())
        .bind(key)
        .execute(&self.pool)
        .await
        .map_err(Error::Storage)?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_generated(&self, key: &str, kind: ContentKind) -> Result<bool> {
        let query = format!("UPDATE ticket SET {} = 1 WHERE key = ?", generated_column(kind));
        let result = sqlx::query(&query)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(Error::Storage)?;
        Ok(result.rows_affected() > 0)
    }

    async fn stats(&self) -> Result<TicketStats> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total,
                    COALESCE(SUM(questions_generated), 0) AS with_questions,
                    COALESCE(SUM(test_cases_generated), 0) AS with_test_cases,
                    COALESCE(SUM(content_changed), 0) AS content_changed,
                    COUNT(quality_score) AS scored
             FROM ticket",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Storage)?;

        Ok(TicketStats {
            total: row.get("total"),
            with_questions: row.get("with_questions"),
            with_test_cases: row.get("with_test_cases"),
            content_changed: row.get("content_changed"),
            scored: row.get("scored"),
        })
    }
}

/// Ticket column flagging completed generation of `kind`.
pub(crate) fn generated_column(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Questions => "questions_generated",
        ContentKind::TestCases => "test_cases_generated",
    }
}

fn ticket_from_row(row: &SqliteRow) -> Result<Ticket> {
    let quality = match row.get::<Option<i64>, _>("quality_score") {
        Some(score) => Some(QualityScore {
            score: QualityScore::clamp_score(score),
            summary: row
                .get::<Option<String>, _>("quality_summary")
                .unwrap_or_default(),
            issues: decode_list(row.get("quality_issues"))?,
            suggestions: decode_list(row.get("quality_suggestions"))?,
        }),
        None => None,
    };

    Ok(Ticket {
        key: row.get("key"),
        title: row.get("title"),
        description: row.get("description"),
        status: row.get("status"),
        issue_type: row.get("issue_type"),
        updated_at: row.get("updated_at"),
        fetched_at: row.get("fetched_at"),
        questions_generated: row.get("questions_generated"),
        test_cases_generated: row.get("test_cases_generated"),
        content_hash: row.get("content_hash"),
        content_changed: row.get("content_changed"),
        quality,
        quality_scored_at: row.get("quality_scored_at"),
    })
}

fn decode_list(raw: Option<String>) -> Result<Vec<String>> {
    match raw {
        Some(json) if !json.is_empty() => Ok(serde_json::from_str(&json)?),
        _ => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
    }

    #[test]
    fn test_should_update_strictly_newer() {
        assert!(should_update(at(2, 0), at(1, 0)));
        assert!(!should_update(at(1, 0), at(1, 0)));
        assert!(!should_update(at(1, 0), at(2, 0)));
    }

    #[test]
    fn test_should_update_fails_open_on_missing_timestamp() {
        assert!(should_update(None, at(1, 0)));
        assert!(should_update(at(1, 0), None));
        assert!(should_update(None, None));
    }

    #[test]
    fn test_decode_list() {
        assert!(decode_list(None).unwrap().is_empty());
        assert!(decode_list(Some(String::new())).unwrap().is_empty());
        assert_eq!(
            decode_list(Some(r#"["a","b"]"#.to_string())).unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );
        assert!(decode_list(Some("not json".to_string())).is_err());
    }
}
