//! Generated-content repository.
//!
//! Every generation run appends a record; nothing is updated in place except
//! the `published` flag. Record ids are monotonic, so the highest id per
//! (ticket, kind) is the current one.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::instrument;

use proref_core::{
    ContentKind, ContentRepository, Error, GeneratedContent, PublicationStats, Result,
};

use crate::tickets::generated_column;

const CONTENT_COLUMNS: &str = "id, ticket_key, kind, payload, published, created_at";

/// SQLite implementation of [`ContentRepository`].
#[derive(Clone)]
pub struct SqliteContentRepository {
    pool: SqlitePool,
}

impl SqliteContentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContentRepository for SqliteContentRepository {
    #[instrument(skip(self, payload), fields(subsystem = "db", component = "content", op = "insert", content_kind = %kind))]
    async fn insert(
        &self,
        ticket_key: &str,
        kind: ContentKind,
        payload: JsonValue,
    ) -> Result<i64> {
        let mut tx = self.pool.begin().await.map_err(Error::Storage)?;
        let result = sqlx::query(
            "INSERT INTO generated_content (ticket_key, kind, payload, published, created_at)
             VALUES (?, ?, ?, 0, ?)",
        )
        .bind(ticket_key)
        .bind(kind.as_str())
        .bind(serde_json::to_string(&payload)?)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(Error::Storage)?;
        tx.commit().await.map_err(Error::Storage)?;

        Ok(result.last_insert_rowid())
    }

    #[instrument(skip(self, payload), fields(subsystem = "db", component = "content", op = "record_generation", ticket_key = %ticket_key, content_kind = %kind))]
    async fn record_generation(
        &self,
        ticket_key: &str,
        kind: ContentKind,
        payload: JsonValue,
    ) -> Result<i64> {
        let mut tx = self.pool.begin().await.map_err(Error::Storage)?;

        let flagged = sqlx::query(&format!(
            "UPDATE ticket SET {} = 1 WHERE key = ?",
            generated_column(kind)
        ))
        .bind(ticket_key)
        .execute(&mut *tx)
        .await
        .map_err(Error::Storage)?;
        if flagged.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Ticket {} not found", ticket_key)));
        }

        let result = sqlx::query(
            "INSERT INTO generated_content (ticket_key, kind, payload, published, created_at)
             VALUES (?, ?, ?, 0, ?)",
        )
        .bind(ticket_key)
        .bind(kind.as_str())
        .bind(serde_json::to_string(&payload)?)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(Error::Storage)?;

        tx.commit().await.map_err(Error::Storage)?;
        Ok(result.last_insert_rowid())
    }

    async fn latest(
        &self,
        ticket_key: &str,
        kind: ContentKind,
    ) -> Result<Option<GeneratedContent>> {
        let query = format!(
            "SELECT {} FROM generated_content
             WHERE ticket_key = ? AND kind = ?
             ORDER BY id DESC LIMIT 1",
            CONTENT_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(ticket_key)
            .bind(kind.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Storage)?;
        row.as_ref().map(content_from_row).transpose()
    }

    async fn list_for_ticket(&self, ticket_key: &str) -> Result<Vec<GeneratedContent>> {
        let query = format!(
            "SELECT {} FROM generated_content WHERE ticket_key = ? ORDER BY id DESC",
            CONTENT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(ticket_key)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Storage)?;
        rows.iter().map(content_from_row).collect()
    }

    async fn list_unpublished(&self) -> Result<Vec<GeneratedContent>> {
        let query = format!(
            "SELECT {} FROM generated_content WHERE published = 0 ORDER BY id",
            CONTENT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Storage)?;
        rows.iter().map(content_from_row).collect()
    }

    async fn mark_published(&self, id: i64) -> Result<()> {
        let result = sqlx::query("UPDATE generated_content SET published = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Storage)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("generated content {}", id)));
        }
        Ok(())
    }

    async fn publication_stats(&self) -> Result<PublicationStats> {
        let rows = sqlx::query(
            "SELECT kind, published, COUNT(*) AS n
             FROM generated_content
             GROUP BY kind, published",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Storage)?;

        let mut stats = PublicationStats::default();
        for row in rows {
            let kind: ContentKind = row.get::<String, _>("kind").parse()?;
            let published: bool = row.get("published");
            let n: i64 = row.get("n");
            match (kind, published) {
                (ContentKind::Questions, true) => stats.questions_published += n,
                (ContentKind::Questions, false) => stats.questions_pending += n,
                (ContentKind::TestCases, true) => stats.test_cases_published += n,
                (ContentKind::TestCases, false) => stats.test_cases_pending += n,
            }
        }
        Ok(stats)
    }
}

fn content_from_row(row: &SqliteRow) -> Result<GeneratedContent> {
    let payload: String = row.get("payload");
    Ok(GeneratedContent {
        id: row.get("id"),
        ticket_key: row.get("ticket_key"),
        kind: row.get::<String, _>("kind").parse()?,
        payload: serde_json::from_str(&payload)?,
        published: row.get("published"),
        created_at: row.get("created_at"),
    })
}
