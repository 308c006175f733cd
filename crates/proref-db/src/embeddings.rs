//! Embedding store: one vector per ticket, persisted as a byte blob.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

use proref_core::{EmbeddingRepository, Error, Result, StoredEmbedding, TicketSummary};

/// SQLite implementation of [`EmbeddingRepository`].
#[derive(Clone)]
pub struct SqliteEmbeddingRepository {
    pool: SqlitePool,
}

impl SqliteEmbeddingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmbeddingRepository for SqliteEmbeddingRepository {
    #[instrument(skip(self, vector), fields(subsystem = "db", component = "embeddings", op = "save_embedding", dimension = vector.len()))]
    async fn save_embedding(&self, ticket_key: &str, vector: &[f32]) -> Result<()> {
        let blob = utils::encode(vector);

        let mut tx = self.pool.begin().await.map_err(Error::Storage)?;
        sqlx::query(
            "INSERT INTO ticket_embedding (ticket_key, vector, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT (ticket_key) DO UPDATE SET
                 vector = excluded.vector,
                 updated_at = excluded.updated_at",
        )
        .bind(ticket_key)
        .bind(blob)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(Error::Storage)?;
        tx.commit().await.map_err(Error::Storage)?;

        debug!(ticket_key, "Embedding stored");
        Ok(())
    }

    async fn get_embedding(&self, ticket_key: &str) -> Result<Option<Vec<f32>>> {
        let row = sqlx::query("SELECT vector FROM ticket_embedding WHERE ticket_key = ?")
            .bind(ticket_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Storage)?;

        row.map(|r| utils::decode(&r.get::<Vec<u8>, _>("vector")))
            .transpose()
    }

    async fn get_all_embeddings(&self) -> Result<Vec<StoredEmbedding>> {
        let rows = sqlx::query(
            "SELECT e.ticket_key, t.title, e.vector
             FROM ticket_embedding e
             LEFT JOIN ticket t ON t.key = e.ticket_key
             ORDER BY e.ticket_key",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Storage)?;

        rows.into_iter()
            .map(|row| {
                Ok(StoredEmbedding {
                    ticket: TicketSummary {
                        key: row.get("ticket_key"),
                        title: row.get("title"),
                    },
                    vector: utils::decode(&row.get::<Vec<u8>, _>("vector"))?,
                })
            })
            .collect()
    }

    async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM ticket_embedding")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Storage)?;
        Ok(row.get("n"))
    }
}

/// Vector blob codec.
pub mod utils {
    use super::*;

    const F32_BYTES: usize = std::mem::size_of::<f32>();

    /// Encode a vector as consecutive little-endian `f32` values.
    pub fn encode(vector: &[f32]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(std::mem::size_of_val(vector));
        for &value in vector {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    /// Decode a blob written by [`encode`].
    pub fn decode(blob: &[u8]) -> Result<Vec<f32>> {
        if blob.len() % F32_BYTES != 0 {
            return Err(Error::Serialization(format!(
                "invalid embedding byte length {} (not a multiple of {})",
                blob.len(),
                F32_BYTES
            )));
        }
        Ok(blob
            .chunks_exact(F32_BYTES)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::utils::*;
    use super::*;

    #[test]
    fn test_encode_is_little_endian() {
        let bytes = encode(&[1.0]);
        assert_eq!(bytes, vec![0x00, 0x00, 0x80, 0x3f]);
    }

    #[test]
    fn test_decode_preserves_values() {
        let v = vec![0.25, -1.5, 3.0e-7, f32::MAX];
        assert_eq!(decode(&encode(&v)).unwrap(), v);
    }

    #[test]
    fn test_decode_empty_blob() {
        assert!(decode(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_partial_value() {
        let err = decode(&[0, 0, 128]).unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
