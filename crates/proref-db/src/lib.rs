//! # proref-db
//!
//! SQLite persistence layer for proref.
//!
//! This crate provides:
//! - Connection pool management
//! - Ticket repository with fetch reconciliation and regeneration flags
//! - Embedding store (one vector blob per ticket)
//! - Generated-content history with publish state
//!
//! ## Example
//!
//! ```rust,ignore
//! use proref_db::{Database, TicketRepository};
//!
//! let db = Database::connect("sqlite:data/proref.db").await?;
//! db.migrate().await?;
//! let outcome = db.tickets.reconcile(&incoming).await?;
//! ```

pub mod content;
pub mod embeddings;
pub mod pool;
pub mod tickets;

// Test fixtures for integration tests
pub mod test_fixtures;

// Re-export core types
pub use proref_core::*;

pub use content::SqliteContentRepository;
pub use embeddings::{utils as embedding_utils, SqliteEmbeddingRepository};
pub use pool::{create_memory_pool, create_pool, create_pool_with_config, PoolConfig};
pub use tickets::{should_update, SqliteTicketRepository};

use sqlx::SqlitePool;

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: SqlitePool,
    /// Tickets, reconciliation, and regeneration flags.
    pub tickets: SqliteTicketRepository,
    /// Ticket embedding vectors.
    pub embeddings: SqliteEmbeddingRepository,
    /// Generated questions and test cases.
    pub content: SqliteContentRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            tickets: SqliteTicketRepository::new(pool.clone()),
            embeddings: SqliteEmbeddingRepository::new(pool.clone()),
            content: SqliteContentRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connect to the given `sqlite:` URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Connect with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Fresh, migrated in-memory database.
    pub async fn in_memory() -> Result<Self> {
        let db = Self::new(create_memory_pool().await?);
        db.migrate().await?;
        Ok(db)
    }

    /// Run pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Storage(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
