//! SQLite connection pool management.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::{Duration, Instant};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use proref_core::{Error, Result};

/// Default maximum number of connections in the pool.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Default connection timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// URL of a private in-memory database.
pub const MEMORY_DATABASE_URL: &str = "sqlite::memory:";

/// Pool configuration options.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// Connection timeout duration.
    pub connect_timeout: Duration,
    /// Idle connection timeout; `None` keeps connections forever.
    pub idle_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            idle_timeout: Some(Duration::from_secs(600)),
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of connections.
    pub fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the idle connection timeout.
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Single long-lived connection, required for `sqlite::memory:` where
    /// every connection would otherwise see its own empty database.
    pub fn in_memory() -> Self {
        Self {
            max_connections: 1,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            idle_timeout: None,
        }
    }
}

/// Create a SQLite pool with default configuration.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    create_pool_with_config(database_url, PoolConfig::default()).await
}

/// Create a private in-memory SQLite pool.
pub async fn create_memory_pool() -> Result<SqlitePool> {
    create_pool_with_config(MEMORY_DATABASE_URL, PoolConfig::in_memory()).await
}

/// Create a SQLite pool with custom configuration.
///
/// File databases are created if missing, including their parent directory.
pub async fn create_pool_with_config(database_url: &str, config: PoolConfig) -> Result<SqlitePool> {
    let start = Instant::now();

    info!(
        subsystem = "db",
        component = "pool",
        op = "create",
        max_connections = config.max_connections,
        connect_timeout_secs = config.connect_timeout.as_secs(),
        "Creating database connection pool"
    );

    if let Some(path) = database_file(database_url) {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            debug!(subsystem = "db", component = "pool", path = %parent.display(), "Ensuring database directory");
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let connect_options = SqliteConnectOptions::from_str(database_url)
        .map_err(Error::Storage)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.connect_timeout)
        .idle_timeout(config.idle_timeout)
        .max_lifetime(config.idle_timeout.map(|_| Duration::from_secs(1800)))
        .connect_with(connect_options)
        .await
        .map_err(Error::Storage)?;

    info!(
        subsystem = "db",
        component = "pool",
        op = "established",
        pool_size = pool.size(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Database connection pool established"
    );
    Ok(pool)
}

/// Filesystem path behind a `sqlite:` URL, if it names a file.
fn database_file(database_url: &str) -> Option<PathBuf> {
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path == ":memory:" {
        None
    } else {
        Some(PathBuf::from(path))
    }
}
