//! SQLite backend implementation.

use std::fmt::Debug;
use std::path::Path;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;
use serde::{Deserialize, Serialize};

use crate::error::{BackendError, ListingError, ListingResult};
use crate::query::SqliteOperators;

/// SQLite backend for record listings.
pub struct SqliteBackend {
    pool: Pool<SqliteConnectionManager>,
    config: SqliteBackendConfig,
    is_memory: bool,
    operators: SqliteOperators,
}

impl Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("config", &self.config)
            .field("is_memory", &self.is_memory)
            .field("connections", &self.pool.state().connections)
            .finish_non_exhaustive()
    }
}

/// Configuration for the SQLite backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteBackendConfig {
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of idle connections.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in milliseconds.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u32,

    /// Enable WAL mode for file databases.
    #[serde(default = "default_true")]
    pub enable_wal: bool,

    /// Enable foreign key constraints.
    #[serde(default = "default_true")]
    pub enable_foreign_keys: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connection_timeout_ms() -> u64 {
    30000
}

fn default_busy_timeout_ms() -> u32 {
    5000
}

fn default_true() -> bool {
    true
}

impl Default for SqliteBackendConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connection_timeout_ms: default_connection_timeout_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
            enable_wal: true,
            enable_foreign_keys: true,
        }
    }
}

impl SqliteBackend {
    /// Creates a new in-memory SQLite backend.
    ///
    /// Pooled connections share one private in-memory database, which lives
    /// as long as the backend.
    pub fn in_memory() -> ListingResult<Self> {
        Self::with_config(":memory:", SqliteBackendConfig::default())
    }

    /// Opens or creates a file-based SQLite database.
    pub fn open<P: AsRef<Path>>(path: P) -> ListingResult<Self> {
        Self::with_config(path, SqliteBackendConfig::default())
    }

    /// Creates a backend with custom configuration.
    pub fn with_config<P: AsRef<Path>>(
        path: P,
        config: SqliteBackendConfig,
    ) -> ListingResult<Self> {
        let is_memory = path.as_ref().to_string_lossy() == ":memory:";

        let manager = if is_memory {
            let uri = format!(
                "file:listing-{}?mode=memory&cache=shared",
                uuid::Uuid::new_v4().simple()
            );
            SqliteConnectionManager::file(uri)
        } else {
            SqliteConnectionManager::file(path.as_ref())
        };

        let busy_timeout = Duration::from_millis(u64::from(config.busy_timeout_ms));
        let enable_foreign_keys = config.enable_foreign_keys;
        let manager = manager
            .with_flags(OpenFlags::default() | OpenFlags::SQLITE_OPEN_URI)
            .with_init(move |conn| {
                conn.busy_timeout(busy_timeout)?;
                if enable_foreign_keys {
                    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
                }
                Ok(())
            });

        let mut builder = Pool::builder()
            .max_size(config.max_connections)
            .min_idle(Some(config.min_connections.max(u32::from(is_memory))))
            .connection_timeout(Duration::from_millis(config.connection_timeout_ms));
        if is_memory {
            // the shared in-memory database is dropped with its last connection
            builder = builder.idle_timeout(None).max_lifetime(None);
        }

        let pool = builder.build(manager).map_err(|e| {
            ListingError::Backend(BackendError::ConnectionFailed {
                backend_name: "sqlite".to_string(),
                message: e.to_string(),
            })
        })?;

        let backend = Self {
            pool,
            config,
            is_memory,
            operators: SqliteOperators,
        };

        backend.configure_connection()?;
        tracing::info!(
            in_memory = backend.is_memory,
            max_connections = backend.config.max_connections,
            "SQLite backend ready"
        );

        Ok(backend)
    }

    /// Runs a batch of statements, e.g. a schema and its seed data.
    pub fn execute_batch(&self, sql: &str) -> ListingResult<()> {
        let conn = self.get_connection()?;
        conn.execute_batch(sql).map_err(|e| {
            ListingError::Backend(BackendError::Internal {
                backend_name: "sqlite".to_string(),
                message: format!("Failed to execute batch: {}", e),
                source: Some(Box::new(e)),
            })
        })
    }

    /// Get a connection from the pool.
    pub(crate) fn get_connection(
        &self,
    ) -> ListingResult<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| {
            ListingError::Backend(BackendError::ConnectionFailed {
                backend_name: "sqlite".to_string(),
                message: e.to_string(),
            })
        })
    }

    /// A handle on the pool, for work moved onto blocking threads.
    pub(crate) fn pool(&self) -> Pool<SqliteConnectionManager> {
        self.pool.clone()
    }

    pub(crate) fn sqlite_operators(&self) -> &SqliteOperators {
        &self.operators
    }

    /// Configure database-wide settings.
    fn configure_connection(&self) -> ListingResult<()> {
        if self.config.enable_wal && !self.is_memory {
            let conn = self.get_connection()?;
            conn.execute_batch("PRAGMA journal_mode = WAL;").map_err(|e| {
                ListingError::Backend(BackendError::Internal {
                    backend_name: "sqlite".to_string(),
                    message: format!("Failed to enable WAL mode: {}", e),
                    source: None,
                })
            })?;
        }
        Ok(())
    }

    /// Returns whether this is an in-memory database.
    pub fn is_memory(&self) -> bool {
        self.is_memory
    }

    /// Returns the backend configuration.
    pub fn config(&self) -> &SqliteBackendConfig {
        &self.config
    }
}
