//! SQLite connection pool for the stream backend
//!
//! The pool is created once by the embedding application and handed to
//! [`SqliteBackend::new`](crate::backend::SqliteBackend::new). Every backend
//! call checks out one connection and returns it on drop, including on
//! error paths. The pool closes when its last clone is dropped.
//!
//! ## Tables
//!
//! - `activities` - Activity payloads keyed by id
//! - `stream_entries` - Per-stream `(activity_id, score)` membership

pub mod models;
pub mod schema;

use std::path::Path;
use std::time::Duration;

use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use tracing::{debug, info};

use crate::error::StreamError;

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type PooledConn = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Pool sizing and timeouts
#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// Maximum open connections
    pub max_size: u32,
    /// How long a caller waits to check out a connection
    pub connection_timeout: Duration,
    /// How long SQLite waits on a locked database before failing
    pub busy_timeout_ms: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_size: 8,
            connection_timeout: Duration::from_secs(5),
            busy_timeout_ms: 5000,
        }
    }
}

/// Per-connection PRAGMAs applied when the pool opens a connection
#[derive(Debug, Clone, Copy)]
struct ConnectionOptions {
    busy_timeout_ms: u64,
    wal: bool,
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        let mut pragmas = format!("PRAGMA busy_timeout = {};", self.busy_timeout_ms);
        // Readers keep their snapshot while a writer commits
        if self.wal {
            pragmas.push_str(" PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;");
        }
        conn.batch_execute(&pragmas)
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Open a pool over the database file at `path`, creating it if needed
pub fn open_pool(path: &Path, settings: &PoolSettings) -> Result<DbPool, StreamError> {
    info!(path = %path.display(), max_size = settings.max_size, "Opening SQLite pool");

    let manager = ConnectionManager::<SqliteConnection>::new(path.to_string_lossy());
    let pool = Pool::builder()
        .max_size(settings.max_size)
        .connection_timeout(settings.connection_timeout)
        .connection_customizer(Box::new(ConnectionOptions {
            busy_timeout_ms: settings.busy_timeout_ms,
            wal: true,
        }))
        .build(manager)?;

    Ok(pool)
}

/// Open a single-connection pool over a private in-memory database (for testing)
pub fn open_in_memory_pool() -> Result<DbPool, StreamError> {
    debug!("Opening in-memory SQLite pool");

    // Each SQLite connection to :memory: is its own database, so the pool
    // must hold exactly one connection for its whole lifetime
    let manager = ConnectionManager::<SqliteConnection>::new(":memory:");
    let pool = Pool::builder()
        .max_size(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connection_customizer(Box::new(ConnectionOptions {
            busy_timeout_ms: PoolSettings::default().busy_timeout_ms,
            wal: false,
        }))
        .build(manager)?;

    Ok(pool)
}
