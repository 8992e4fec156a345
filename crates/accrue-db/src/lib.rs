//! # accrue-db
//!
//! SQLite persistence for ledger state and the event journal.
//!
//! ## Schema
//!
//! - WAL mode, foreign keys enforced
//! - 128-bit amounts stored as decimal TEXT (SQLite integers are 64-bit)
//! - Account debt split into whole units (TEXT) and a sub-unit fraction
//!   (INTEGER, always below 1e18)
//! - Timestamps stored as INTEGER
//! - Schema version stored in `PRAGMA user_version`, see [`migrations`]

pub mod migrations;
pub mod queries;
pub mod schema;
pub mod snapshot;

use rusqlite::Connection;
use std::path::Path;

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 2;

/// Database error types.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database schema v{found} is newer than supported v{supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("pool '{0}' not stored")]
    PoolNotFound(String),

    #[error("invalid {column} column: {reason}")]
    InvalidColumn { column: &'static str, reason: String },

    #[error("event payload: {0}")]
    Payload(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Open or create the database at the given path.
///
/// Configures WAL mode, foreign keys, and runs any pending migrations.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    configure(&conn)?;
    migrations::run(&conn)?;
    Ok(conn)
}

/// Open an in-memory database.
pub fn open_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    migrations::run(&conn)?;
    Ok(conn)
}

/// Configure SQLite pragmas.
fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )?;
    Ok(())
}
