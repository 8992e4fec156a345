//! Event journal query functions.

use rusqlite::Connection;

use accrue_types::LedgerEvent;

use crate::Result;

/// A journaled event row.
#[derive(Debug)]
pub struct EventRow {
    pub id: i64,
    pub kind: String,
    pub pool_key: String,
    pub operation: String,
    pub timestamp: u64,
    pub payload: String,
}

impl EventRow {
    /// Decode the JSON payload back into an event.
    pub fn decode(&self) -> Result<LedgerEvent<String, String>> {
        Ok(serde_json::from_str(&self.payload)?)
    }
}

/// Append an event to the journal. Returns its row id.
pub fn append(conn: &Connection, event: &LedgerEvent<String, String>) -> Result<i64> {
    let payload = serde_json::to_string(event)?;
    conn.execute(
        "INSERT INTO ledger_events (kind, pool_key, operation, timestamp, payload)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            event.kind(),
            event.pool(),
            event.operation().as_str(),
            event.timestamp() as i64,
            payload,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Number of journaled events.
pub fn count(conn: &Connection) -> Result<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM ledger_events", [], |row| row.get(0))?;
    Ok(count as u64)
}

/// Events of one pool, oldest first.
pub fn for_pool(conn: &Connection, pool_key: &str) -> Result<Vec<EventRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, kind, pool_key, operation, timestamp, payload
         FROM ledger_events WHERE pool_key = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map([pool_key], |row| {
            Ok(EventRow {
                id: row.get(0)?,
                kind: row.get(1)?,
                pool_key: row.get(2)?,
                operation: row.get(3)?,
                timestamp: row.get::<_, i64>(4)? as u64,
                payload: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
