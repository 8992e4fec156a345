//! Forward-only schema migrations.
//!
//! The schema version lives in `PRAGMA user_version`. Each step runs in its
//! own transaction together with the version bump, so an interrupted upgrade
//! resumes from the last completed step.

use rusqlite::Connection;

use accrue_types::SCALE_I128;

use crate::queries::parse_i128;
use crate::{schema, DbError, Result, SCHEMA_VERSION};

type Step = fn(&Connection) -> Result<()>;

/// Target version of each step, in order.
const STEPS: &[(u32, Step)] = &[(1, create_tables), (2, split_account_debt)];

fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(schema::SCHEMA_V1)?;
    Ok(())
}

/// v1 stored debt at full fixed-point precision; v2 keeps whole units in
/// `debt` and the remainder in `debt_fraction`.
fn split_account_debt(conn: &Connection) -> Result<()> {
    conn.execute_batch(schema::SCHEMA_V2)?;

    let mut stmt = conn.prepare("SELECT rowid, debt FROM accounts")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for (rowid, debt) in &rows {
        let scaled = parse_i128("debt", debt)?;
        let whole = scaled.div_euclid(SCALE_I128);
        // rem_euclid is in 0..SCALE, so it fits an i64.
        let fraction = scaled.rem_euclid(SCALE_I128) as i64;
        conn.execute(
            "UPDATE accounts SET debt = ?1, debt_fraction = ?2 WHERE rowid = ?3",
            rusqlite::params![whole.to_string(), fraction, rowid],
        )?;
    }
    tracing::debug!(accounts = rows.len(), "account debt split");
    Ok(())
}

fn user_version(conn: &Connection) -> Result<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Run all pending migrations.
///
/// # Errors
///
/// - [`DbError::UnsupportedVersion`] if the database is newer than this build
/// - [`DbError::Sqlite`] or a column error if a step fails; that step is
///   rolled back
pub fn run(conn: &Connection) -> Result<()> {
    let current = user_version(conn)?;
    if current > SCHEMA_VERSION {
        return Err(DbError::UnsupportedVersion {
            found: current,
            supported: SCHEMA_VERSION,
        });
    }

    for &(version, step) in STEPS.iter().filter(|(version, _)| *version > current) {
        tracing::info!(from = current, to = version, "migrating schema");
        let tx = conn.unchecked_transaction()?;
        step(&tx)?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
    }
    Ok(())
}
