//! Account query functions.

use rusqlite::Connection;

use accrue_types::{AccountSnapshot, SCALE};

use super::{parse_i128, parse_u128};
use crate::{DbError, Result};

/// Check a stored debt fraction lies in `0..SCALE`.
pub(crate) fn parse_fraction(raw: i64) -> Result<u64> {
    u64::try_from(raw)
        .ok()
        .filter(|fraction| u128::from(*fraction) < SCALE)
        .ok_or_else(|| DbError::InvalidColumn {
            column: "debt_fraction",
            reason: format!("{raw} outside 0..1e18"),
        })
}

/// Insert or replace an account entry.
pub fn upsert(
    conn: &Connection,
    pool_key: &str,
    account_key: &str,
    account: &AccountSnapshot,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO accounts (pool_key, account_key, shares, debt, debt_fraction)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            pool_key,
            account_key,
            account.shares.to_string(),
            account.debt.to_string(),
            account.debt_fraction as i64,
        ],
    )?;
    Ok(())
}

/// All accounts of a pool, sorted by account key.
pub fn list_for_pool(conn: &Connection, pool_key: &str) -> Result<Vec<(String, AccountSnapshot)>> {
    let mut stmt = conn.prepare(
        "SELECT account_key, shares, debt, debt_fraction FROM accounts
         WHERE pool_key = ?1 ORDER BY account_key",
    )?;
    let rows = stmt
        .query_map([pool_key], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(account_key, shares, debt, fraction)| {
            Ok((
                account_key,
                AccountSnapshot {
                    shares: parse_u128("shares", &shares)?,
                    debt: parse_i128("debt", &debt)?,
                    debt_fraction: parse_fraction(fraction)?,
                },
            ))
        })
        .collect()
}

/// Remove every account of a pool.
pub fn delete_for_pool(conn: &Connection, pool_key: &str) -> Result<usize> {
    let deleted = conn.execute("DELETE FROM accounts WHERE pool_key = ?1", [pool_key])?;
    Ok(deleted)
}
