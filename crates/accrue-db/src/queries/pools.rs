//! Pool query functions.

use rusqlite::{Connection, OptionalExtension};

use accrue_types::{BudgetMode, PoolSnapshot};

use super::parse_u128;
use crate::{DbError, Result};

/// Raw pool row, 128-bit columns still as text.
struct PoolRow {
    emission_rate: String,
    acc_per_share: String,
    total_shares: String,
    remaining_budget: String,
    outstanding: String,
    last_updated: i64,
    budget_mode: String,
}

impl PoolRow {
    fn into_snapshot(self) -> Result<PoolSnapshot> {
        let budget_mode =
            BudgetMode::parse(&self.budget_mode).ok_or_else(|| DbError::InvalidColumn {
                column: "budget_mode",
                reason: format!("unknown mode '{}'", self.budget_mode),
            })?;
        Ok(PoolSnapshot {
            emission_rate: parse_u128("emission_rate", &self.emission_rate)?,
            acc_per_share: parse_u128("acc_per_share", &self.acc_per_share)?,
            total_shares: parse_u128("total_shares", &self.total_shares)?,
            remaining_budget: parse_u128("remaining_budget", &self.remaining_budget)?,
            outstanding: parse_u128("outstanding", &self.outstanding)?,
            last_updated: self.last_updated as u64,
            budget_mode,
        })
    }
}

/// Insert or replace a pool.
pub fn upsert(conn: &Connection, pool_key: &str, pool: &PoolSnapshot) -> Result<()> {
    conn.execute(
        "INSERT INTO pools (pool_key, emission_rate, acc_per_share, total_shares,
                            remaining_budget, outstanding, last_updated, budget_mode)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(pool_key) DO UPDATE SET
            emission_rate = excluded.emission_rate,
            acc_per_share = excluded.acc_per_share,
            total_shares = excluded.total_shares,
            remaining_budget = excluded.remaining_budget,
            outstanding = excluded.outstanding,
            last_updated = excluded.last_updated,
            budget_mode = excluded.budget_mode",
        rusqlite::params![
            pool_key,
            pool.emission_rate.to_string(),
            pool.acc_per_share.to_string(),
            pool.total_shares.to_string(),
            pool.remaining_budget.to_string(),
            pool.outstanding.to_string(),
            pool.last_updated as i64,
            pool.budget_mode.as_str(),
        ],
    )?;
    Ok(())
}

/// Get a pool by key.
pub fn get(conn: &Connection, pool_key: &str) -> Result<PoolSnapshot> {
    let row = conn
        .query_row(
            "SELECT emission_rate, acc_per_share, total_shares, remaining_budget,
                    outstanding, last_updated, budget_mode
             FROM pools WHERE pool_key = ?1",
            [pool_key],
            |row| {
                Ok(PoolRow {
                    emission_rate: row.get(0)?,
                    acc_per_share: row.get(1)?,
                    total_shares: row.get(2)?,
                    remaining_budget: row.get(3)?,
                    outstanding: row.get(4)?,
                    last_updated: row.get(5)?,
                    budget_mode: row.get(6)?,
                })
            },
        )
        .optional()?
        .ok_or_else(|| DbError::PoolNotFound(pool_key.to_string()))?;
    row.into_snapshot()
}

/// All pool keys, sorted.
pub fn list_keys(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT pool_key FROM pools ORDER BY pool_key")?;
    let keys = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use accrue_types::SCALE;

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    fn sample() -> PoolSnapshot {
        PoolSnapshot {
            emission_rate: 100,
            acc_per_share: 225 * SCALE,
            total_shares: 8,
            remaining_budget: u128::MAX - 1,
            outstanding: 2_000,
            last_updated: 20,
            budget_mode: BudgetMode::CustodyBalance,
        }
    }

    #[test]
    fn test_upsert_and_get() {
        let conn = test_db();
        upsert(&conn, "main", &sample()).expect("upsert");
        assert_eq!(get(&conn, "main").expect("get"), sample());
    }

    #[test]
    fn test_upsert_replaces() {
        let conn = test_db();
        upsert(&conn, "main", &sample()).expect("insert");
        let mut changed = sample();
        changed.emission_rate = 7;
        upsert(&conn, "main", &changed).expect("update");
        assert_eq!(get(&conn, "main").expect("get").emission_rate, 7);
        assert_eq!(list_keys(&conn).expect("keys"), vec!["main".to_string()]);
    }

    #[test]
    fn test_get_missing() {
        let conn = test_db();
        assert!(matches!(get(&conn, "nope"), Err(DbError::PoolNotFound(_))));
    }

    #[test]
    fn test_corrupt_amount_rejected() {
        let conn = test_db();
        upsert(&conn, "main", &sample()).expect("upsert");
        conn.execute("UPDATE pools SET total_shares = 'lots'", [])
            .expect("corrupt");
        assert!(matches!(
            get(&conn, "main"),
            Err(DbError::InvalidColumn {
                column: "total_shares",
                ..
            })
        ));
    }
}
