//! Whole-ledger snapshots.
//!
//! A save replaces the stored pools and accounts in one transaction, so a
//! reader never sees half of a snapshot.

use rusqlite::Connection;

use accrue_types::PoolRecord;

use crate::queries::{accounts, pools};
use crate::Result;

/// Persist every pool and its accounts atomically.
pub fn save(conn: &mut Connection, records: &[PoolRecord<String, String>]) -> Result<()> {
    let tx = conn.transaction()?;
    for record in records {
        pools::upsert(&tx, &record.id, &record.pool)?;
        accounts::delete_for_pool(&tx, &record.id)?;
        for (account_key, account) in &record.accounts {
            accounts::upsert(&tx, &record.id, account_key, account)?;
        }
    }
    tx.commit()?;

    tracing::debug!(pools = records.len(), "ledger snapshot saved");
    Ok(())
}

/// Load every stored pool with its accounts, sorted by key.
pub fn load(conn: &Connection) -> Result<Vec<PoolRecord<String, String>>> {
    pools::list_keys(conn)?
        .into_iter()
        .map(|id| {
            let pool = pools::get(conn, &id)?;
            let accounts = accounts::list_for_pool(conn, &id)?;
            Ok(PoolRecord { id, pool, accounts })
        })
        .collect()
}
