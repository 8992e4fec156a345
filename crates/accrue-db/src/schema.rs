//! SQL schema definitions.

/// Schema v1.
pub const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS pools (
    pool_key TEXT PRIMARY KEY,
    emission_rate TEXT NOT NULL,
    acc_per_share TEXT NOT NULL,
    total_shares TEXT NOT NULL,
    remaining_budget TEXT NOT NULL,
    outstanding TEXT NOT NULL,
    last_updated INTEGER NOT NULL,
    budget_mode TEXT NOT NULL CHECK (budget_mode IN ('tracked', 'custody_balance'))
);

CREATE TABLE IF NOT EXISTS accounts (
    pool_key TEXT NOT NULL REFERENCES pools(pool_key) ON DELETE CASCADE,
    account_key TEXT NOT NULL,
    shares TEXT NOT NULL,
    debt TEXT NOT NULL,
    PRIMARY KEY (pool_key, account_key)
);

CREATE TABLE IF NOT EXISTS ledger_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    pool_key TEXT NOT NULL,
    operation TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    payload TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_ledger_events_pool ON ledger_events(pool_key, timestamp);
"#;

/// Schema v2: account debt split into whole units and a sub-unit fraction.
///
/// Existing `debt` values are rewritten by the migration step.
pub const SCHEMA_V2: &str = r#"
ALTER TABLE accounts ADD COLUMN debt_fraction INTEGER NOT NULL DEFAULT 0
    CHECK (debt_fraction >= 0 AND debt_fraction < 1000000000000000000);
"#;
