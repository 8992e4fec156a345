//! # accrue-types
//!
//! Shared domain types used across the accrue workspace.
//!
//! - [`pool`]: pool and account snapshots, budget modes
//! - [`events`]: ledger events raised after every mutating operation

pub mod events;
pub mod pool;

pub use events::{LedgerEvent, Operation};
pub use pool::{AccountSnapshot, BudgetMode, PoolRecord, PoolSnapshot};

/// Stake, reward and share quantities.
pub type Amount = u128;

/// Abstract time units supplied by the clock collaborator.
pub type Timestamp = u64;

/// Fixed-point scale of the per-share accumulator and of the debt fraction (1e18).
pub const SCALE: u128 = 1_000_000_000_000_000_000;

/// Signed view of [`SCALE`], for splitting debts stored at full precision.
pub const SCALE_I128: i128 = SCALE as i128;
