//! Pool and account state snapshots.
//!
//! Snapshots are plain data: the accrual rules live in `accrue-ledger`.
//! They are what events carry, what the database stores, and what a
//! ledger is restored from.

use serde::{Deserialize, Serialize};

use crate::{Amount, Timestamp};

/// Where a pool's available reward budget comes from during catch-up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetMode {
    /// Funded reward is counted in `remaining_budget` and drawn down as it accrues.
    #[default]
    Tracked,
    /// Available reward is the custody balance of the reward resource minus
    /// reward already accrued to stakers.
    CustodyBalance,
}

impl BudgetMode {
    /// Stable lowercase name, used for persistence.
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetMode::Tracked => "tracked",
            BudgetMode::CustodyBalance => "custody_balance",
        }
    }

    /// Parse the name produced by [`BudgetMode::as_str`].
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "tracked" => Some(BudgetMode::Tracked),
            "custody_balance" => Some(BudgetMode::CustodyBalance),
            _ => None,
        }
    }
}

/// Point-in-time view of a pool accumulator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    /// Reward units emitted per time unit.
    pub emission_rate: Amount,
    /// Cumulative reward per share, scaled by [`crate::SCALE`].
    pub acc_per_share: Amount,
    /// Sum of all accounts' shares.
    pub total_shares: Amount,
    /// Funded reward not yet accrued (tracked mode only).
    pub remaining_budget: Amount,
    /// Reward accrued into the accumulator and not yet paid out or forfeited.
    pub outstanding: Amount,
    /// Time of the last catch-up.
    pub last_updated: Timestamp,
    /// Budget source used by catch-up.
    pub budget_mode: BudgetMode,
}

/// Point-in-time view of one account in one pool.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Shares currently staked.
    pub shares: Amount,
    /// Reward already accounted for, in whole reward units (floor).
    pub debt: i128,
    /// Sub-unit remainder of the debt, in `1 / SCALE` steps below [`crate::SCALE`].
    #[serde(default)]
    pub debt_fraction: u64,
}

/// A pool together with every account entry it holds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRecord<P, A> {
    pub id: P,
    pub pool: PoolSnapshot,
    pub accounts: Vec<(A, AccountSnapshot)>,
}
