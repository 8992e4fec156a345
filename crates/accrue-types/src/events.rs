//! Ledger events for external auditing and indexing.
//!
//! One [`LedgerEvent::PoolStateChanged`] and, for account-level operations,
//! one [`LedgerEvent::AccountStateChanged`] are raised after every successful
//! mutating operation. Failed operations raise nothing.

use serde::{Deserialize, Serialize};

use crate::pool::{AccountSnapshot, PoolSnapshot};
use crate::{Amount, Timestamp};

/// The operation that produced an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CreatePool,
    SetEmissionRate,
    FundReward,
    Stake,
    Unstake,
    Claim,
    EmergencyUnstake,
    CatchUp,
}

impl Operation {
    /// Stable lowercase name, used for persistence and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::CreatePool => "create_pool",
            Operation::SetEmissionRate => "set_emission_rate",
            Operation::FundReward => "fund_reward",
            Operation::Stake => "stake",
            Operation::Unstake => "unstake",
            Operation::Claim => "claim",
            Operation::EmergencyUnstake => "emergency_unstake",
            Operation::CatchUp => "catch_up",
        }
    }
}

/// Event envelope.
///
/// Externally tagged so that 128-bit amounts survive a JSON round-trip.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEvent<P, A> {
    /// Pool accumulator, rate or shares changed.
    PoolStateChanged {
        pool: P,
        operation: Operation,
        timestamp: Timestamp,
        snapshot: PoolSnapshot,
    },
    /// An account's shares or debt changed.
    AccountStateChanged {
        pool: P,
        account: A,
        operation: Operation,
        timestamp: Timestamp,
        snapshot: AccountSnapshot,
        /// Reward paid to the account by this operation.
        paid: Amount,
    },
}

impl<P, A> LedgerEvent<P, A> {
    /// Event kind name.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerEvent::PoolStateChanged { .. } => "pool_state_changed",
            LedgerEvent::AccountStateChanged { .. } => "account_state_changed",
        }
    }

    pub fn pool(&self) -> &P {
        match self {
            LedgerEvent::PoolStateChanged { pool, .. } => pool,
            LedgerEvent::AccountStateChanged { pool, .. } => pool,
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            LedgerEvent::PoolStateChanged { operation, .. } => *operation,
            LedgerEvent::AccountStateChanged { operation, .. } => *operation,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        match self {
            LedgerEvent::PoolStateChanged { timestamp, .. } => *timestamp,
            LedgerEvent::AccountStateChanged { timestamp, .. } => *timestamp,
        }
    }
}
