//! # accrue-ledger
//!
//! Proportional reward distribution over a pool of stakers.
//!
//! Every pool keeps a lazily advanced reward-per-share accumulator. Every
//! account keeps its shares and a signed debt offset against that
//! accumulator, so stake changes and claims cost O(1) regardless of how
//! many accounts a pool holds.
//!
//! ## Modules
//!
//! - [`accumulator`]: pool accumulator and catch-up
//! - [`account`]: per-account stake, unstake and claim arithmetic
//! - [`math`]: 256-bit fixed-point products
//! - [`ledger`]: multi-pool ledger, pool lifecycle, solvency audit
//! - [`single`]: single-pool shape over the same ledger
//! - [`transfer`]: value-transfer collaborator and an in-memory token
//! - [`clock`]: clock collaborator
//! - [`sink`]: event sink collaborator

pub mod account;
pub mod accumulator;
pub mod clock;
pub mod ledger;
pub mod math;
pub mod single;
pub mod sink;
pub mod transfer;

pub use account::AccountEntry;
pub use accumulator::{Accrual, PoolState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use ledger::{EmergencyExit, Ledger, SolvencyReport};
pub use single::SinglePool;
pub use sink::{EventSink, NoopSink};
pub use transfer::{InMemoryToken, ValueTransfer};

use accrue_types::{Amount, Timestamp};

/// Error types for ledger operations.
///
/// Every mutating operation is all-or-nothing: when one of these is
/// returned, no pool, account or collaborator state has changed.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// A pool with this identity is already initialized.
    #[error("pool already exists: {0}")]
    PoolAlreadyExists(String),

    /// The pool was never created.
    #[error("pool not found: {0}")]
    PoolNotFound(String),

    /// Unstaking more than the account holds.
    #[error("insufficient stake: requested {requested}, staked {staked}")]
    InsufficientStake {
        /// Amount asked for.
        requested: Amount,
        /// Amount currently staked.
        staked: Amount,
    },

    /// Stake, unstake and fund amounts must be positive.
    #[error("amount must be non-zero")]
    ZeroAmount,

    /// The value-transfer collaborator refused the move.
    #[error("value transfer failed: {0}")]
    Transfer(#[from] TransferError),

    /// Pending reward came out negative, or pool totals disagree with an
    /// account. Indicates a missed catch-up, overflow or rate bug.
    #[error("accounting invariant violated: {0}")]
    AccountingInvariantViolation(String),

    /// Arithmetic overflow in fixed-point math.
    #[error("arithmetic overflow")]
    Overflow,

    /// The clock reported a time before the pool's last update.
    #[error("clock went backwards: last update at {last}, now {now}")]
    ClockWentBackwards {
        /// The pool's last recorded update.
        last: Timestamp,
        /// The time reported by the clock.
        now: Timestamp,
    },
}

/// Error types for value-transfer collaborators.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    /// The source holds less than the requested amount.
    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance {
        /// Amount requested.
        needed: Amount,
        /// Amount the source holds.
        available: Amount,
    },

    /// The move was refused for a reason other than balance.
    #[error("transfer rejected: {0}")]
    Rejected(String),
}

/// Convenience result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
