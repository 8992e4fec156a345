//! Single-pool shape.
//!
//! One pool per instance with an implicit identity. This is the same
//! ledger keyed by `()`, so the accrual rules are shared with the
//! multi-pool shape.

use std::fmt::Debug;

use accrue_types::{AccountSnapshot, Amount, BudgetMode, PoolSnapshot};

use crate::accumulator::Accrual;
use crate::clock::Clock;
use crate::ledger::{EmergencyExit, Ledger, SolvencyReport};
use crate::sink::EventSink;
use crate::transfer::ValueTransfer;
use crate::Result;

/// A ledger holding exactly one pool.
pub struct SinglePool<A, T, C, S> {
    inner: Ledger<(), A, T, C, S>,
}

impl<A, T, C, S> SinglePool<A, T, C, S>
where
    A: Ord + Clone + Debug,
    T: ValueTransfer<A>,
    C: Clock,
    S: EventSink<(), A>,
{
    /// Create the pool at the clock's current time.
    pub fn new(
        emission_rate: Amount,
        budget_mode: BudgetMode,
        stake: T,
        reward: T,
        clock: C,
        sink: S,
    ) -> Result<Self> {
        let mut inner = Ledger::new(clock, sink);
        inner.create_pool((), emission_rate, budget_mode, stake, reward)?;
        Ok(Self { inner })
    }

    pub fn set_emission_rate(&mut self, emission_rate: Amount) -> Result<()> {
        self.inner.set_emission_rate(&(), emission_rate)
    }

    pub fn fund_reward(&mut self, from: &A, amount: Amount) -> Result<()> {
        self.inner.fund_reward(from, &(), amount)
    }

    pub fn stake(&mut self, account: &A, amount: Amount) -> Result<()> {
        self.inner.stake(account, &(), amount)
    }

    pub fn unstake(&mut self, account: &A, amount: Amount) -> Result<()> {
        self.inner.unstake(account, &(), amount)
    }

    pub fn claim(&mut self, account: &A) -> Result<Amount> {
        self.inner.claim(account, &())
    }

    /// See [`Ledger::emergency_unstake`]: pending reward is forfeited.
    pub fn emergency_unstake(&mut self, account: &A) -> Result<EmergencyExit> {
        self.inner.emergency_unstake(account, &())
    }

    pub fn catch_up(&mut self) -> Result<Accrual> {
        self.inner.catch_up(&())
    }

    pub fn pending_reward(&self, account: &A) -> Result<Amount> {
        self.inner.pending_reward(&(), account)
    }

    pub fn preview_accumulator(&self) -> Result<Amount> {
        self.inner.preview_accumulator(&())
    }

    pub fn pool(&self) -> Result<PoolSnapshot> {
        self.inner.pool(&())
    }

    pub fn account(&self, account: &A) -> Result<AccountSnapshot> {
        self.inner.account(&(), account)
    }

    pub fn audit(&self) -> Result<SolvencyReport> {
        self.inner.audit(&())
    }

    /// The underlying ledger.
    pub fn ledger(&self) -> &Ledger<(), A, T, C, S> {
        &self.inner
    }
}
