//! Pool accumulator.
//!
//! Tracks cumulative reward per unit of stake, scaled by [`SCALE`], and
//! advances it lazily whenever the pool is touched.
//!
//! ## Formula
//!
//! ```text
//! emission      = min(elapsed * emission_rate, available_budget)
//! acc_per_share += emission * SCALE / total_shares
//! ```
//!
//! With no stakers the window is skipped: time advances, nothing accrues,
//! and the budget is left untouched.

use accrue_types::{Amount, BudgetMode, PoolSnapshot, Timestamp, SCALE};

use crate::math::mul_div;
use crate::{LedgerError, Result};

/// Mutable accumulator state for one pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolState {
    /// Reward units emitted per time unit.
    pub emission_rate: Amount,
    /// Cumulative reward per share, scaled by [`SCALE`].
    pub acc_per_share: Amount,
    /// Sum of all accounts' shares.
    pub total_shares: Amount,
    /// Funded reward not yet accrued (tracked mode only).
    pub remaining_budget: Amount,
    /// Reward accrued and not yet paid out or forfeited.
    pub outstanding: Amount,
    /// Time of the last catch-up.
    pub last_updated: Timestamp,
    /// Budget source.
    pub budget_mode: BudgetMode,
}

/// Outcome of a catch-up step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Accrual {
    /// Already caught up at this instant.
    Idle,
    /// No shares were staked over the window; its emission is not accrued.
    NoStakers {
        /// Length of the skipped window.
        skipped: Timestamp,
    },
    /// Emission was folded into the accumulator.
    Accrued {
        /// Reward units accrued (already capped by the budget).
        emission: Amount,
    },
}

impl PoolState {
    /// Fresh pool state starting at `now`.
    pub fn new(emission_rate: Amount, budget_mode: BudgetMode, now: Timestamp) -> Self {
        Self {
            emission_rate,
            acc_per_share: 0,
            total_shares: 0,
            remaining_budget: 0,
            outstanding: 0,
            last_updated: now,
            budget_mode,
        }
    }

    /// Restore state from a persisted snapshot.
    pub fn from_snapshot(snapshot: &PoolSnapshot) -> Self {
        Self {
            emission_rate: snapshot.emission_rate,
            acc_per_share: snapshot.acc_per_share,
            total_shares: snapshot.total_shares,
            remaining_budget: snapshot.remaining_budget,
            outstanding: snapshot.outstanding,
            last_updated: snapshot.last_updated,
            budget_mode: snapshot.budget_mode,
        }
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            emission_rate: self.emission_rate,
            acc_per_share: self.acc_per_share,
            total_shares: self.total_shares,
            remaining_budget: self.remaining_budget,
            outstanding: self.outstanding,
            last_updated: self.last_updated,
            budget_mode: self.budget_mode,
        }
    }

    /// Reward that may still be accrued.
    ///
    /// `custody_balance` is the reward resource held by the pool; it is only
    /// consulted in [`BudgetMode::CustodyBalance`], where reward already owed
    /// to stakers is subtracted from it.
    pub fn available_budget(&self, custody_balance: Amount) -> Amount {
        match self.budget_mode {
            BudgetMode::Tracked => self.remaining_budget,
            BudgetMode::CustodyBalance => custody_balance.saturating_sub(self.outstanding),
        }
    }

    /// Compute the step from `last_updated` to `now` without applying it.
    ///
    /// Returns the accrual outcome and the accumulator increment.
    fn step(&self, now: Timestamp, custody_balance: Amount) -> Result<(Accrual, Amount)> {
        if now < self.last_updated {
            return Err(LedgerError::ClockWentBackwards {
                last: self.last_updated,
                now,
            });
        }
        if now == self.last_updated {
            return Ok((Accrual::Idle, 0));
        }

        let elapsed = now - self.last_updated;
        if self.total_shares == 0 {
            return Ok((Accrual::NoStakers { skipped: elapsed }, 0));
        }

        // Saturate: the budget cap below bounds the result anyway.
        let raw_emission = Amount::from(elapsed).saturating_mul(self.emission_rate);
        let emission = raw_emission.min(self.available_budget(custody_balance));
        let increment = mul_div(emission, SCALE, self.total_shares)?;

        Ok((Accrual::Accrued { emission }, increment))
    }

    /// Advance the accumulator to `now`.
    ///
    /// Idempotent within an instant. On error nothing is modified.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::ClockWentBackwards`] if `now` precedes the last update
    /// - [`LedgerError::Overflow`] on fixed-point overflow
    pub fn catch_up(&mut self, now: Timestamp, custody_balance: Amount) -> Result<Accrual> {
        let (accrual, increment) = self.step(now, custody_balance)?;

        match accrual {
            Accrual::Idle => return Ok(accrual),
            Accrual::NoStakers { skipped } => {
                tracing::debug!(skipped, now, "no stakers, emission window skipped");
            }
            Accrual::Accrued { emission } => {
                let acc_per_share = self
                    .acc_per_share
                    .checked_add(increment)
                    .ok_or(LedgerError::Overflow)?;
                let outstanding = self
                    .outstanding
                    .checked_add(emission)
                    .ok_or(LedgerError::Overflow)?;
                if self.budget_mode == BudgetMode::Tracked {
                    // emission <= remaining_budget by construction
                    self.remaining_budget -= emission;
                }
                self.acc_per_share = acc_per_share;
                self.outstanding = outstanding;

                tracing::trace!(
                    emission,
                    increment,
                    acc_per_share,
                    now,
                    "accumulator advanced"
                );
            }
        }

        self.last_updated = now;
        Ok(accrual)
    }

    /// The accumulator value a catch-up to `now` would produce.
    pub fn preview(&self, now: Timestamp, custody_balance: Amount) -> Result<Amount> {
        let (_, increment) = self.step(now, custody_balance)?;
        self.acc_per_share
            .checked_add(increment)
            .ok_or(LedgerError::Overflow)
    }

    /// Record newly funded reward. Does not touch the accumulator.
    pub fn fund(&mut self, amount: Amount) -> Result<()> {
        if self.budget_mode == BudgetMode::Tracked {
            self.remaining_budget = self
                .remaining_budget
                .checked_add(amount)
                .ok_or(LedgerError::Overflow)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn funded_pool(rate: Amount, budget: Amount, shares: Amount) -> PoolState {
        let mut pool = PoolState::new(rate, BudgetMode::Tracked, 0);
        pool.remaining_budget = budget;
        pool.total_shares = shares;
        pool
    }

    #[test]
    fn test_catch_up_accrues_emission() {
        let mut pool = funded_pool(100, 10_000, 10);
        let accrual = pool.catch_up(10, 0).expect("catch up");
        assert_eq!(accrual, Accrual::Accrued { emission: 1_000 });
        assert_eq!(pool.acc_per_share, 100 * SCALE);
        assert_eq!(pool.remaining_budget, 9_000);
        assert_eq!(pool.outstanding, 1_000);
        assert_eq!(pool.last_updated, 10);
    }

    #[test]
    fn test_catch_up_idempotent() {
        let mut pool = funded_pool(100, 10_000, 10);
        pool.catch_up(10, 0).expect("first");
        let before = pool.clone();
        let accrual = pool.catch_up(10, 0).expect("second");
        assert_eq!(accrual, Accrual::Idle);
        assert_eq!(pool, before);
    }

    #[test]
    fn test_catch_up_capped_by_budget() {
        let mut pool = funded_pool(100, 250, 5);
        let accrual = pool.catch_up(10, 0).expect("catch up");
        assert_eq!(accrual, Accrual::Accrued { emission: 250 });
        assert_eq!(pool.remaining_budget, 0);
        assert_eq!(pool.acc_per_share, 50 * SCALE);

        // Budget exhausted: time advances, nothing more accrues.
        let accrual = pool.catch_up(20, 0).expect("catch up");
        assert_eq!(accrual, Accrual::Accrued { emission: 0 });
        assert_eq!(pool.acc_per_share, 50 * SCALE);
        assert_eq!(pool.last_updated, 20);
    }

    #[test]
    fn test_catch_up_no_stakers_skips_window() {
        let mut pool = funded_pool(100, 10_000, 0);
        let accrual = pool.catch_up(30, 0).expect("catch up");
        assert_eq!(accrual, Accrual::NoStakers { skipped: 30 });
        assert_eq!(pool.acc_per_share, 0);
        assert_eq!(pool.remaining_budget, 10_000);
        assert_eq!(pool.last_updated, 30);
    }

    #[test]
    fn test_catch_up_rejects_backwards_clock() {
        let mut pool = funded_pool(100, 10_000, 10);
        pool.catch_up(10, 0).expect("catch up");
        let result = pool.catch_up(5, 0);
        assert!(matches!(
            result,
            Err(LedgerError::ClockWentBackwards { last: 10, now: 5 })
        ));
        assert_eq!(pool.last_updated, 10);
    }

    #[test]
    fn test_custody_balance_budget_excludes_outstanding() {
        let mut pool = PoolState::new(100, BudgetMode::CustodyBalance, 0);
        pool.total_shares = 4;
        pool.outstanding = 300;
        assert_eq!(pool.available_budget(1_000), 700);
        assert_eq!(pool.available_budget(200), 0);

        let accrual = pool.catch_up(10, 1_000).expect("catch up");
        assert_eq!(accrual, Accrual::Accrued { emission: 700 });
        assert_eq!(pool.outstanding, 1_000);
        assert_eq!(pool.remaining_budget, 0);
    }

    #[test]
    fn test_preview_matches_catch_up_without_mutation() {
        let mut pool = funded_pool(7, 10_000, 3);
        let preview = pool.preview(13, 0).expect("preview");
        assert_eq!(pool.last_updated, 0);
        assert_eq!(pool.acc_per_share, 0);

        pool.catch_up(13, 0).expect("catch up");
        assert_eq!(pool.acc_per_share, preview);
    }

    #[test]
    fn test_rate_zero_accrues_nothing() {
        let mut pool = funded_pool(0, 10_000, 3);
        let accrual = pool.catch_up(100, 0).expect("catch up");
        assert_eq!(accrual, Accrual::Accrued { emission: 0 });
        assert_eq!(pool.acc_per_share, 0);
    }

    #[test]
    fn test_fund_only_counts_in_tracked_mode() {
        let mut tracked = PoolState::new(1, BudgetMode::Tracked, 0);
        tracked.fund(500).expect("fund");
        assert_eq!(tracked.remaining_budget, 500);

        let mut custody = PoolState::new(1, BudgetMode::CustodyBalance, 0);
        custody.fund(500).expect("fund");
        assert_eq!(custody.remaining_budget, 0);
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let mut pool = funded_pool(100, 10_000, 10);
        pool.catch_up(10, 0).expect("catch up");
        let restored = PoolState::from_snapshot(&pool.snapshot());
        assert_eq!(restored, pool);
    }
}
