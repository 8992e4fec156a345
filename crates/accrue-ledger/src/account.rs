//! Per-account stake, unstake and claim arithmetic.
//!
//! An account's pending reward is recovered from the pool accumulator and
//! a signed debt offset:
//!
//! ```text
//! pending = (shares * acc_per_share - debt_scaled) / SCALE
//! debt_scaled = debt * SCALE + debt_fraction
//! ```
//!
//! The debt is kept in whole reward units plus a sub-unit fraction, so it
//! stays exact without a 256-bit field. Stake adds `amount * acc_per_share`
//! to it and unstake subtracts it, so neither changes pending reward. Every
//! method here expects `acc_per_share` to be caught up.

use accrue_types::{AccountSnapshot, Amount};

use crate::math::{mul_scaled, SCALE_U64};
use crate::{LedgerError, Result};

/// Shares and debt for one account in one pool.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountEntry {
    /// Shares currently staked.
    pub shares: Amount,
    /// Whole reward units already accounted for.
    pub debt: i128,
    /// Sub-unit part of the debt, always below `SCALE`.
    pub debt_fraction: u64,
}

fn signed(whole: Amount) -> Result<i128> {
    i128::try_from(whole).map_err(|_| LedgerError::Overflow)
}

impl AccountEntry {
    pub fn from_snapshot(snapshot: &AccountSnapshot) -> Self {
        Self {
            shares: snapshot.shares,
            debt: snapshot.debt,
            debt_fraction: snapshot.debt_fraction,
        }
    }

    pub fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot {
            shares: self.shares,
            debt: self.debt,
            debt_fraction: self.debt_fraction,
        }
    }

    /// Whether the entry holds no shares and no debt.
    pub fn is_empty(&self) -> bool {
        self.shares == 0 && self.debt == 0 && self.debt_fraction == 0
    }

    /// Debt after adding `whole * SCALE + fraction`.
    fn debt_plus(&self, whole: Amount, fraction: u64) -> Result<(i128, u64)> {
        let mut debt = self
            .debt
            .checked_add(signed(whole)?)
            .ok_or(LedgerError::Overflow)?;
        let mut sum = self.debt_fraction + fraction;
        if sum >= SCALE_U64 {
            sum -= SCALE_U64;
            debt = debt.checked_add(1).ok_or(LedgerError::Overflow)?;
        }
        Ok((debt, sum))
    }

    /// Debt after subtracting `whole * SCALE + fraction`.
    fn debt_minus(&self, whole: Amount, fraction: u64) -> Result<(i128, u64)> {
        let mut debt = self
            .debt
            .checked_sub(signed(whole)?)
            .ok_or(LedgerError::Overflow)?;
        let rest = if self.debt_fraction >= fraction {
            self.debt_fraction - fraction
        } else {
            debt = debt.checked_sub(1).ok_or(LedgerError::Overflow)?;
            self.debt_fraction + SCALE_U64 - fraction
        };
        Ok((debt, rest))
    }

    /// Pending reward as whole units and a sub-unit fraction of `SCALE`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::AccountingInvariantViolation`] if the result is negative
    /// - [`LedgerError::Overflow`] on fixed-point overflow
    pub fn pending_parts(&self, acc_per_share: Amount) -> Result<(Amount, u64)> {
        let (whole, fraction) = mul_scaled(self.shares, acc_per_share)?;
        let mut units = signed(whole)?
            .checked_sub(self.debt)
            .ok_or(LedgerError::Overflow)?;
        let rest = if fraction >= self.debt_fraction {
            fraction - self.debt_fraction
        } else {
            units = units.checked_sub(1).ok_or(LedgerError::Overflow)?;
            fraction + SCALE_U64 - self.debt_fraction
        };

        if units < 0 {
            tracing::error!(
                shares = self.shares,
                debt = self.debt,
                debt_fraction = self.debt_fraction,
                acc_per_share,
                "negative pending reward"
            );
            return Err(LedgerError::AccountingInvariantViolation(format!(
                "pending reward is negative: shares={} debt={}+{}/1e18 acc_per_share={}",
                self.shares, self.debt, self.debt_fraction, acc_per_share
            )));
        }
        // Non-negative, checked above.
        Ok((units as Amount, rest))
    }

    /// Pending reward in whole reward units.
    pub fn pending(&self, acc_per_share: Amount) -> Result<Amount> {
        Ok(self.pending_parts(acc_per_share)?.0)
    }

    /// Add `amount` shares without changing pending reward.
    pub fn stake(&mut self, amount: Amount, acc_per_share: Amount) -> Result<()> {
        let (whole, fraction) = mul_scaled(amount, acc_per_share)?;
        let (debt, debt_fraction) = self.debt_plus(whole, fraction)?;
        let shares = self.shares.checked_add(amount).ok_or(LedgerError::Overflow)?;
        self.debt = debt;
        self.debt_fraction = debt_fraction;
        self.shares = shares;
        Ok(())
    }

    /// Remove `amount` shares without changing pending reward.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InsufficientStake`] if `amount` exceeds the staked shares
    /// - [`LedgerError::Overflow`] on fixed-point overflow
    pub fn unstake(&mut self, amount: Amount, acc_per_share: Amount) -> Result<()> {
        if amount > self.shares {
            return Err(LedgerError::InsufficientStake {
                requested: amount,
                staked: self.shares,
            });
        }
        let (whole, fraction) = mul_scaled(amount, acc_per_share)?;
        let (debt, debt_fraction) = self.debt_minus(whole, fraction)?;
        self.debt = debt;
        self.debt_fraction = debt_fraction;
        self.shares -= amount;
        Ok(())
    }

    /// Settle pending reward: returns the whole units to pay and moves them
    /// into the debt so that pending reads zero afterwards.
    ///
    /// The sub-unit remainder stays with the account.
    pub fn settle(&mut self, acc_per_share: Amount) -> Result<Amount> {
        let (units, _) = self.pending_parts(acc_per_share)?;
        self.debt = self
            .debt
            .checked_add(signed(units)?)
            .ok_or(LedgerError::Overflow)?;
        Ok(units)
    }

    /// Zero shares and debt.
    pub fn reset(&mut self) {
        self.shares = 0;
        self.debt = 0;
        self.debt_fraction = 0;
    }
}
