//! Multi-pool ledger.
//!
//! Pools are keyed by an identity `P` and fully independent of each other.
//! Every mutating operation follows the same shape:
//!
//! 1. catch the pool accumulator up to the clock, on a copy
//! 2. apply the account delta, on a copy
//! 3. call the value-transfer collaborator
//! 4. commit both copies and raise events
//!
//! A failure at any step returns before step 4, so nothing observable
//! changes. No operation iterates over accounts except [`Ledger::audit`].

use std::collections::BTreeMap;
use std::fmt::Debug;

use serde::Serialize;

use accrue_types::{
    AccountSnapshot, Amount, BudgetMode, LedgerEvent, Operation, PoolRecord, PoolSnapshot,
    Timestamp, SCALE,
};

use crate::account::AccountEntry;
use crate::accumulator::{Accrual, PoolState};
use crate::clock::Clock;
use crate::sink::EventSink;
use crate::transfer::ValueTransfer;
use crate::{LedgerError, Result};

struct PoolEntry<A, T> {
    state: PoolState,
    accounts: BTreeMap<A, AccountEntry>,
    stake: T,
    reward: T,
}

/// Result of an emergency unstake.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct EmergencyExit {
    /// Stake returned to the account.
    pub returned: Amount,
    /// Pending reward destroyed by the exit.
    pub forfeited: Amount,
}

/// Outcome of [`Ledger::audit`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SolvencyReport {
    /// Number of account entries in the pool.
    pub accounts: usize,
    /// Sum of every account's pending reward at the current time.
    pub total_pending: Amount,
    /// Reward accrued and not yet paid out.
    pub outstanding: Amount,
    /// Reward resource held in pool custody.
    pub custody_reward: Amount,
    /// Custody needed to cover `outstanding` plus any tracked budget.
    pub required_custody: Amount,
    /// Whether the account shares add up to the pool's total.
    pub shares_consistent: bool,
}

impl SolvencyReport {
    pub fn is_solvent(&self) -> bool {
        self.shares_consistent
            && self.total_pending <= self.outstanding
            && self.custody_reward >= self.required_custody
    }
}

/// Reward-distribution ledger over any number of pools.
pub struct Ledger<P, A, T, C, S> {
    pools: BTreeMap<P, PoolEntry<A, T>>,
    clock: C,
    sink: S,
}

fn entry_mut<'a, P, A, T>(
    pools: &'a mut BTreeMap<P, PoolEntry<A, T>>,
    id: &P,
) -> Result<&'a mut PoolEntry<A, T>>
where
    P: Ord + Debug,
{
    pools
        .get_mut(id)
        .ok_or_else(|| LedgerError::PoolNotFound(format!("{id:?}")))
}

fn pool_event<P: Clone, A>(
    id: &P,
    operation: Operation,
    timestamp: Timestamp,
    state: &PoolState,
) -> LedgerEvent<P, A> {
    LedgerEvent::PoolStateChanged {
        pool: id.clone(),
        operation,
        timestamp,
        snapshot: state.snapshot(),
    }
}

fn account_event<P: Clone, A: Clone>(
    id: &P,
    account: &A,
    operation: Operation,
    timestamp: Timestamp,
    entry: &AccountEntry,
    paid: Amount,
) -> LedgerEvent<P, A> {
    LedgerEvent::AccountStateChanged {
        pool: id.clone(),
        account: account.clone(),
        operation,
        timestamp,
        snapshot: entry.snapshot(),
        paid,
    }
}

impl<P, A, T, C, S> Ledger<P, A, T, C, S>
where
    P: Ord + Clone + Debug,
    A: Ord + Clone + Debug,
    T: ValueTransfer<A>,
    C: Clock,
    S: EventSink<P, A>,
{
    /// Create an empty ledger.
    pub fn new(clock: C, sink: S) -> Self {
        Self {
            pools: BTreeMap::new(),
            clock,
            sink,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Identities of every pool, in order.
    pub fn pool_ids(&self) -> impl Iterator<Item = &P> {
        self.pools.keys()
    }

    fn entry(&self, id: &P) -> Result<&PoolEntry<A, T>> {
        self.pools
            .get(id)
            .ok_or_else(|| LedgerError::PoolNotFound(format!("{id:?}")))
    }

    /// Create a pool starting at the current time.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::PoolAlreadyExists`] if `id` is already initialized
    pub fn create_pool(
        &mut self,
        id: P,
        emission_rate: Amount,
        budget_mode: BudgetMode,
        stake: T,
        reward: T,
    ) -> Result<()> {
        if self.pools.contains_key(&id) {
            return Err(LedgerError::PoolAlreadyExists(format!("{id:?}")));
        }

        let now = self.clock.now();
        let state = PoolState::new(emission_rate, budget_mode, now);

        tracing::info!(pool = ?id, emission_rate, ?budget_mode, now, "pool created");

        self.sink
            .emit(pool_event(&id, Operation::CreatePool, now, &state));
        self.pools.insert(
            id,
            PoolEntry {
                state,
                accounts: BTreeMap::new(),
                stake,
                reward,
            },
        );
        Ok(())
    }

    /// Change the emission rate.
    ///
    /// The pool is caught up under the old rate first, so the change only
    /// affects time after it.
    pub fn set_emission_rate(&mut self, id: &P, emission_rate: Amount) -> Result<()> {
        let now = self.clock.now();
        let entry = entry_mut(&mut self.pools, id)?;

        let mut state = entry.state.clone();
        state.catch_up(now, entry.reward.custody_balance())?;
        let previous = state.emission_rate;
        state.emission_rate = emission_rate;

        entry.state = state;
        tracing::info!(pool = ?id, previous, emission_rate, now, "emission rate changed");
        self.sink
            .emit(pool_event(id, Operation::SetEmissionRate, now, &entry.state));
        Ok(())
    }

    /// Move `amount` of reward from `from` into pool custody.
    ///
    /// Does not catch up and does not alter the accumulator.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::ZeroAmount`] if `amount` is zero
    /// - [`LedgerError::PoolNotFound`] if the pool does not exist
    /// - [`LedgerError::Transfer`] if the reward collaborator refuses
    pub fn fund_reward(&mut self, from: &A, id: &P, amount: Amount) -> Result<()> {
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        let now = self.clock.now();
        let entry = entry_mut(&mut self.pools, id)?;

        let mut state = entry.state.clone();
        state.fund(amount)?;
        entry.reward.transfer_into(from, amount)?;

        entry.state = state;
        tracing::info!(
            pool = ?id,
            from = ?from,
            amount,
            remaining_budget = entry.state.remaining_budget,
            "reward funded"
        );
        self.sink
            .emit(pool_event(id, Operation::FundReward, now, &entry.state));
        Ok(())
    }

    /// Stake `amount` for `account`.
    ///
    /// New stake earns only for time after this call. The account entry is
    /// created on first stake.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::ZeroAmount`] if `amount` is zero
    /// - [`LedgerError::PoolNotFound`] if the pool does not exist
    /// - [`LedgerError::Transfer`] if the stake collaborator refuses
    /// - [`LedgerError::Overflow`] on fixed-point overflow
    pub fn stake(&mut self, account: &A, id: &P, amount: Amount) -> Result<()> {
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        let now = self.clock.now();
        let entry = entry_mut(&mut self.pools, id)?;

        let mut state = entry.state.clone();
        state.catch_up(now, entry.reward.custody_balance())?;
        let mut acct = entry.accounts.get(account).cloned().unwrap_or_default();
        acct.stake(amount, state.acc_per_share)?;
        state.total_shares = state
            .total_shares
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;

        entry.stake.transfer_into(account, amount)?;

        entry.state = state;
        entry.accounts.insert(account.clone(), acct.clone());
        tracing::info!(
            pool = ?id,
            account = ?account,
            amount,
            shares = acct.shares,
            total_shares = entry.state.total_shares,
            "stake applied"
        );
        self.sink
            .emit(pool_event(id, Operation::Stake, now, &entry.state));
        self.sink
            .emit(account_event(id, account, Operation::Stake, now, &acct, 0));
        Ok(())
    }

    /// Unstake `amount` for `account`, returning it from custody.
    ///
    /// Pending reward is preserved for a later claim.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::ZeroAmount`] if `amount` is zero
    /// - [`LedgerError::InsufficientStake`] if `amount` exceeds the account's shares
    /// - [`LedgerError::Transfer`] if the stake collaborator refuses
    pub fn unstake(&mut self, account: &A, id: &P, amount: Amount) -> Result<()> {
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        let now = self.clock.now();
        let entry = entry_mut(&mut self.pools, id)?;

        let Some(mut acct) = entry.accounts.get(account).cloned() else {
            return Err(LedgerError::InsufficientStake {
                requested: amount,
                staked: 0,
            });
        };

        let mut state = entry.state.clone();
        state.catch_up(now, entry.reward.custody_balance())?;
        acct.unstake(amount, state.acc_per_share)?;
        state.total_shares = state.total_shares.checked_sub(amount).ok_or_else(|| {
            LedgerError::AccountingInvariantViolation(format!(
                "pool total shares {} below account unstake {}",
                state.total_shares, amount
            ))
        })?;

        entry.stake.transfer_out_of(account, amount)?;

        entry.state = state;
        entry.accounts.insert(account.clone(), acct.clone());
        tracing::info!(
            pool = ?id,
            account = ?account,
            amount,
            shares = acct.shares,
            total_shares = entry.state.total_shares,
            "unstake applied"
        );
        self.sink
            .emit(pool_event(id, Operation::Unstake, now, &entry.state));
        self.sink
            .emit(account_event(id, account, Operation::Unstake, now, &acct, 0));
        Ok(())
    }

    /// Pay `account` its full pending reward and reset its baseline.
    ///
    /// Claiming with nothing pending succeeds and moves nothing. Returns the
    /// amount paid.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::AccountingInvariantViolation`] if pending reward is negative
    /// - [`LedgerError::Transfer`] if the reward collaborator refuses
    pub fn claim(&mut self, account: &A, id: &P) -> Result<Amount> {
        let now = self.clock.now();
        let entry = entry_mut(&mut self.pools, id)?;

        let mut state = entry.state.clone();
        state.catch_up(now, entry.reward.custody_balance())?;

        let Some(mut acct) = entry.accounts.get(account).cloned() else {
            entry.state = state;
            tracing::debug!(pool = ?id, account = ?account, "claim by unknown account");
            self.sink
                .emit(pool_event(id, Operation::Claim, now, &entry.state));
            return Ok(0);
        };

        let paid = acct.settle(state.acc_per_share)?;
        state.outstanding = state.outstanding.checked_sub(paid).ok_or_else(|| {
            tracing::error!(pool = ?id, paid, outstanding = state.outstanding, "claim exceeds accrued reward");
            LedgerError::AccountingInvariantViolation(format!(
                "claim of {} exceeds outstanding reward {}",
                paid, state.outstanding
            ))
        })?;

        if paid > 0 {
            entry.reward.transfer_out_of(account, paid)?;
        }

        entry.state = state;
        entry.accounts.insert(account.clone(), acct.clone());
        tracing::info!(pool = ?id, account = ?account, paid, "reward claimed");
        self.sink
            .emit(pool_event(id, Operation::Claim, now, &entry.state));
        self.sink
            .emit(account_event(id, account, Operation::Claim, now, &acct, paid));
        Ok(paid)
    }

    /// Return the account's full stake without paying any reward.
    ///
    /// **Destroys unclaimed reward.** The account's pending reward is
    /// forfeited and its entry reset to zero shares and zero debt. The pool
    /// is still caught up first when possible, so the other stakers' accrual
    /// is unaffected; if catch-up fails the exit proceeds without it.
    ///
    /// Without catch-up `last_updated` is left where it was, and the window
    /// it has not accrued yet is later divided among the remaining shares
    /// only. The exiting account receives none of it either way.
    pub fn emergency_unstake(&mut self, account: &A, id: &P) -> Result<EmergencyExit> {
        let now = self.clock.now();
        let entry = entry_mut(&mut self.pools, id)?;

        let mut state = entry.state.clone();
        if let Err(err) = state.catch_up(now, entry.reward.custody_balance()) {
            tracing::warn!(pool = ?id, %err, "emergency exit proceeding without catch-up");
            state = entry.state.clone();
        }

        let acct = entry.accounts.get(account).cloned().unwrap_or_default();
        let forfeited = match acct.pending(state.acc_per_share) {
            Ok(pending) => pending,
            Err(err) => {
                tracing::warn!(pool = ?id, account = ?account, %err, "pending reward unreadable");
                0
            }
        };
        if acct.is_empty() {
            tracing::debug!(pool = ?id, account = ?account, "emergency unstake of an empty entry");
        }
        let returned = acct.shares;

        state.total_shares = match state.total_shares.checked_sub(returned) {
            Some(total) => total,
            None => {
                tracing::warn!(
                    pool = ?id,
                    total_shares = state.total_shares,
                    returned,
                    "total shares below account shares, clamping to zero"
                );
                0
            }
        };
        state.outstanding = state.outstanding.saturating_sub(forfeited);

        if returned > 0 {
            entry.stake.transfer_out_of(account, returned)?;
        }

        entry.state = state;
        if let Some(stored) = entry.accounts.get_mut(account) {
            stored.reset();
        }
        let reset = AccountEntry::default();
        tracing::warn!(
            pool = ?id,
            account = ?account,
            returned,
            forfeited,
            "emergency unstake, pending reward forfeited"
        );
        self.sink
            .emit(pool_event(id, Operation::EmergencyUnstake, now, &entry.state));
        self.sink.emit(account_event(
            id,
            account,
            Operation::EmergencyUnstake,
            now,
            &reset,
            0,
        ));
        Ok(EmergencyExit {
            returned,
            forfeited,
        })
    }

    /// Advance the pool accumulator to the current time.
    pub fn catch_up(&mut self, id: &P) -> Result<Accrual> {
        let now = self.clock.now();
        let entry = entry_mut(&mut self.pools, id)?;

        let mut state = entry.state.clone();
        let accrual = state.catch_up(now, entry.reward.custody_balance())?;
        entry.state = state;

        if accrual != Accrual::Idle {
            self.sink
                .emit(pool_event(id, Operation::CatchUp, now, &entry.state));
        }
        Ok(accrual)
    }

    /// The accumulator value at the current time, without persisting it.
    pub fn preview_accumulator(&self, id: &P) -> Result<Amount> {
        let entry = self.entry(id)?;
        entry
            .state
            .preview(self.clock.now(), entry.reward.custody_balance())
    }

    /// Reward `account` could claim right now. Unknown accounts have none.
    pub fn pending_reward(&self, id: &P, account: &A) -> Result<Amount> {
        let entry = self.entry(id)?;
        let acc_per_share = entry
            .state
            .preview(self.clock.now(), entry.reward.custody_balance())?;
        match entry.accounts.get(account) {
            Some(acct) => acct.pending(acc_per_share),
            None => Ok(0),
        }
    }

    /// Stored pool state (not caught up).
    pub fn pool(&self, id: &P) -> Result<PoolSnapshot> {
        Ok(self.entry(id)?.state.snapshot())
    }

    /// Stored account state. Unknown accounts read as empty.
    pub fn account(&self, id: &P, account: &A) -> Result<AccountSnapshot> {
        Ok(self
            .entry(id)?
            .accounts
            .get(account)
            .map(AccountEntry::snapshot)
            .unwrap_or_default())
    }

    pub fn stake_resource(&self, id: &P) -> Result<&T> {
        Ok(&self.entry(id)?.stake)
    }

    pub fn reward_resource(&self, id: &P) -> Result<&T> {
        Ok(&self.entry(id)?.reward)
    }

    /// Check a pool's books against its custody.
    ///
    /// Walks every account, so this is for audits and tests, never for the
    /// accrual path.
    pub fn audit(&self, id: &P) -> Result<SolvencyReport> {
        let entry = self.entry(id)?;
        let custody_reward = entry.reward.custody_balance();

        let mut state = entry.state.clone();
        state.catch_up(self.clock.now(), custody_reward)?;

        let mut pending: Amount = 0;
        let mut dust: Amount = 0;
        let mut shares: Amount = 0;
        for acct in entry.accounts.values() {
            let (units, fraction) = acct.pending_parts(state.acc_per_share)?;
            pending = pending.checked_add(units).ok_or(LedgerError::Overflow)?;
            dust = dust
                .checked_add(Amount::from(fraction))
                .ok_or(LedgerError::Overflow)?;
            shares = shares.checked_add(acct.shares).ok_or(LedgerError::Overflow)?;
        }
        let total_pending = pending
            .checked_add(dust / SCALE)
            .ok_or(LedgerError::Overflow)?;

        let required_custody = match state.budget_mode {
            BudgetMode::Tracked => state.outstanding.saturating_add(state.remaining_budget),
            BudgetMode::CustodyBalance => state.outstanding,
        };

        let report = SolvencyReport {
            accounts: entry.accounts.len(),
            total_pending,
            outstanding: state.outstanding,
            custody_reward,
            required_custody,
            shares_consistent: shares == state.total_shares,
        };
        if !report.is_solvent() {
            tracing::error!(pool = ?id, ?report, "solvency audit failed");
        }
        Ok(report)
    }

    /// Snapshot every pool and account entry.
    pub fn export(&self) -> Vec<PoolRecord<P, A>> {
        self.pools
            .iter()
            .map(|(id, entry)| PoolRecord {
                id: id.clone(),
                pool: entry.state.snapshot(),
                accounts: entry
                    .accounts
                    .iter()
                    .map(|(account, acct)| (account.clone(), acct.snapshot()))
                    .collect(),
            })
            .collect()
    }

    /// Reinstate a pool from a snapshot. Raises no events.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::PoolAlreadyExists`] if the pool is already present
    pub fn restore_pool(&mut self, record: PoolRecord<P, A>, stake: T, reward: T) -> Result<()> {
        if self.pools.contains_key(&record.id) {
            return Err(LedgerError::PoolAlreadyExists(format!("{:?}", record.id)));
        }
        let accounts = record
            .accounts
            .iter()
            .map(|(account, snap)| (account.clone(), AccountEntry::from_snapshot(snap)))
            .collect();
        tracing::debug!(pool = ?record.id, accounts = record.accounts.len(), "pool restored");
        self.pools.insert(
            record.id,
            PoolEntry {
                state: PoolState::from_snapshot(&record.pool),
                accounts,
                stake,
                reward,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::transfer::InMemoryToken;
    use crate::TransferError;

    type Id = &'static str;
    type Events = Vec<LedgerEvent<Id, Id>>;
    type TestLedger = Ledger<Id, Id, InMemoryToken<Id>, ManualClock, Events>;

    const POOL: Id = "main";
    const FUNDER: Id = "treasury";

    struct Fixture {
        ledger: TestLedger,
        clock: ManualClock,
        stake_token: InMemoryToken<Id>,
        reward_token: InMemoryToken<Id>,
    }

    fn fixture(rate: Amount, budget: Amount) -> Fixture {
        let clock = ManualClock::new(0);
        let stake_token = InMemoryToken::new("main-custody");
        let reward_token = InMemoryToken::new("main-custody");
        for holder in ["a", "b", "c"] {
            stake_token.mint(&holder, 1_000);
        }
        reward_token.mint(&FUNDER, 1_000_000);

        let mut ledger = Ledger::new(clock.clone(), Vec::new());
        ledger
            .create_pool(
                POOL,
                rate,
                BudgetMode::Tracked,
                stake_token.clone(),
                reward_token.clone(),
            )
            .expect("create pool");
        if budget > 0 {
            ledger.fund_reward(&FUNDER, &POOL, budget).expect("fund");
        }
        Fixture {
            ledger,
            clock,
            stake_token,
            reward_token,
        }
    }

    #[test]
    fn test_create_pool_twice_rejected() {
        let mut f = fixture(100, 0);
        let result = f.ledger.create_pool(
            POOL,
            5,
            BudgetMode::Tracked,
            f.stake_token.clone(),
            f.reward_token.clone(),
        );
        assert!(matches!(result, Err(LedgerError::PoolAlreadyExists(_))));
        assert_eq!(f.ledger.pool(&POOL).expect("pool").emission_rate, 100);
    }

    #[test]
    fn test_unknown_pool_rejected() {
        let mut f = fixture(100, 0);
        assert!(matches!(
            f.ledger.fund_reward(&FUNDER, &"missing", 10),
            Err(LedgerError::PoolNotFound(_))
        ));
        assert!(matches!(
            f.ledger.pending_reward(&"missing", &"a"),
            Err(LedgerError::PoolNotFound(_))
        ));
    }

    #[test]
    fn test_worked_scenario() {
        let mut f = fixture(100, 10_000);
        f.ledger.stake(&"a", &POOL, 4).expect("stake a");
        f.ledger.stake(&"b", &POOL, 1).expect("stake b");
        f.ledger.stake(&"c", &POOL, 5).expect("stake c");

        f.clock.advance(10);
        let pending = |l: &TestLedger, who| l.pending_reward(&POOL, &who).expect("pending");
        assert_eq!(pending(&f.ledger, "a"), 400);
        assert_eq!(pending(&f.ledger, "b"), 100);
        assert_eq!(pending(&f.ledger, "c"), 500);

        f.ledger.unstake(&"c", &POOL, 2).expect("unstake c");
        assert_eq!(pending(&f.ledger, "a"), 400);
        assert_eq!(pending(&f.ledger, "b"), 100);
        assert_eq!(pending(&f.ledger, "c"), 500);

        f.clock.advance(10);
        assert_eq!(pending(&f.ledger, "a"), 900);
        assert_eq!(pending(&f.ledger, "b"), 225);
        assert_eq!(pending(&f.ledger, "c"), 875);

        for (who, expected) in [("a", 900), ("b", 225), ("c", 875)] {
            let paid = f.ledger.claim(&who, &POOL).expect("claim");
            assert_eq!(paid, expected);
            assert_eq!(f.reward_token.balance_of(&who), expected);
            assert_eq!(pending(&f.ledger, who), 0);
        }

        let report = f.ledger.audit(&POOL).expect("audit");
        assert!(report.is_solvent());
        assert_eq!(report.outstanding, 0);
        assert_eq!(f.ledger.pool(&POOL).expect("pool").remaining_budget, 8_000);
    }

    #[test]
    fn test_stake_transfer_failure_rolls_back() {
        let mut f = fixture(100, 10_000);
        f.ledger.stake(&"a", &POOL, 4).expect("stake");
        f.clock.advance(10);
        let pool_before = f.ledger.pool(&POOL).expect("pool");
        let events_before = f.ledger.sink().len();

        let result = f.ledger.stake(&"b", &POOL, 5_000);
        assert!(matches!(
            result,
            Err(LedgerError::Transfer(TransferError::InsufficientBalance { .. }))
        ));
        // Not even the catch-up was committed.
        assert_eq!(f.ledger.pool(&POOL).expect("pool"), pool_before);
        assert_eq!(f.ledger.account(&POOL, &"b").expect("account"), AccountSnapshot::default());
        assert_eq!(f.ledger.sink().len(), events_before);
    }

    #[test]
    fn test_claim_transfer_failure_rolls_back() {
        let mut f = fixture(100, 10_000);
        f.ledger.stake(&"a", &POOL, 4).expect("stake");
        f.clock.advance(10);
        f.reward_token.deny(&"a");

        let result = f.ledger.claim(&"a", &POOL);
        assert!(matches!(
            result,
            Err(LedgerError::Transfer(TransferError::Rejected(_)))
        ));
        assert_eq!(f.ledger.pending_reward(&POOL, &"a").expect("pending"), 1_000);

        f.reward_token.allow(&"a");
        assert_eq!(f.ledger.claim(&"a", &POOL).expect("claim"), 1_000);
    }

    #[test]
    fn test_unstake_more_than_staked_rejected() {
        let mut f = fixture(100, 10_000);
        f.ledger.stake(&"a", &POOL, 4).expect("stake");
        assert!(matches!(
            f.ledger.unstake(&"a", &POOL, 5),
            Err(LedgerError::InsufficientStake {
                requested: 5,
                staked: 4
            })
        ));
        assert!(matches!(
            f.ledger.unstake(&"b", &POOL, 1),
            Err(LedgerError::InsufficientStake {
                requested: 1,
                staked: 0
            })
        ));
    }

    #[test]
    fn test_zero_amounts_rejected() {
        let mut f = fixture(100, 0);
        assert!(matches!(
            f.ledger.stake(&"a", &POOL, 0),
            Err(LedgerError::ZeroAmount)
        ));
        assert!(matches!(
            f.ledger.unstake(&"a", &POOL, 0),
            Err(LedgerError::ZeroAmount)
        ));
        assert!(matches!(
            f.ledger.fund_reward(&FUNDER, &POOL, 0),
            Err(LedgerError::ZeroAmount)
        ));
    }

    #[test]
    fn test_unstake_to_zero_keeps_pending() {
        let mut f = fixture(100, 10_000);
        f.ledger.stake(&"a", &POOL, 4).expect("stake");
        f.clock.advance(5);
        f.ledger.unstake(&"a", &POOL, 4).expect("unstake all");
        assert_eq!(f.stake_token.balance_of(&"a"), 1_000);

        f.clock.advance(5);
        assert_eq!(f.ledger.pending_reward(&POOL, &"a").expect("pending"), 500);
        assert_eq!(f.ledger.claim(&"a", &POOL).expect("claim"), 500);
        assert_eq!(
            f.ledger.account(&POOL, &"a").expect("account"),
            AccountSnapshot::default()
        );
    }

    #[test]
    fn test_claim_with_nothing_pending() {
        let mut f = fixture(100, 10_000);
        assert_eq!(f.ledger.claim(&"a", &POOL).expect("unknown account"), 0);
        f.ledger.stake(&"a", &POOL, 4).expect("stake");
        assert_eq!(f.ledger.claim(&"a", &POOL).expect("same instant"), 0);
        assert_eq!(f.reward_token.balance_of(&"a"), 0);
    }

    #[test]
    fn test_rate_change_not_retroactive() {
        let mut f = fixture(100, 10_000);
        f.ledger.stake(&"a", &POOL, 2).expect("stake");
        f.clock.advance(10);
        f.ledger.set_emission_rate(&POOL, 10).expect("set rate");
        assert_eq!(f.ledger.pending_reward(&POOL, &"a").expect("pending"), 1_000);

        f.clock.advance(10);
        assert_eq!(f.ledger.pending_reward(&POOL, &"a").expect("pending"), 1_100);
    }

    #[test]
    fn test_emission_capped_by_funding() {
        let mut f = fixture(100, 300);
        f.ledger.stake(&"a", &POOL, 1).expect("stake");
        f.clock.advance(10);
        assert_eq!(f.ledger.pending_reward(&POOL, &"a").expect("pending"), 300);
        assert_eq!(f.ledger.claim(&"a", &POOL).expect("claim"), 300);
        assert_eq!(f.reward_token.custody_balance(), 0);
    }

    #[test]
    fn test_no_stakers_window_is_lost() {
        let mut f = fixture(100, 10_000);
        f.clock.advance(10);
        f.ledger.stake(&"a", &POOL, 1).expect("stake");
        f.clock.advance(1);
        assert_eq!(f.ledger.pending_reward(&POOL, &"a").expect("pending"), 100);
        assert_eq!(
            f.ledger.pool(&POOL).expect("pool").remaining_budget,
            10_000,
            "stored state not yet caught up"
        );
    }

    #[test]
    fn test_emergency_unstake_forfeits_reward() {
        let mut f = fixture(100, 10_000);
        f.ledger.stake(&"a", &POOL, 1).expect("stake a");
        f.ledger.stake(&"b", &POOL, 1).expect("stake b");
        f.clock.advance(10);

        let exit = f.ledger.emergency_unstake(&"a", &POOL).expect("exit");
        assert_eq!(
            exit,
            EmergencyExit {
                returned: 1,
                forfeited: 500
            }
        );
        assert_eq!(f.stake_token.balance_of(&"a"), 1_000);
        assert_eq!(f.reward_token.balance_of(&"a"), 0);
        assert_eq!(f.ledger.account(&POOL, &"a").expect("account"), AccountSnapshot::default());
        assert_eq!(f.ledger.pool(&POOL).expect("pool").total_shares, 1);

        // b keeps what accrued before the exit.
        assert_eq!(f.ledger.pending_reward(&POOL, &"b").expect("pending"), 500);
        assert!(f.ledger.audit(&POOL).expect("audit").is_solvent());
    }

    #[test]
    fn test_emergency_unstake_guards_inconsistent_totals() {
        let mut f = fixture(100, 0);
        f.ledger.stake(&"a", &POOL, 3).expect("stake");
        let mut record = f.ledger.export().remove(0);
        record.pool.total_shares = 1;

        let mut restored: TestLedger = Ledger::new(f.clock.clone(), Vec::new());
        restored
            .restore_pool(record, f.stake_token.clone(), f.reward_token.clone())
            .expect("restore");
        let exit = restored.emergency_unstake(&"a", &POOL).expect("exit");
        assert_eq!(exit.returned, 3);
        assert_eq!(restored.pool(&POOL).expect("pool").total_shares, 0);
    }

    #[test]
    fn test_emergency_unstake_without_catch_up() {
        let mut f = fixture(100, 10_000);
        f.ledger.stake(&"a", &POOL, 1).expect("stake a");
        f.ledger.stake(&"b", &POOL, 1).expect("stake b");
        let mut record = f.ledger.export().remove(0);
        record.pool.last_updated = 10;

        let mut restored: TestLedger = Ledger::new(f.clock.clone(), Vec::new());
        restored
            .restore_pool(record, f.stake_token.clone(), f.reward_token.clone())
            .expect("restore");

        // The clock trails the pool, so catch-up is refused but the exit is not.
        f.clock.set(5);
        assert!(matches!(
            restored.catch_up(&POOL),
            Err(LedgerError::ClockWentBackwards { last: 10, now: 5 })
        ));
        let exit = restored.emergency_unstake(&"a", &POOL).expect("exit");
        assert_eq!(exit.returned, 1);
        let pool = restored.pool(&POOL).expect("pool");
        assert_eq!(pool.last_updated, 10);
        assert_eq!(pool.total_shares, 1);

        // The next window goes to the remaining share alone.
        f.clock.set(20);
        assert_eq!(restored.pending_reward(&POOL, &"b").expect("pending"), 1_000);
        assert_eq!(restored.pending_reward(&POOL, &"a").expect("pending"), 0);
    }

    #[test]
    fn test_events_raised_after_mutations() {
        let mut f = fixture(100, 10_000);
        f.ledger.sink_mut().clear();
        f.ledger.stake(&"a", &POOL, 4).expect("stake");
        f.clock.advance(10);
        f.ledger.claim(&"a", &POOL).expect("claim");

        let events = f.ledger.sink();
        let ops: Vec<_> = events.iter().map(|e| (e.kind(), e.operation())).collect();
        assert_eq!(
            ops,
            vec![
                ("pool_state_changed", Operation::Stake),
                ("account_state_changed", Operation::Stake),
                ("pool_state_changed", Operation::Claim),
                ("account_state_changed", Operation::Claim),
            ]
        );
        match &events[3] {
            LedgerEvent::AccountStateChanged { paid, snapshot, .. } => {
                assert_eq!(*paid, 1_000);
                assert_eq!(snapshot.shares, 4);
                assert_eq!(snapshot.debt, 4 * 250);
                assert_eq!(snapshot.debt_fraction, 0);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_catch_up_idempotent_at_same_instant() {
        let mut f = fixture(100, 10_000);
        f.ledger.stake(&"a", &POOL, 4).expect("stake");
        f.clock.advance(3);
        assert_eq!(
            f.ledger.catch_up(&POOL).expect("first"),
            Accrual::Accrued { emission: 300 }
        );
        let after_first = f.ledger.pool(&POOL).expect("pool");
        assert_eq!(f.ledger.catch_up(&POOL).expect("second"), Accrual::Idle);
        assert_eq!(f.ledger.pool(&POOL).expect("pool"), after_first);
    }

    #[test]
    fn test_preview_does_not_mutate() {
        let mut f = fixture(100, 10_000);
        f.ledger.stake(&"a", &POOL, 4).expect("stake");
        f.clock.advance(10);
        let before = f.ledger.pool(&POOL).expect("pool");
        assert_eq!(f.ledger.preview_accumulator(&POOL).expect("preview"), 250 * SCALE);
        assert_eq!(f.ledger.pool(&POOL).expect("pool"), before);
    }

    #[test]
    fn test_custody_balance_mode_uses_live_balance() {
        let clock = ManualClock::new(0);
        let stake_token = InMemoryToken::new("custody");
        let reward_token = InMemoryToken::new("custody");
        stake_token.mint(&"a", 10);
        reward_token.mint(&"custody", 600);

        let mut ledger: TestLedger = Ledger::new(clock.clone(), Vec::new());
        ledger
            .create_pool(
                POOL,
                100,
                BudgetMode::CustodyBalance,
                stake_token,
                reward_token.clone(),
            )
            .expect("create");
        ledger.stake(&"a", &POOL, 2).expect("stake");
        clock.advance(10);

        assert_eq!(ledger.pending_reward(&POOL, &"a").expect("pending"), 600);
        assert_eq!(ledger.claim(&"a", &POOL).expect("claim"), 600);
        clock.advance(10);
        assert_eq!(ledger.pending_reward(&POOL, &"a").expect("pending"), 0);
        assert!(ledger.audit(&POOL).expect("audit").is_solvent());
    }

    #[test]
    fn test_pools_are_independent() {
        let mut f = fixture(100, 10_000);
        let second_stake = f.stake_token.with_custody("second-custody");
        let second_reward = f.reward_token.with_custody("second-custody");
        f.ledger
            .create_pool("second", 10, BudgetMode::Tracked, second_stake, second_reward)
            .expect("create second");
        f.ledger.fund_reward(&FUNDER, &"second", 1_000).expect("fund");

        f.ledger.stake(&"a", &POOL, 1).expect("stake main");
        f.ledger.stake(&"a", &"second", 1).expect("stake second");
        f.clock.advance(10);

        assert_eq!(f.ledger.pending_reward(&POOL, &"a").expect("main"), 1_000);
        assert_eq!(f.ledger.pending_reward(&"second", &"a").expect("second"), 100);
        assert_eq!(f.ledger.pool_ids().count(), 2);
    }

    #[test]
    fn test_export_restore_roundtrip() {
        let mut f = fixture(100, 10_000);
        f.ledger.stake(&"a", &POOL, 4).expect("stake");
        f.clock.advance(10);
        f.ledger.unstake(&"a", &POOL, 1).expect("unstake");

        let records = f.ledger.export();
        let mut restored: TestLedger = Ledger::new(f.clock.clone(), Vec::new());
        for record in records.clone() {
            restored
                .restore_pool(record, f.stake_token.clone(), f.reward_token.clone())
                .expect("restore");
        }
        assert_eq!(restored.export(), records);
        assert_eq!(restored.pending_reward(&POOL, &"a").expect("pending"), 1_000);
        assert!(restored.sink().is_empty());
    }
}
