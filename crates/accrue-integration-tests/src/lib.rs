//! Shared fixtures for the accrue integration tests.
//!
//! The tests under `tests/` drive the ledger end to end with in-memory
//! tokens and a manual clock:
//! ```sh
//! cargo test -p accrue-integration-tests
//! ```

use accrue_ledger::{InMemoryToken, Ledger, ManualClock, Result};
use accrue_types::{Amount, BudgetMode, LedgerEvent, Timestamp};

pub type Id = &'static str;
pub type Events = Vec<LedgerEvent<Id, Id>>;
pub type TestLedger = Ledger<Id, Id, InMemoryToken<Id>, ManualClock, Events>;

/// Pool created by [`Fixture::new`].
pub const POOL: Id = "main";
/// Holder of unfunded reward.
pub const TREASURY: Id = "treasury";
pub const STAKE_CUSTODY: Id = "pool:main:stake";
pub const REWARD_CUSTODY: Id = "pool:main:reward";

/// Simulated start time.
pub const START: Timestamp = 1_700_000_000;

/// One pool with its two tokens and a clock the test controls.
pub struct Fixture {
    pub ledger: TestLedger,
    pub clock: ManualClock,
    pub stake_token: InMemoryToken<Id>,
    pub reward_token: InMemoryToken<Id>,
}

impl Fixture {
    /// A ledger holding [`POOL`] created at [`START`].
    pub fn new(emission_rate: Amount, budget_mode: BudgetMode) -> Result<Self> {
        let clock = ManualClock::new(START);
        let stake_token = InMemoryToken::new(STAKE_CUSTODY);
        let reward_token = InMemoryToken::new(REWARD_CUSTODY);

        let mut ledger = Ledger::new(clock.clone(), Events::new());
        ledger.create_pool(
            POOL,
            emission_rate,
            budget_mode,
            stake_token.clone(),
            reward_token.clone(),
        )?;

        Ok(Self {
            ledger,
            clock,
            stake_token,
            reward_token,
        })
    }

    /// Mint `amount` of reward to the treasury and fund the pool with it.
    pub fn fund(&mut self, amount: Amount) -> Result<()> {
        self.reward_token.mint(&TREASURY, amount);
        self.ledger.fund_reward(&TREASURY, &POOL, amount)
    }

    /// Mint `amount` of stake to `account` and stake all of it.
    pub fn stake_new(&mut self, account: Id, amount: Amount) -> Result<()> {
        self.stake_token.mint(&account, amount);
        self.ledger.stake(&account, &POOL, amount)
    }

    pub fn advance(&self, delta: Timestamp) {
        self.clock.advance(delta);
    }

    pub fn pending(&self, account: Id) -> Result<Amount> {
        self.ledger.pending_reward(&POOL, &account)
    }

    /// Reward paid out to `account` so far.
    pub fn reward_balance(&self, account: Id) -> Amount {
        self.reward_token.balance_of(&account)
    }

    pub fn events(&self) -> &Events {
        self.ledger.sink()
    }
}
