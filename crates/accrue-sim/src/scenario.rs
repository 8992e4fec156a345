//! Scenario files and the replay loop.
//!
//! A scenario is a list of steps, each pinned to an absolute clock time:
//!
//! ```toml
//! [[steps]]
//! at = 10
//! op = "unstake"
//! pool = "main"
//! account = "c"
//! amount = 2
//! ```
//!
//! Steps run in file order and must not go back in time. A step marked
//! `expect_error = true` must fail; any other failure aborts the run.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use accrue_ledger::{InMemoryToken, Ledger, LedgerError, ManualClock, SolvencyReport};
use accrue_types::{Amount, Timestamp};

use crate::config::SimConfig;
use crate::events::EventBus;

/// The ledger shape driven by the simulator.
pub type SimLedger = Ledger<String, String, InMemoryToken<String>, ManualClock, EventBus>;

/// A parsed scenario file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// One timed operation.
#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    pub at: Timestamp,
    #[serde(flatten)]
    pub op: Op,
    #[serde(default)]
    pub expect_error: bool,
}

/// Operations a step can perform.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    Stake {
        pool: String,
        account: String,
        amount: u64,
    },
    Unstake {
        pool: String,
        account: String,
        amount: u64,
    },
    Claim {
        pool: String,
        account: String,
    },
    EmergencyUnstake {
        pool: String,
        account: String,
    },
    Fund {
        pool: String,
        from: String,
        amount: u64,
    },
    SetRate {
        pool: String,
        rate: u64,
    },
    CatchUp {
        pool: String,
    },
    /// Assert an account's pending reward.
    ExpectPending {
        pool: String,
        account: String,
        pending: u64,
    },
}

/// Final state of a run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Clock time after the last step.
    pub finished_at: Timestamp,
    /// Steps executed.
    pub steps: usize,
    /// Steps that failed as expected.
    pub expected_failures: usize,
    /// Reward paid per pool and account.
    pub paid: BTreeMap<String, BTreeMap<String, Amount>>,
    /// Pending reward per pool and account at the end.
    pub pending: BTreeMap<String, BTreeMap<String, Amount>>,
    /// Solvency audit per pool at the end.
    pub audits: BTreeMap<String, SolvencyReport>,
}

impl Scenario {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Build a ledger with the configured tokens and pools.
///
/// Pools are created in `start_time` order, each with its own stake and
/// reward custody holder.
pub fn build_ledger(
    config: &SimConfig,
    clock: ManualClock,
    bus: EventBus,
) -> anyhow::Result<SimLedger> {
    let mut tokens = BTreeMap::new();
    for token in &config.tokens {
        let handle = InMemoryToken::new(format!("{}:reserve", token.name));
        for (holder, amount) in &token.balances {
            handle.mint(holder, Amount::from(*amount));
        }
        tokens.insert(token.name.clone(), handle);
    }

    let mut pools = config.pools.clone();
    pools.sort_by_key(|p| p.start_time);

    let mut ledger = Ledger::new(clock.clone(), bus);
    for pool in pools {
        let stake = tokens
            .get(&pool.stake_token)
            .with_context(|| format!("unknown token '{}'", pool.stake_token))?
            .with_custody(format!("pool:{}:stake", pool.id));
        let reward = tokens
            .get(&pool.reward_token)
            .with_context(|| format!("unknown token '{}'", pool.reward_token))?
            .with_custody(format!("pool:{}:reward", pool.id));

        clock.set(pool.start_time);
        ledger.create_pool(
            pool.id.clone(),
            Amount::from(pool.emission_rate),
            pool.budget_mode,
            stake,
            reward,
        )?;
    }
    Ok(ledger)
}

/// What a successful step produced.
#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Done,
    Paid {
        pool: String,
        account: String,
        amount: Amount,
    },
    /// Pending reward read by an expectation step.
    Pending { expected: Amount, actual: Amount },
}

/// Execute one operation against the ledger.
fn apply(ledger: &mut SimLedger, op: &Op) -> Result<Outcome, LedgerError> {
    match op {
        Op::Stake {
            pool,
            account,
            amount,
        } => ledger
            .stake(account, pool, Amount::from(*amount))
            .map(|_| Outcome::Done),
        Op::Unstake {
            pool,
            account,
            amount,
        } => ledger
            .unstake(account, pool, Amount::from(*amount))
            .map(|_| Outcome::Done),
        Op::Claim { pool, account } => ledger.claim(account, pool).map(|amount| Outcome::Paid {
            pool: pool.clone(),
            account: account.clone(),
            amount,
        }),
        Op::EmergencyUnstake { pool, account } => ledger
            .emergency_unstake(account, pool)
            .map(|_| Outcome::Done),
        Op::Fund { pool, from, amount } => ledger
            .fund_reward(from, pool, Amount::from(*amount))
            .map(|_| Outcome::Done),
        Op::SetRate { pool, rate } => ledger
            .set_emission_rate(pool, Amount::from(*rate))
            .map(|_| Outcome::Done),
        Op::CatchUp { pool } => ledger.catch_up(pool).map(|_| Outcome::Done),
        Op::ExpectPending {
            pool,
            account,
            pending,
        } => ledger
            .pending_reward(pool, account)
            .map(|actual| Outcome::Pending {
                expected: Amount::from(*pending),
                actual,
            }),
    }
}

/// Replay `scenario` against `ledger`.
pub async fn run(
    ledger: &mut SimLedger,
    clock: &ManualClock,
    scenario: &Scenario,
) -> anyhow::Result<Report> {
    use accrue_ledger::Clock;

    let mut paid: BTreeMap<String, BTreeMap<String, Amount>> = BTreeMap::new();
    let mut expected_failures = 0;

    for (index, step) in scenario.steps.iter().enumerate() {
        if step.at < clock.now() {
            anyhow::bail!(
                "step {index} at {} precedes clock time {}",
                step.at,
                clock.now()
            );
        }
        clock.set(step.at);

        let result = apply(ledger, &step.op);

        // A wrong expectation is a scenario failure, never an expected one.
        if let Ok(Outcome::Pending { expected, actual }) = &result {
            if expected != actual {
                anyhow::bail!(
                    "step {index} at {}: expected pending {expected}, found {actual} ({:?})",
                    step.at,
                    step.op
                );
            }
        }

        match (result, step.expect_error) {
            (Ok(outcome), false) => {
                if let Outcome::Paid {
                    pool,
                    account,
                    amount,
                } = outcome
                {
                    let total = paid.entry(pool).or_default().entry(account).or_default();
                    *total = total.saturating_add(amount);
                }
                tracing::debug!(index, at = step.at, op = ?step.op, "step applied");
            }
            (Err(err), true) => {
                expected_failures += 1;
                tracing::info!(index, at = step.at, %err, "step failed as expected");
            }
            (Ok(_), true) => {
                anyhow::bail!("step {index} ({:?}) succeeded but was expected to fail", step.op)
            }
            (Err(err), false) => {
                return Err(anyhow::Error::new(err)
                    .context(format!("step {index} at {} ({:?})", step.at, step.op)));
            }
        }

        // Let the journal keep up with the bus.
        tokio::task::yield_now().await;
    }

    let mut pending = BTreeMap::new();
    let mut audits = BTreeMap::new();
    for record in ledger.export() {
        let mut per_account = BTreeMap::new();
        for (account, _) in &record.accounts {
            per_account.insert(account.clone(), ledger.pending_reward(&record.id, account)?);
        }
        audits.insert(record.id.clone(), ledger.audit(&record.id)?);
        pending.insert(record.id, per_account);
    }

    Ok(Report {
        finished_at: clock.now(),
        steps: scenario.steps.len(),
        expected_failures,
        paid,
        pending,
        audits,
    })
}
