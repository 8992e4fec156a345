//! accrue-sim: replays a staking scenario against in-memory tokens.
//!
//! Usage: `accrue-sim [CONFIG] [SCENARIO]`. Events are journaled to SQLite
//! as they happen; the final pool state is saved as a snapshot and a JSON
//! report is printed on stdout.

mod config;
mod events;
mod scenario;

use std::path::PathBuf;
use std::sync::Arc;

use accrue_ledger::ManualClock;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::SimConfig;
use crate::events::EventBus;
use crate::scenario::Scenario;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let config_arg = args.next().map(PathBuf::from);
    let scenario_arg = args.next().map(PathBuf::from);

    // 1. Load config
    let config = SimConfig::load(config_arg)?;

    // 2. Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let scenario_path = match scenario_arg {
        Some(path) => path,
        None if !config.scenario.is_empty() => PathBuf::from(&config.scenario),
        None => anyhow::bail!("no scenario given"),
    };
    let scenario = Scenario::load(&scenario_path)?;
    info!(
        pools = config.pools.len(),
        steps = scenario.steps.len(),
        "accrue-sim starting"
    );

    // 3. Open database
    let conn = match config.db_path() {
        Some(path) => accrue_db::open(path)?,
        None => accrue_db::open_memory()?,
    };
    let db = Arc::new(tokio::sync::Mutex::new(conn));

    // 4. Event bus and journal
    let bus = EventBus::new(config.events.capacity);
    let journal = events::spawn_journal(bus.subscribe(), db.clone());

    // 5. Build pools and replay
    let clock = ManualClock::new(0);
    let mut ledger = scenario::build_ledger(&config, clock.clone(), bus.clone())?;
    let report = scenario::run(&mut ledger, &clock, &scenario).await?;

    // The journal finishes once every sender is gone.
    let records = ledger.export();
    let published = bus.sequence();
    drop(ledger);
    drop(bus);
    let journaled = journal.await??;
    if journaled != published {
        warn!(published, journaled, "journal missed events");
    }

    // 6. Save snapshot
    {
        let mut conn = db.lock().await;
        accrue_db::snapshot::save(&mut conn, &records)?;
    }
    info!(published, journaled, pools = records.len(), "snapshot saved");

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
