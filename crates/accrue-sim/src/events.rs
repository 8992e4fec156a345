//! Event bus and journal.
//!
//! The ledger emits into a broadcast channel; a journal task drains it into
//! the `ledger_events` table. Clones share one channel and one sequence
//! counter; the channel closes when the last clone is dropped, which ends
//! the journal task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use accrue_ledger::EventSink;
use accrue_types::LedgerEvent;

/// Events as published by the simulator.
pub type SimEvent = LedgerEvent<String, String>;

/// Event bus for broadcasting ledger events to subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SimEvent>,
    sequence: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event to all subscribers.
    pub fn publish(&self, event: SimEvent) {
        self.sequence.fetch_add(1, Ordering::SeqCst);
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to events. Returns a receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<SimEvent> {
        self.sender.subscribe()
    }

    /// Number of events published so far, across all clones.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

impl EventSink<String, String> for EventBus {
    fn emit(&mut self, event: SimEvent) {
        self.publish(event);
    }
}

/// Drain `rx` into the journal until the bus closes. Resolves to the number
/// of events written.
pub fn spawn_journal(
    mut rx: broadcast::Receiver<SimEvent>,
    db: Arc<Mutex<rusqlite::Connection>>,
) -> JoinHandle<anyhow::Result<u64>> {
    tokio::spawn(async move {
        let mut written = 0u64;
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let conn = db.lock().await;
                    accrue_db::queries::events::append(&conn, &event)?;
                    written += 1;
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "journal lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        tracing::debug!(written, "journal closed");
        Ok(written)
    })
}
