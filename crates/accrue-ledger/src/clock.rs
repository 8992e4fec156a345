//! Clock collaborator.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use accrue_types::Timestamp;

/// Monotonically non-decreasing time source.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// Wall-clock seconds since the UNIX epoch.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

/// Manually driven clock. Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
        }
    }

    /// Move to `at`. Earlier times are ignored.
    pub fn set(&self, at: Timestamp) {
        let previous = self.now.fetch_max(at, Ordering::SeqCst);
        if at < previous {
            tracing::warn!(previous, requested = at, "ignoring backwards clock set");
        }
    }

    /// Move forward by `delta`.
    pub fn advance(&self, delta: Timestamp) {
        let current = self.now.load(Ordering::SeqCst);
        self.set(current.saturating_add(delta));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}
