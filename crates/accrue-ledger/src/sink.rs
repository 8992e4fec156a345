//! Event sink collaborator.

use accrue_types::LedgerEvent;

/// Receives ledger events after each successful mutating operation.
pub trait EventSink<P, A> {
    fn emit(&mut self, event: LedgerEvent<P, A>);
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl<P, A> EventSink<P, A> for NoopSink {
    fn emit(&mut self, _event: LedgerEvent<P, A>) {}
}

/// Collects events in order, mostly for tests.
impl<P, A> EventSink<P, A> for Vec<LedgerEvent<P, A>> {
    fn emit(&mut self, event: LedgerEvent<P, A>) {
        self.push(event);
    }
}
