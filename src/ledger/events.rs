//! Change notifications for ledger observers.
//!
//! Observers subscribe with a filter and receive an event after every
//! successful write made through [`crate::ledger::Ledger`]. Observers are
//! read-only; dropping or unsubscribing a [`Subscription`] detaches it.

use crate::core::month::MonthRef;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

/// What happened to a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A transaction was created
    Created,
    /// A transaction was modified (e.g. paid)
    Updated,
    /// A transaction was removed
    Deleted,
}

/// One change to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEvent {
    /// Kind of change
    pub kind: ChangeKind,
    /// Affected transaction
    pub transaction_id: String,
    /// Month the transaction belongs to
    pub month_ref: MonthRef,
}

/// Which events a subscription receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilter {
    /// Every event
    All,
    /// Events for transactions of one month
    Month(MonthRef),
}

impl EventFilter {
    fn matches(self, event: &LedgerEvent) -> bool {
        match self {
            Self::All => true,
            Self::Month(month_ref) => event.month_ref == month_ref,
        }
    }
}

/// A live subscription to ledger changes.
#[derive(Debug)]
pub struct Subscription {
    receiver: broadcast::Receiver<LedgerEvent>,
    filter: EventFilter,
}

impl Subscription {
    pub(crate) fn new(
        receiver: broadcast::Receiver<LedgerEvent>,
        filter: EventFilter,
    ) -> Self {
        Self { receiver, filter }
    }

    /// Waits for the next matching event. Returns `None` once the ledger has
    /// been dropped and every buffered event has been delivered.
    pub async fn recv(&mut self) -> Option<LedgerEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Ledger subscriber fell behind, events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Returns an already buffered matching event without waiting.
    pub fn try_recv(&mut self) -> Option<LedgerEvent> {
        while let Ok(event) = self.receiver.try_recv() {
            if self.filter.matches(&event) {
                return Some(event);
            }
        }
        None
    }

    /// Detaches from the ledger.
    pub fn unsubscribe(self) {
        drop(self);
    }
}
