pub mod loan;
pub mod pawn;
pub mod serialization;

use crate::events::{Event, EventStore};

pub use loan::{LoanLifecycle, PayoffQuote};
pub use pawn::{PawnLifecycle, RenewalQuote};
pub use serialization::{LoanView, TicketView};

/// new snapshot produced by a lifecycle operation, plus what happened
///
/// the input snapshot is never modified; persisting `snapshot` (with a
/// version check) is the caller's job.
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub snapshot: T,
    pub events: Vec<Event>,
}

impl<T> Outcome<T> {
    pub(crate) fn new(snapshot: T, mut events: EventStore) -> Self {
        Self {
            snapshot,
            events: events.take_events(),
        }
    }

    /// unchanged snapshot, no events
    pub(crate) fn unchanged(snapshot: T) -> Self {
        Self {
            snapshot,
            events: Vec::new(),
        }
    }

    pub fn into_snapshot(self) -> T {
        self.snapshot
    }
}
