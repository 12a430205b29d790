use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::{LendingError, Result};
use crate::lifecycle::Outcome;
use crate::state::{Loan, PawnTicket};

/// snapshots carrying an optimistic concurrency version
pub trait Versioned {
    fn id(&self) -> Uuid;
    fn version(&self) -> u64;
}

impl Versioned for Loan {
    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Versioned for PawnTicket {
    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// persistence collaborator for loan and ticket snapshots
pub trait SnapshotStore<T: Versioned>: Send + Sync {
    fn load(&self, id: Uuid) -> Result<T>;

    /// store `snapshot` if the stored version still equals `expected_version`
    ///
    /// an `expected_version` of 0 means the snapshot must not exist yet.
    fn save(&self, snapshot: T, expected_version: u64) -> Result<()>;
}

/// snapshot store held in memory
#[derive(Debug)]
pub struct InMemoryStore<T> {
    snapshots: RwLock<HashMap<Uuid, T>>,
}

impl<T> InMemoryStore<T> {
    pub fn new() -> Self {
        Self {
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.read().is_empty()
    }
}

impl<T> Default for InMemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SnapshotStore<T> for InMemoryStore<T>
where
    T: Versioned + Clone + Send + Sync,
{
    fn load(&self, id: Uuid) -> Result<T> {
        self.snapshots
            .read()
            .get(&id)
            .cloned()
            .ok_or(LendingError::SnapshotNotFound { id })
    }

    fn save(&self, snapshot: T, expected_version: u64) -> Result<()> {
        let id = snapshot.id();
        let mut snapshots = self.snapshots.write();

        let actual = snapshots.get(&id).map(Versioned::version).unwrap_or(0);
        if actual != expected_version {
            return Err(LendingError::ConcurrencyConflict {
                id,
                expected: expected_version,
                actual,
            });
        }

        debug!(%id, version = snapshot.version(), "snapshot saved");
        snapshots.insert(id, snapshot);
        Ok(())
    }
}

/// load, run `op`, save with a version check; retry on conflicts
///
/// the operation is re-run against a freshly loaded snapshot after each
/// conflict, at most `max_attempts` times in total.
pub fn transact<T, S, F>(store: &S, id: Uuid, max_attempts: u32, mut op: F) -> Result<Outcome<T>>
where
    T: Versioned + Clone,
    S: SnapshotStore<T> + ?Sized,
    F: FnMut(&T) -> Result<Outcome<T>>,
{
    let mut attempt = 1;
    loop {
        let current = store.load(id)?;
        let outcome = op(&current)?;

        // nothing changed, nothing to write
        if outcome.snapshot.version() == current.version() {
            return Ok(outcome);
        }

        match store.save(outcome.snapshot.clone(), current.version()) {
            Ok(()) => return Ok(outcome),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                warn!(%id, attempt, error = %e, "concurrent update, retrying");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
