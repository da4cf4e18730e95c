//! Observable in-memory store of transfer records.
//!
//! Records are keyed by `(file id, direction)` and kept in insertion order.
//! Every mutation publishes a fresh snapshot on a watch channel.

use std::sync::{Arc, PoisonError, RwLock};

use roomdrop_protocol::FileId;
use tokio::sync::watch;

use crate::types::{Direction, TransferRecord};

/// Shared handle to the record store. Clones see the same records.
#[derive(Clone)]
pub struct TransferStore {
    inner: Arc<Inner>,
}

struct Inner {
    records: RwLock<Vec<TransferRecord>>,
    snapshots: watch::Sender<Vec<TransferRecord>>,
}

impl TransferStore {
    pub fn new() -> Self {
        let (snapshots, _) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(Inner {
                records: RwLock::new(Vec::new()),
                snapshots,
            }),
        }
    }

    /// Inserts `record`, or replaces the record with the same id and
    /// direction in place.
    pub fn upsert(&self, record: TransferRecord) {
        self.mutate(|records| {
            match records
                .iter_mut()
                .find(|r| r.id == record.id && r.direction == record.direction)
            {
                Some(existing) => *existing = record,
                None => records.push(record),
            }
        });
    }

    /// Applies `f` to the matching record and returns the updated copy.
    /// Absent records are left alone and `None` is returned.
    pub fn patch<F>(&self, id: &FileId, direction: Direction, f: F) -> Option<TransferRecord>
    where
        F: FnOnce(&mut TransferRecord),
    {
        let mut records = self.write();
        let record = records
            .iter_mut()
            .find(|r| &r.id == id && r.direction == direction)?;
        f(record);
        let updated = record.clone();
        self.inner.snapshots.send_replace(records.clone());
        Some(updated)
    }

    /// Removes every record for `id`, regardless of direction.
    pub fn remove(&self, id: &FileId) -> Vec<TransferRecord> {
        let mut removed = Vec::new();
        self.mutate(|records| {
            let (gone, kept): (Vec<_>, Vec<_>) = std::mem::take(records)
                .into_iter()
                .partition(|r| &r.id == id);
            *records = kept;
            removed = gone;
        });
        removed
    }

    /// Removes every record and returns them.
    pub fn clear(&self) -> Vec<TransferRecord> {
        let mut removed = Vec::new();
        self.mutate(|records| removed = std::mem::take(records));
        removed
    }

    pub fn get(&self, id: &FileId, direction: Direction) -> Option<TransferRecord> {
        self.read()
            .iter()
            .find(|r| &r.id == id && r.direction == direction)
            .cloned()
    }

    /// Snapshot of all records in insertion order.
    pub fn list(&self) -> Vec<TransferRecord> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Returns a receiver that observes a snapshot after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<Vec<TransferRecord>> {
        self.inner.snapshots.subscribe()
    }

    fn mutate(&self, f: impl FnOnce(&mut Vec<TransferRecord>)) {
        let mut records = self.write();
        f(&mut records);
        self.inner.snapshots.send_replace(records.clone());
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<TransferRecord>> {
        self.inner
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<TransferRecord>> {
        self.inner
            .records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for TransferStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TransferStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferStore")
            .field("records", &self.len())
            .finish()
    }
}
