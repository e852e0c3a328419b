//! Per-list queue of update batches waiting to be flushed to the native side.

use indexmap::IndexMap;

use crate::actions::ListUpdateBatch;
use crate::ListId;

/// Batches keyed by list, in the order lists first produced one.
/// Each list's sequence is append-only.
#[derive(Debug, Clone, Default)]
pub struct PendingListUpdates {
    batches: IndexMap<ListId, Vec<ListUpdateBatch>>,
}

impl PendingListUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `batch` to the list's sequence. Empty batches are dropped.
    pub fn push(&mut self, list: ListId, batch: ListUpdateBatch) {
        if batch.is_empty() {
            return;
        }
        self.batches.entry(list).or_default().push(batch);
    }

    pub fn get(&self, list: ListId) -> &[ListUpdateBatch] {
        self.batches.get(&list).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn lists(&self) -> impl Iterator<Item = ListId> + '_ {
        self.batches.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Total number of queued batches across lists.
    pub fn len(&self) -> usize {
        self.batches.values().map(Vec::len).sum()
    }

    /// Removes and returns the queued batches of one list.
    pub fn take(&mut self, list: ListId) -> Vec<ListUpdateBatch> {
        self.batches.shift_remove(&list).unwrap_or_default()
    }

    /// Removes everything, keeping list order.
    pub fn drain(&mut self) -> Vec<(ListId, Vec<ListUpdateBatch>)> {
        self.batches.drain(..).collect()
    }
}
