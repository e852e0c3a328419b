//! Consumer side of list update batches.
//!
//! The native list keeps every batch it was sent and interprets them in
//! order; [`ListAttribute`] mirrors that so the produced sequence can be
//! checked against the item set it is meant to describe.

use serde_json::Value;

use crate::actions::ListUpdateBatch;
use crate::error::ListError;
use crate::ListId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub item_key: String,
    pub ty: String,
}

#[derive(Debug, Clone, Default)]
pub struct ListAttribute {
    list: ListId,
    entries: Vec<ListEntry>,
    batches: Vec<ListUpdateBatch>,
    inserted: usize,
    removed: usize,
    updated: usize,
}

impl ListAttribute {
    pub fn new(list: ListId) -> Self {
        Self {
            list,
            ..Self::default()
        }
    }

    pub fn list(&self) -> ListId {
        self.list
    }

    pub fn entries(&self) -> &[ListEntry] {
        &self.entries
    }

    pub fn item_keys(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.item_key.as_str()).collect()
    }

    /// Every batch applied so far, oldest first.
    pub fn batches(&self) -> &[ListUpdateBatch] {
        &self.batches
    }

    pub fn inserted(&self) -> usize {
        self.inserted
    }

    pub fn removed(&self) -> usize {
        self.removed
    }

    pub fn updated(&self) -> usize {
        self.updated
    }

    /// Applies one delta. A batch that does not fit the current entries is
    /// rejected without changing anything.
    pub fn apply(&mut self, batch: &ListUpdateBatch) -> Result<(), ListError> {
        let list = self.list;
        let out_of_range =
            |index: usize, len: usize| ListError::IndexOutOfRange { list, index, len };
        let mut entries = self.entries.clone();

        let mut removals = batch.remove_action.clone();
        removals.sort_unstable();
        removals.dedup();
        for &position in removals.iter().rev() {
            if position >= entries.len() {
                return Err(out_of_range(position, entries.len()));
            }
            entries.remove(position);
        }

        let mut inserts: Vec<_> = batch.insert_action.iter().collect();
        inserts.sort_by_key(|action| action.position);
        for action in inserts {
            if action.position > entries.len() {
                return Err(out_of_range(action.position, entries.len()));
            }
            entries.insert(
                action.position,
                ListEntry {
                    item_key: action.item_key.clone(),
                    ty: action.ty.clone(),
                },
            );
        }

        for update in &batch.update_action {
            let len = entries.len();
            let entry = entries
                .get_mut(update.to)
                .ok_or_else(|| out_of_range(update.to, len))?;
            entry.item_key = update.item_key.clone();
            entry.ty = update.ty.clone();
        }

        self.entries = entries;
        self.inserted += batch.insert_action.len();
        self.removed += removals.len();
        self.updated += batch.update_action.len();
        self.batches.push(batch.clone());
        Ok(())
    }

    pub fn apply_all<'a>(
        &mut self,
        batches: impl IntoIterator<Item = &'a ListUpdateBatch>,
    ) -> Result<(), ListError> {
        for batch in batches {
            self.apply(batch)?;
        }
        Ok(())
    }

    /// Applies a batch received in its JSON wire form.
    pub fn apply_json(&mut self, value: &Value) -> Result<(), ListError> {
        let batch: ListUpdateBatch =
            serde_json::from_value(value.clone()).map_err(|err| ListError::InvalidBatch {
                list: self.list,
                reason: err.to_string(),
            })?;
        self.apply(&batch)
    }
}
