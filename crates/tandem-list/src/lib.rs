#![doc = r"Item reuse engine for virtualised lists.

[`ListEngine`] decides which native row (sign) shows which item index and
queues [`ListUpdateBatch`]es describing changes to the list's item set.
[`ListAttribute`] is the receiving end of those batches."]

pub mod actions;
pub mod attribute;
pub mod engine;
pub mod error;
pub mod item;
pub mod pending;

pub use actions::{InsertAction, ListUpdateBatch, UpdateAction};
pub use attribute::{ListAttribute, ListEntry};
pub use engine::{EnterOutcome, LeaveOutcome, ListConfig, ListEngine, SignState};
pub use error::ListError;
pub use item::{ListItemSpec, ITEM_KEY};
pub use pending::PendingListUpdates;

/// A list is addressed by the snapshot id of its instance.
pub type ListId = tandem_core::SnapshotId;

/// Opaque identity of a native list row.
pub type Sign = i32;

#[cfg(test)]
#[path = "tests/engine_tests.rs"]
mod engine_tests;

#[cfg(test)]
#[path = "tests/diff_tests.rs"]
mod diff_tests;

#[cfg(test)]
#[path = "tests/wire_tests.rs"]
mod wire_tests;
