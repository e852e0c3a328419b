#![doc = r"Core of a dual-context UI runtime.

The background context renders into a [`SnapshotTree`]; [`diff`] turns two
generations into a flat [`PatchOp`] stream which is shipped through the
[`codec`] and replayed on the main thread by [`MainThreadTree`]."]

pub extern crate self as tandem_core;

pub mod codec;
pub mod collections;
pub mod diff;
pub mod element;
pub mod error;
pub mod lis;
pub mod main_thread;
pub mod patch;
pub mod session;
pub mod snapshot;
pub mod template;

pub use diff::{diff, diff_with_options, DiffOptions};
pub use element::{ElementApi, ElementCall, ElementHandle, EventHandler, MemoryElementApi};
pub use error::{
    DiffError, ErrorSink, LogSink, MalformedReason, RecordingSink, RuntimeError, TreeError,
};
pub use main_thread::{ApplyReport, MainThreadTree};
pub use patch::{Opcode, PatchBatch, PatchOp};
pub use serde_json;
pub use session::{RenderEvent, SessionError, SnapshotSession};
pub use snapshot::{IdAllocator, SnapshotId, SnapshotInstance, SnapshotTree, ROOT_ID};
pub use template::{DynamicPart, ElementDef, Template, TemplateRegistry};

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

#[cfg(test)]
#[path = "tests/snapshot_tests.rs"]
mod snapshot_tests;

#[cfg(test)]
#[path = "tests/diff_tests.rs"]
mod diff_tests;

#[cfg(test)]
#[path = "tests/codec_tests.rs"]
mod codec_tests;

#[cfg(test)]
#[path = "tests/main_thread_tests.rs"]
mod main_thread_tests;

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod session_tests;
