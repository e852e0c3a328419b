//! Error taxonomy and the single reporting sink.
//!
//! Nothing in this crate panics across the context boundary. Fatal batch
//! failures and non-fatal element problems are both routed through an
//! [`ErrorSink`]; callers additionally receive fatal failures as `Err`.

use std::cell::RefCell;
use std::fmt;

use serde_json::Value;

use crate::patch::Opcode;
use crate::SnapshotId;

/// Structural violation detected by [`SnapshotTree`](crate::SnapshotTree).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    Missing { id: SnapshotId },
    Duplicate { id: SnapshotId },
    RootTarget,
    Leaf { id: SnapshotId },
    NotAChild { parent: SnapshotId, child: SnapshotId },
    Cycle { parent: SnapshotId, child: SnapshotId },
    DuplicateChild { parent: SnapshotId, child: SnapshotId },
    IndexOutOfRange { id: SnapshotId, index: usize, len: usize },
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeError::Missing { id } => write!(f, "instance {id} missing"),
            TreeError::Duplicate { id } => write!(f, "instance {id} already exists"),
            TreeError::RootTarget => write!(f, "root instance cannot be a structural target"),
            TreeError::Leaf { id } => write!(f, "instance {id} is a leaf and cannot hold children"),
            TreeError::NotAChild { parent, child } => {
                write!(f, "instance {child} is not a child of {parent}")
            }
            TreeError::Cycle { parent, child } => {
                write!(f, "inserting {child} under {parent} would create a cycle")
            }
            TreeError::DuplicateChild { parent, child } => {
                write!(f, "instance {child} listed twice under {parent}")
            }
            TreeError::IndexOutOfRange { id, index, len } => {
                write!(f, "value index {index} out of range for instance {id} (len {len})")
            }
        }
    }
}

impl std::error::Error for TreeError {}

/// Why a patch batch was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum MalformedReason {
    UnknownOpcode { offset: usize, opcode: Value },
    Truncated { offset: usize, opcode: Opcode },
    InvalidOperand { offset: usize, expected: &'static str },
    UnknownTemplate { id: SnapshotId, ty: String },
    Structure { op: usize, error: TreeError },
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedReason::UnknownOpcode { offset, opcode } => {
                write!(f, "unknown opcode {opcode} at offset {offset}")
            }
            MalformedReason::Truncated { offset, opcode } => {
                write!(f, "truncated {opcode:?} payload at offset {offset}")
            }
            MalformedReason::InvalidOperand { offset, expected } => {
                write!(f, "expected {expected} at offset {offset}")
            }
            MalformedReason::UnknownTemplate { id, ty } => {
                write!(f, "instance {id} uses unregistered template `{ty}`")
            }
            MalformedReason::Structure { op, error } => write!(f, "operation {op}: {error}"),
        }
    }
}

/// Errors delivered to the [`ErrorSink`].
///
/// Hydration mismatches between worklet contexts are expected and never
/// reach the sink; they are logged at debug level by the worklet runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// Fatal for the batch: nothing from it was applied.
    MalformedPatch { reason: MalformedReason },
    /// A dynamic part points past the instance's materialised elements.
    UnknownElementIndex {
        id: SnapshotId,
        element: usize,
        materialized: usize,
    },
    /// A main-thread handler value has the wrong shape; the handler was not installed.
    InvalidWorkletValue { attribute: String, tag: String },
}

impl RuntimeError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, RuntimeError::MalformedPatch { .. })
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::MalformedPatch { reason } => write!(f, "malformed patch: {reason}"),
            RuntimeError::UnknownElementIndex {
                id,
                element,
                materialized,
            } => write!(
                f,
                "instance {id} has no element {element} ({materialized} materialised)"
            ),
            RuntimeError::InvalidWorkletValue { attribute, tag } => write!(
                f,
                "invalid main-thread handler for `{attribute}` on <{tag}>: expected a worklet object"
            ),
        }
    }
}

impl std::error::Error for RuntimeError {}

/// Failure while diffing two snapshot generations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffError {
    Missing { id: SnapshotId },
    TypeChanged { id: SnapshotId },
    ArityChanged { id: SnapshotId, previous: usize, next: usize },
    DetachedFromRoot { id: SnapshotId },
}

impl fmt::Display for DiffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffError::Missing { id } => write!(f, "instance {id} referenced but missing"),
            DiffError::TypeChanged { id } => write!(f, "instance {id} changed template type"),
            DiffError::ArityChanged { id, previous, next } => write!(
                f,
                "instance {id} changed value arity from {previous} to {next}"
            ),
            DiffError::DetachedFromRoot { id } => write!(
                f,
                "instance {id} was detached from the root without being removed"
            ),
        }
    }
}

impl std::error::Error for DiffError {}

/// Single reporting channel for runtime errors.
pub trait ErrorSink {
    fn report(&self, error: RuntimeError);
}

/// Forwards every error to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ErrorSink for LogSink {
    fn report(&self, error: RuntimeError) {
        if error.is_fatal() {
            log::error!("{error}");
        } else {
            log::warn!("{error}");
        }
    }
}

/// Collects reported errors for inspection.
#[derive(Debug, Default)]
pub struct RecordingSink {
    errors: RefCell<Vec<RuntimeError>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> Vec<RuntimeError> {
        self.errors.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.errors.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.borrow().is_empty()
    }

    pub fn take(&self) -> Vec<RuntimeError> {
        std::mem::take(&mut *self.errors.borrow_mut())
    }
}

impl ErrorSink for RecordingSink {
    fn report(&self, error: RuntimeError) {
        log::debug!("recorded runtime error: {error}");
        self.errors.borrow_mut().push(error);
    }
}
