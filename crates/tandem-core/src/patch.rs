//! Patch operations exchanged between the background and the main thread.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::SnapshotId;

/// Wire opcode. The discriminant is the number written to the stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Create = 0,
    Remove = 1,
    InsertBefore = 2,
    UpdateValue = 3,
    UpdateChildren = 4,
}

impl Opcode {
    pub fn from_wire(raw: u64) -> Option<Self> {
        match raw {
            0 => Some(Opcode::Create),
            1 => Some(Opcode::Remove),
            2 => Some(Opcode::InsertBefore),
            3 => Some(Opcode::UpdateValue),
            4 => Some(Opcode::UpdateChildren),
            _ => None,
        }
    }

    pub fn to_wire(self) -> u64 {
        self as u64
    }
}

/// One tree mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchOp {
    /// Creates a detached instance.
    Create {
        id: SnapshotId,
        ty: Option<String>,
        values: Vec<Value>,
    },
    /// Detaches and destroys `id` with its subtree.
    Remove { id: SnapshotId },
    /// Inserts (or moves) `id` under `parent`; appends when `before` is `None`.
    InsertBefore {
        id: SnapshotId,
        parent: SnapshotId,
        before: Option<SnapshotId>,
    },
    /// Writes a single value slot.
    UpdateValue {
        id: SnapshotId,
        index: usize,
        value: Value,
    },
    /// Replaces the child list of `id`.
    UpdateChildren {
        id: SnapshotId,
        children: Vec<SnapshotId>,
    },
}

impl PatchOp {
    pub fn opcode(&self) -> Opcode {
        match self {
            PatchOp::Create { .. } => Opcode::Create,
            PatchOp::Remove { .. } => Opcode::Remove,
            PatchOp::InsertBefore { .. } => Opcode::InsertBefore,
            PatchOp::UpdateValue { .. } => Opcode::UpdateValue,
            PatchOp::UpdateChildren { .. } => Opcode::UpdateChildren,
        }
    }

    /// Instance the operation acts on.
    pub fn target(&self) -> SnapshotId {
        match self {
            PatchOp::Create { id, .. }
            | PatchOp::Remove { id }
            | PatchOp::InsertBefore { id, .. }
            | PatchOp::UpdateValue { id, .. }
            | PatchOp::UpdateChildren { id, .. } => *id,
        }
    }

    /// Whether the operation changes tree shape rather than values.
    pub fn is_structural(&self) -> bool {
        !matches!(self, PatchOp::UpdateValue { .. })
    }
}

/// Encoded patch stream with the revision it advances the tree to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchBatch {
    pub revision: u64,
    pub ops: Vec<Value>,
}

impl PatchBatch {
    pub fn new(revision: u64, ops: &[PatchOp]) -> Self {
        Self {
            revision,
            ops: crate::codec::encode(ops),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
