//! Background render session.
//!
//! The external reconciler reports what it rendered as [`RenderEvent`]s. The
//! session folds them into a working tree and, on [`commit`](SnapshotSession::commit),
//! diffs the working tree against the last committed generation to produce
//! the next [`PatchBatch`].

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::collections::IdSet;
use crate::diff::{diff_with_options, DiffOptions};
use crate::error::{DiffError, TreeError};
use crate::patch::PatchBatch;
use crate::snapshot::{IdAllocator, SnapshotId, SnapshotInstance, SnapshotTree};

/// Notification from the component reconciler, in render order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderEvent {
    Created {
        id: SnapshotId,
        #[serde(rename = "type")]
        ty: Option<String>,
        values: Vec<Value>,
        #[serde(default)]
        container: bool,
        #[serde(default)]
        extra_props: Option<Value>,
    },
    Updated {
        id: SnapshotId,
        #[serde(default)]
        values: Option<Vec<Value>>,
        #[serde(default)]
        children: Option<Vec<SnapshotId>>,
    },
    Removed {
        id: SnapshotId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    Tree(TreeError),
    Diff(DiffError),
    /// The id was not handed out by this session's allocator.
    UnallocatedId { id: SnapshotId },
    /// The id belonged to an instance that was already created once.
    IdReused { id: SnapshotId },
    /// An update changed the number of values; arity is fixed per instance.
    ArityChanged {
        id: SnapshotId,
        previous: usize,
        next: usize,
    },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Tree(err) => write!(f, "tree error: {err}"),
            SessionError::Diff(err) => write!(f, "diff error: {err}"),
            SessionError::UnallocatedId { id } => {
                write!(f, "id {id} was not allocated by this session")
            }
            SessionError::IdReused { id } => write!(f, "id {id} was already used"),
            SessionError::ArityChanged { id, previous, next } => write!(
                f,
                "update of instance {id} changed value arity from {previous} to {next}"
            ),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<TreeError> for SessionError {
    fn from(err: TreeError) -> Self {
        SessionError::Tree(err)
    }
}

impl From<DiffError> for SessionError {
    fn from(err: DiffError) -> Self {
        SessionError::Diff(err)
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotSession {
    ids: IdAllocator,
    used: IdSet,
    working: SnapshotTree,
    committed: SnapshotTree,
    revision: u64,
    options: DiffOptions,
}

impl Default for SnapshotSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotSession {
    pub fn new() -> Self {
        Self::with_options(DiffOptions::default())
    }

    pub fn with_options(options: DiffOptions) -> Self {
        Self {
            ids: IdAllocator::new(),
            used: IdSet::default(),
            working: SnapshotTree::new(),
            committed: SnapshotTree::new(),
            revision: 0,
            options,
        }
    }

    pub fn allocate_id(&mut self) -> SnapshotId {
        self.ids.allocate()
    }

    pub fn working(&self) -> &SnapshotTree {
        &self.working
    }

    pub fn committed(&self) -> &SnapshotTree {
        &self.committed
    }

    /// Revision of the last committed batch (0 before the first commit).
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Seeds both generations with the tree the main thread rendered
    /// synchronously, so the first commit only carries the delta.
    pub fn adopt_first_screen(&mut self, tree: SnapshotTree) {
        for id in tree.ids() {
            self.ids.reserve_through(id);
            self.used.insert(id);
        }
        log::debug!("adopted first-screen tree with {} instances", tree.len());
        self.committed = tree.clone();
        self.working = tree;
    }

    pub fn handle(&mut self, event: RenderEvent) -> Result<(), SessionError> {
        match event {
            RenderEvent::Created {
                id,
                ty,
                values,
                container,
                extra_props,
            } => {
                if !self.ids.issued(id) {
                    return Err(SessionError::UnallocatedId { id });
                }
                if !self.used.insert(id) {
                    return Err(SessionError::IdReused { id });
                }
                let mut instance = SnapshotInstance::new(id, ty, values);
                if container {
                    instance = instance.container();
                }
                if let Some(extra_props) = extra_props {
                    instance = instance.with_extra_props(extra_props);
                }
                self.working.insert(instance)?;
            }
            RenderEvent::Updated {
                id,
                values,
                children,
            } => {
                if let (Some(values), Some(instance)) = (&values, self.working.get(id)) {
                    if values.len() != instance.values().len() {
                        return Err(SessionError::ArityChanged {
                            id,
                            previous: instance.values().len(),
                            next: values.len(),
                        });
                    }
                }
                if let Some(values) = values {
                    self.working.replace_values(id, values)?;
                }
                if let Some(children) = children {
                    self.working.set_children(id, children)?;
                }
            }
            RenderEvent::Removed { id } => {
                self.working.remove(id)?;
            }
        }
        Ok(())
    }

    pub fn handle_all(
        &mut self,
        events: impl IntoIterator<Item = RenderEvent>,
    ) -> Result<(), SessionError> {
        for event in events {
            self.handle(event)?;
        }
        Ok(())
    }

    /// Diffs the working tree against the committed one. Returns `None` when
    /// nothing changed.
    pub fn commit(&mut self) -> Result<Option<PatchBatch>, SessionError> {
        let ops = diff_with_options(&self.committed, &self.working, &self.options)?;
        if ops.is_empty() {
            return Ok(None);
        }
        self.revision += 1;
        log::debug!("commit r{}: {} ops", self.revision, ops.len());
        self.committed = self.working.clone();
        Ok(Some(PatchBatch::new(self.revision, &ops)))
    }

    /// Batch that rebuilds the whole working tree on an empty main-thread tree.
    /// Sent after the main thread rejected a batch and reset itself.
    pub fn resend_full(&mut self) -> Result<PatchBatch, SessionError> {
        let ops = diff_with_options(&SnapshotTree::new(), &self.working, &self.options)?;
        self.revision += 1;
        log::warn!("full resend r{}: {} ops", self.revision, ops.len());
        self.committed = self.working.clone();
        Ok(PatchBatch::new(self.revision, &ops))
    }
}
