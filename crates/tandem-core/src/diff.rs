//! Generation-to-generation diff of snapshot trees.
//!
//! The walk is pre-order over the next generation. Instances present in both
//! generations get per-slot value updates and a child reconciliation; new
//! instances are created together with their subtree. Removals are emitted
//! last, one per removed subtree, so anything moved out of a removed parent
//! has already been re-homed when the parent is destroyed.

use crate::collections::IdSet;
use crate::collections::map::HashMap;
use crate::error::DiffError;
use crate::lis::longest_increasing_subsequence;
use crate::patch::PatchOp;
use crate::snapshot::{SnapshotId, SnapshotInstance, SnapshotTree, ROOT_ID};

/// Tunables for [`diff_with_options`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffOptions {
    /// Above this share of moved surviving children, a non-root parent gets a
    /// single `UpdateChildren` instead of one `InsertBefore` per move.
    pub update_children_ratio: f32,
    /// Minimum number of moves before `UpdateChildren` is considered.
    pub update_children_min_moves: usize,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            update_children_ratio: 0.5,
            update_children_min_moves: 2,
        }
    }
}

/// Computes the operations turning a tree mirroring `previous` into one
/// mirroring `next`.
pub fn diff(previous: &SnapshotTree, next: &SnapshotTree) -> Result<Vec<PatchOp>, DiffError> {
    diff_with_options(previous, next, &DiffOptions::default())
}

pub fn diff_with_options(
    previous: &SnapshotTree,
    next: &SnapshotTree,
    options: &DiffOptions,
) -> Result<Vec<PatchOp>, DiffError> {
    Differ {
        previous,
        next,
        options,
        ops: Vec::new(),
        visited: IdSet::default(),
    }
    .run()
}

struct Differ<'a> {
    previous: &'a SnapshotTree,
    next: &'a SnapshotTree,
    options: &'a DiffOptions,
    ops: Vec<PatchOp>,
    visited: IdSet,
}

impl<'a> Differ<'a> {
    fn run(mut self) -> Result<Vec<PatchOp>, DiffError> {
        self.diff_existing(ROOT_ID)?;

        // Detached instances are mirrored too, in id order for determinism.
        for id in self.next.ids() {
            if self.visited.contains(&id) {
                continue;
            }
            if self.previous.contains(id) {
                self.diff_existing(id)?;
            } else {
                self.create_subtree(id)?;
            }
        }

        let removed = self.removal_roots();
        self.ops
            .extend(removed.into_iter().map(|id| PatchOp::Remove { id }));
        Ok(self.ops)
    }

    fn old(&self, id: SnapshotId) -> Result<&'a SnapshotInstance, DiffError> {
        self.previous.get(id).ok_or(DiffError::Missing { id })
    }

    fn new(&self, id: SnapshotId) -> Result<&'a SnapshotInstance, DiffError> {
        self.next.get(id).ok_or(DiffError::Missing { id })
    }

    fn diff_existing(&mut self, id: SnapshotId) -> Result<(), DiffError> {
        self.visited.insert(id);
        let old = self.old(id)?;
        let new = self.new(id)?;

        if old.ty() != new.ty() {
            return Err(DiffError::TypeChanged { id });
        }
        if old.values().len() != new.values().len() {
            return Err(DiffError::ArityChanged {
                id,
                previous: old.values().len(),
                next: new.values().len(),
            });
        }
        for (index, (before, after)) in old.values().iter().zip(new.values()).enumerate() {
            if before != after {
                self.ops.push(PatchOp::UpdateValue {
                    id,
                    index,
                    value: after.clone(),
                });
            }
        }

        self.diff_children(id, old.children(), new.children())?;

        for &child in new.children() {
            if !self.visited.contains(&child) && self.previous.contains(child) {
                self.diff_existing(child)?;
            }
        }
        Ok(())
    }

    fn create_subtree(&mut self, id: SnapshotId) -> Result<(), DiffError> {
        self.visited.insert(id);
        let node = self.new(id)?;
        self.ops.push(PatchOp::Create {
            id,
            ty: node.ty().map(str::to_owned),
            values: node.values().to_vec(),
        });
        for &child in node.children() {
            self.ensure_exists(child)?;
            self.ops.push(PatchOp::InsertBefore {
                id: child,
                parent: id,
                before: None,
            });
        }
        Ok(())
    }

    /// Creates `id` if it is new; otherwise brings the existing instance up to date.
    fn ensure_exists(&mut self, id: SnapshotId) -> Result<(), DiffError> {
        if self.visited.contains(&id) {
            return Ok(());
        }
        if self.previous.contains(id) {
            self.diff_existing(id)
        } else {
            self.create_subtree(id)
        }
    }

    fn diff_children(
        &mut self,
        parent: SnapshotId,
        old: &[SnapshotId],
        new: &[SnapshotId],
    ) -> Result<(), DiffError> {
        if old == new {
            return Ok(());
        }

        let old_positions: HashMap<SnapshotId, usize> =
            old.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        // Surviving children kept in place: the LIS of their old positions.
        let survivors: Vec<(SnapshotId, usize)> = new
            .iter()
            .filter_map(|id| old_positions.get(id).map(|pos| (*id, *pos)))
            .collect();
        let positions: Vec<usize> = survivors.iter().map(|(_, pos)| *pos).collect();
        let stay: IdSet = longest_increasing_subsequence(&positions)
            .into_iter()
            .map(|i| survivors[i].0)
            .collect();
        let moved_survivors = survivors.len() - stay.len();

        // A child that still exists but no longer has a parent can only be
        // detached by rewriting the list.
        let mut needs_detach = false;
        for id in old {
            if new.contains(id) {
                continue;
            }
            if let Some(node) = self.next.get(*id) {
                if node.parent().is_none() {
                    needs_detach = true;
                }
            }
        }

        for &child in new {
            if !self.previous.contains(child) && !self.visited.contains(&child) {
                self.create_subtree(child)?;
            }
        }

        let rewrite = parent != ROOT_ID
            && (needs_detach
                || (moved_survivors >= self.options.update_children_min_moves
                    && moved_survivors as f32
                        > self.options.update_children_ratio * survivors.len() as f32));
        if rewrite {
            self.ops.push(PatchOp::UpdateChildren {
                id: parent,
                children: new.to_vec(),
            });
            return Ok(());
        }
        if needs_detach {
            let id = old
                .iter()
                .copied()
                .find(|id| !new.contains(id) && self.next.contains(*id))
                .unwrap_or(parent);
            return Err(DiffError::DetachedFromRoot { id });
        }

        for (index, &child) in new.iter().enumerate().rev() {
            if stay.contains(&child) {
                continue;
            }
            self.ops.push(PatchOp::InsertBefore {
                id: child,
                parent,
                before: new.get(index + 1).copied(),
            });
        }
        Ok(())
    }

    fn removal_roots(&self) -> Vec<SnapshotId> {
        self.previous
            .ids()
            .into_iter()
            .filter(|id| *id != ROOT_ID && !self.next.contains(*id))
            .filter(|id| {
                match self.previous.get(*id).and_then(SnapshotInstance::parent) {
                    // Destroyed together with a removed ancestor.
                    Some(parent) => self.next.contains(parent),
                    None => true,
                }
            })
            .collect()
    }
}
