//! Snapshot tree: the arena of render-output instances.
//!
//! Instances refer to their parent and children by id only, so a tree can be
//! cloned, compared and shipped between contexts without chasing pointers.
//! The root (`ROOT_ID`) always exists and cannot be removed or moved.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;

use crate::collections::map::HashSet;
use crate::collections::IdMap;
use crate::element::ElementHandle;
use crate::error::TreeError;

pub type SnapshotId = i64;

/// Reserved id of the root instance.
pub const ROOT_ID: SnapshotId = -1;

/// Hands out snapshot ids for one session. Ids only ever grow.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: SnapshotId,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn starting_at(next: SnapshotId) -> Self {
        Self { next: next.max(1) }
    }

    pub fn allocate(&mut self) -> SnapshotId {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Next id that [`allocate`](Self::allocate) will return.
    pub fn peek(&self) -> SnapshotId {
        self.next
    }

    /// Whether `id` was handed out by this allocator.
    pub fn issued(&self, id: SnapshotId) -> bool {
        id >= 1 && id < self.next
    }

    /// Moves the counter past `id` so it is never handed out again.
    pub fn reserve_through(&mut self, id: SnapshotId) {
        if id >= self.next {
            self.next = id + 1;
        }
    }
}

/// One render-output node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotInstance {
    id: SnapshotId,
    #[serde(rename = "type")]
    ty: Option<String>,
    values: Vec<Value>,
    children: Option<Vec<SnapshotId>>,
    #[serde(skip)]
    parent: Option<SnapshotId>,
    #[serde(rename = "extraProps", default, skip_serializing_if = "Option::is_none")]
    extra_props: Option<Value>,
    #[serde(skip)]
    elements: Vec<ElementHandle>,
}

impl SnapshotInstance {
    /// Creates a leaf instance. Use [`container`](Self::container) to let it hold children.
    pub fn new(id: SnapshotId, ty: Option<String>, values: Vec<Value>) -> Self {
        Self {
            id,
            ty,
            values,
            children: None,
            parent: None,
            extra_props: None,
            elements: Vec::new(),
        }
    }

    /// Raw-value instance rendering `value` as text.
    pub fn raw(id: SnapshotId, value: Value) -> Self {
        Self::new(id, None, vec![value])
    }

    pub fn container(mut self) -> Self {
        self.children.get_or_insert_with(Vec::new);
        self
    }

    pub fn with_extra_props(mut self, extra_props: Value) -> Self {
        self.extra_props = Some(extra_props);
        self
    }

    pub fn id(&self) -> SnapshotId {
        self.id
    }

    pub fn ty(&self) -> Option<&str> {
        self.ty.as_deref()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Child ids in order; empty for leaves.
    pub fn children(&self) -> &[SnapshotId] {
        self.children.as_deref().unwrap_or(&[])
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    pub fn parent(&self) -> Option<SnapshotId> {
        self.parent
    }

    pub fn extra_props(&self) -> Option<&Value> {
        self.extra_props.as_ref()
    }

    /// Native elements bound after the main thread materialised this instance.
    pub fn elements(&self) -> &[ElementHandle] {
        &self.elements
    }

    pub(crate) fn bind_elements(&mut self, elements: Vec<ElementHandle>) {
        self.elements = elements;
    }
}

/// Arena of [`SnapshotInstance`]s rooted at [`ROOT_ID`].
#[derive(Debug, Clone)]
pub struct SnapshotTree {
    nodes: IdMap<SnapshotInstance>,
}

impl Default for SnapshotTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotTree {
    pub fn new() -> Self {
        let mut nodes = IdMap::default();
        nodes.insert(ROOT_ID, SnapshotInstance::new(ROOT_ID, None, Vec::new()).container());
        Self { nodes }
    }

    pub fn get(&self, id: SnapshotId) -> Option<&SnapshotInstance> {
        self.nodes.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: SnapshotId) -> Option<&mut SnapshotInstance> {
        self.nodes.get_mut(&id)
    }

    fn require(&self, id: SnapshotId) -> Result<&SnapshotInstance, TreeError> {
        self.nodes.get(&id).ok_or(TreeError::Missing { id })
    }

    fn require_mut(&mut self, id: SnapshotId) -> Result<&mut SnapshotInstance, TreeError> {
        self.nodes.get_mut(&id).ok_or(TreeError::Missing { id })
    }

    pub fn contains(&self, id: SnapshotId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Number of instances, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when only the root is present.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// All ids in ascending order, root included.
    pub fn ids(&self) -> Vec<SnapshotId> {
        let mut ids: Vec<_> = self.nodes.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Child ids of the root instance.
    pub fn root_children(&self) -> &[SnapshotId] {
        self.nodes
            .get(&ROOT_ID)
            .map(SnapshotInstance::children)
            .unwrap_or(&[])
    }

    /// Adds a detached instance.
    pub fn insert(&mut self, mut instance: SnapshotInstance) -> Result<(), TreeError> {
        if self.nodes.contains_key(&instance.id) {
            return Err(TreeError::Duplicate { id: instance.id });
        }
        instance.parent = None;
        if let Some(children) = instance.children.as_mut() {
            // Children are attached explicitly through insert_before/set_children.
            children.clear();
        }
        self.nodes.insert(instance.id, instance);
        Ok(())
    }

    /// Inserts `child` into `parent` before `before` (append when `None`),
    /// moving it out of its current parent first.
    pub fn insert_before(
        &mut self,
        parent: SnapshotId,
        child: SnapshotId,
        before: Option<SnapshotId>,
    ) -> Result<(), TreeError> {
        if child == ROOT_ID {
            return Err(TreeError::RootTarget);
        }
        self.require(child)?;
        if self.require(parent)?.is_leaf() {
            return Err(TreeError::Leaf { id: parent });
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(TreeError::Cycle { parent, child });
        }
        if let Some(before) = before {
            let siblings = self.require(parent)?.children();
            if before == child || !siblings.contains(&before) {
                return Err(TreeError::NotAChild {
                    parent,
                    child: before,
                });
            }
        }

        self.detach(child)?;
        let node = self.require_mut(parent)?;
        let children = node.children.get_or_insert_with(Vec::new);
        let position = before
            .and_then(|b| children.iter().position(|c| *c == b))
            .unwrap_or(children.len());
        children.insert(position, child);
        self.require_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Detaches `id` from its parent, returning the former parent.
    pub fn detach(&mut self, id: SnapshotId) -> Result<Option<SnapshotId>, TreeError> {
        if id == ROOT_ID {
            return Err(TreeError::RootTarget);
        }
        let parent = self.require(id)?.parent;
        if let Some(parent) = parent {
            if let Some(children) = self.require_mut(parent)?.children.as_mut() {
                children.retain(|c| *c != id);
            }
            self.require_mut(id)?.parent = None;
        }
        Ok(parent)
    }

    /// Removes `id` and its whole subtree. Returns the destroyed ids in pre-order.
    pub fn remove(&mut self, id: SnapshotId) -> Result<Vec<SnapshotId>, TreeError> {
        if id == ROOT_ID {
            return Err(TreeError::RootTarget);
        }
        self.detach(id)?;
        let removed = self.subtree(id);
        for removed_id in &removed {
            self.nodes.remove(removed_id);
        }
        Ok(removed)
    }

    /// Replaces the child list of `parent`. Previous children missing from
    /// `children` are detached (not destroyed) and returned.
    pub fn set_children(
        &mut self,
        parent: SnapshotId,
        children: Vec<SnapshotId>,
    ) -> Result<Vec<SnapshotId>, TreeError> {
        if self.require(parent)?.is_leaf() && !children.is_empty() {
            return Err(TreeError::Leaf { id: parent });
        }
        let mut seen: HashSet<SnapshotId> = HashSet::default();
        for &child in &children {
            if child == ROOT_ID {
                return Err(TreeError::RootTarget);
            }
            self.require(child)?;
            if !seen.insert(child) {
                return Err(TreeError::DuplicateChild { parent, child });
            }
            if self.is_ancestor_or_self(child, parent) {
                return Err(TreeError::Cycle { parent, child });
            }
        }

        let previous: SmallVec<[SnapshotId; 8]> =
            self.require(parent)?.children().iter().copied().collect();
        let mut detached = Vec::new();
        for old in previous {
            if !seen.contains(&old) {
                self.require_mut(old)?.parent = None;
                detached.push(old);
            }
        }
        for &child in &children {
            let current = self.require(child)?.parent;
            if current != Some(parent) {
                self.detach(child)?;
                self.require_mut(child)?.parent = Some(parent);
            }
        }
        if let Some(list) = self.require_mut(parent)?.children.as_mut() {
            *list = children;
        }
        Ok(detached)
    }

    /// Writes one value. Returns whether the stored value changed.
    pub fn set_value(
        &mut self,
        id: SnapshotId,
        index: usize,
        value: Value,
    ) -> Result<bool, TreeError> {
        let node = self.require_mut(id)?;
        let len = node.values.len();
        let slot = node
            .values
            .get_mut(index)
            .ok_or(TreeError::IndexOutOfRange { id, index, len })?;
        if *slot == value {
            return Ok(false);
        }
        *slot = value;
        Ok(true)
    }

    /// Replaces the whole value array of `id`.
    pub fn replace_values(&mut self, id: SnapshotId, values: Vec<Value>) -> Result<(), TreeError> {
        self.require_mut(id)?.values = values;
        Ok(())
    }

    pub fn set_extra_props(
        &mut self,
        id: SnapshotId,
        extra_props: Option<Value>,
    ) -> Result<(), TreeError> {
        self.require_mut(id)?.extra_props = extra_props;
        Ok(())
    }

    /// Ids of `id` and all its descendants, pre-order.
    pub fn subtree(&self, id: SnapshotId) -> Vec<SnapshotId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get(&current) {
                out.push(current);
                stack.extend(node.children().iter().rev().copied());
            }
        }
        out
    }

    /// Ids reachable from the root, pre-order, root first.
    pub fn pre_order(&self) -> Vec<SnapshotId> {
        self.subtree(ROOT_ID)
    }

    /// Whether `ancestor` is `id` itself or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: SnapshotId, id: SnapshotId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.nodes.get(&node).and_then(|n| n.parent);
        }
        false
    }

    /// Same ids, types, values and child order for everything reachable from
    /// the root. Element bindings and extra props are not compared.
    pub fn observably_eq(&self, other: &SnapshotTree) -> bool {
        let order = self.pre_order();
        if order != other.pre_order() {
            return false;
        }
        order.iter().all(|id| match (self.get(*id), other.get(*id)) {
            (Some(a), Some(b)) => {
                a.ty == b.ty && a.values == b.values && a.children() == b.children()
            }
            _ => false,
        })
    }

    /// Renders the reachable tree as indented text for debugging.
    pub fn dump(&self) -> String {
        let mut output = String::new();
        self.dump_node(&mut output, ROOT_ID, 0);
        output
    }

    fn dump_node(&self, output: &mut String, id: SnapshotId, depth: usize) {
        let indent = "  ".repeat(depth);
        match self.nodes.get(&id) {
            Some(node) => {
                let ty = node.ty.as_deref().unwrap_or("#raw");
                let values = serde_json::to_string(&node.values).unwrap_or_default();
                output.push_str(&format!("{indent}[{id}] {ty} {values}\n"));
                for child in node.children() {
                    self.dump_node(output, *child, depth + 1);
                }
            }
            None => output.push_str(&format!("{indent}[{id}] (missing)\n")),
        }
    }
}
