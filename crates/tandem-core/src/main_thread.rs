//! Main-thread mirror of the snapshot tree and the batch apply.
//!
//! A batch is applied in two phases. The decoded operations are first replayed
//! against a staged clone of the tree; any structural violation rejects the
//! whole batch before a single native call is made. Only then are the
//! operations replayed for real, in stream order, driving the [`ElementApi`].
//! Element-level problems found in the second phase skip just the affected
//! effect.

use serde_json::Value;

use crate::codec;
use crate::element::{
    parse_worklet_value, ElementApi, ElementHandle, EventHandler, WorkletValue, PAGE_TAG,
    RAW_TEXT_TAG,
};
use crate::error::{ErrorSink, MalformedReason, RuntimeError, TreeError};
use crate::patch::{PatchBatch, PatchOp};
use crate::snapshot::{SnapshotId, SnapshotInstance, SnapshotTree, ROOT_ID};
use crate::template::{qualified_main_thread_attribute, DynamicPart, TemplateRegistry};

/// Counters for one applied batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: usize,
    pub skipped_effects: usize,
}

pub struct MainThreadTree {
    tree: SnapshotTree,
    templates: TemplateRegistry,
    page: ElementHandle,
    revision: Option<u64>,
}

impl std::fmt::Debug for MainThreadTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainThreadTree")
            .field("instances", &self.tree.len())
            .field("templates", &self.templates.len())
            .field("page", &self.page)
            .field("revision", &self.revision)
            .finish()
    }
}

impl MainThreadTree {
    /// Creates an empty tree whose root is bound to a fresh page element.
    pub fn new(templates: TemplateRegistry, api: &mut dyn ElementApi) -> Self {
        let page = api.create_element(PAGE_TAG);
        let mut tree = SnapshotTree::new();
        if let Some(root) = tree.get_mut(ROOT_ID) {
            root.bind_elements(vec![page]);
        }
        Self {
            tree,
            templates,
            page,
            revision: None,
        }
    }

    pub fn tree(&self) -> &SnapshotTree {
        &self.tree
    }

    pub fn page(&self) -> ElementHandle {
        self.page
    }

    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    pub fn templates_mut(&mut self) -> &mut TemplateRegistry {
        &mut self.templates
    }

    /// Revision of the last batch applied through [`apply_batch`](Self::apply_batch).
    pub fn revision(&self) -> Option<u64> {
        self.revision
    }

    pub fn apply_batch(
        &mut self,
        api: &mut dyn ElementApi,
        batch: &PatchBatch,
        sink: &dyn ErrorSink,
    ) -> Result<ApplyReport, RuntimeError> {
        let report = self.apply_stream(api, &batch.ops, sink)?;
        self.revision = Some(batch.revision);
        Ok(report)
    }

    pub fn apply_stream(
        &mut self,
        api: &mut dyn ElementApi,
        stream: &[Value],
        sink: &dyn ErrorSink,
    ) -> Result<ApplyReport, RuntimeError> {
        match codec::decode(stream) {
            Ok(ops) => self.apply_ops(api, &ops, sink),
            Err(reason) => Err(reject(reason, sink)),
        }
    }

    pub fn apply_ops(
        &mut self,
        api: &mut dyn ElementApi,
        ops: &[PatchOp],
        sink: &dyn ErrorSink,
    ) -> Result<ApplyReport, RuntimeError> {
        if let Err(reason) = self.validate(ops) {
            return Err(reject(reason, sink));
        }

        let mut report = ApplyReport::default();
        for (index, op) in ops.iter().enumerate() {
            if let Err(error) = self.apply_op(api, op, sink, &mut report) {
                // Only reachable if the tree changed between validation and apply.
                log::error!("operation {index} failed after validation: {error}");
                return Err(reject(MalformedReason::Structure { op: index, error }, sink));
            }
            report.applied += 1;
        }
        log::debug!(
            "applied {} ops ({} effects skipped)",
            report.applied,
            report.skipped_effects
        );
        Ok(report)
    }

    /// Drops every instance and releases their elements, keeping the page.
    /// Used to resynchronise after a rejected batch.
    pub fn reset(&mut self, api: &mut dyn ElementApi) {
        for id in self.tree.ids() {
            if id == ROOT_ID {
                continue;
            }
            if let Some(node) = self.tree.get(id) {
                for element in node.elements().iter().rev() {
                    api.release_element(*element);
                }
            }
        }
        self.tree = SnapshotTree::new();
        if let Some(root) = self.tree.get_mut(ROOT_ID) {
            root.bind_elements(vec![self.page]);
        }
        self.revision = None;
    }

    fn instance_for(
        &self,
        id: SnapshotId,
        ty: &Option<String>,
        values: &[Value],
    ) -> SnapshotInstance {
        let instance = SnapshotInstance::new(id, ty.clone(), values.to_vec());
        let accepts_children = ty
            .as_deref()
            .and_then(|ty| self.templates.get(ty))
            .is_some_and(|t| t.accepts_children());
        if accepts_children {
            instance.container()
        } else {
            instance
        }
    }

    fn validate(&self, ops: &[PatchOp]) -> Result<(), MalformedReason> {
        let mut staged = self.tree.clone();
        for (index, op) in ops.iter().enumerate() {
            let structure = |error| MalformedReason::Structure { op: index, error };
            if op.target() == ROOT_ID && op.is_structural() {
                return Err(structure(TreeError::RootTarget));
            }
            match op {
                PatchOp::Create { id, ty, values } => {
                    if let Some(ty) = ty {
                        if !self.templates.contains(ty) {
                            return Err(MalformedReason::UnknownTemplate {
                                id: *id,
                                ty: ty.clone(),
                            });
                        }
                    }
                    staged
                        .insert(self.instance_for(*id, ty, values))
                        .map_err(structure)?;
                }
                PatchOp::Remove { id } => {
                    staged.remove(*id).map_err(structure)?;
                }
                PatchOp::InsertBefore { id, parent, before } => {
                    staged
                        .insert_before(*parent, *id, *before)
                        .map_err(structure)?;
                }
                PatchOp::UpdateValue { id, index, value } => {
                    staged
                        .set_value(*id, *index, value.clone())
                        .map_err(structure)?;
                }
                PatchOp::UpdateChildren { id, children } => {
                    staged
                        .set_children(*id, children.clone())
                        .map_err(structure)?;
                }
            }
        }
        Ok(())
    }

    fn apply_op(
        &mut self,
        api: &mut dyn ElementApi,
        op: &PatchOp,
        sink: &dyn ErrorSink,
        report: &mut ApplyReport,
    ) -> Result<(), TreeError> {
        match op {
            PatchOp::Create { id, ty, values } => {
                let instance = self.instance_for(*id, ty, values);
                let elements = self.materialize(api, ty.as_deref());
                self.tree.insert(instance)?;
                if let Some(node) = self.tree.get_mut(*id) {
                    node.bind_elements(elements);
                }
                for (index, value) in values.iter().enumerate() {
                    if !self.apply_part(api, *id, index, value, sink) {
                        report.skipped_effects += 1;
                    }
                }
            }
            PatchOp::Remove { id } => {
                let parent = self.tree.get(*id).and_then(SnapshotInstance::parent);
                if let Some(parent) = parent {
                    if let (Ok(container), Ok(child)) =
                        (self.mount_point(parent), self.root_element(*id))
                    {
                        api.remove_child(container, child);
                    }
                }
                let released: Vec<ElementHandle> = self
                    .tree
                    .subtree(*id)
                    .into_iter()
                    .filter_map(|removed| self.tree.get(removed))
                    .flat_map(|node| node.elements().iter().copied())
                    .collect();
                self.tree.remove(*id)?;
                for element in released.into_iter().rev() {
                    api.release_element(element);
                }
            }
            PatchOp::InsertBefore { id, parent, before } => {
                self.tree.insert_before(*parent, *id, *before)?;
                let before = before.map(|b| self.root_element(b)).transpose();
                match (self.mount_point(*parent), self.root_element(*id), before) {
                    (Ok(container), Ok(child), Ok(before)) => {
                        api.insert_before(container, child, before);
                    }
                    (Err(error), _, _) | (_, Err(error), _) | (_, _, Err(error)) => {
                        sink.report(error);
                        report.skipped_effects += 1;
                    }
                }
            }
            PatchOp::UpdateValue { id, index, value } => {
                if self.tree.set_value(*id, *index, value.clone())?
                    && !self.apply_part(api, *id, *index, value, sink)
                {
                    report.skipped_effects += 1;
                }
            }
            PatchOp::UpdateChildren { id, children } => {
                let detached = self.tree.set_children(*id, children.clone())?;
                match self.mount_point(*id) {
                    Ok(container) => {
                        for old in detached {
                            if let Ok(element) = self.root_element(old) {
                                api.remove_child(container, element);
                            }
                        }
                        for child in children {
                            match self.root_element(*child) {
                                Ok(element) => api.insert_before(container, element, None),
                                Err(error) => {
                                    sink.report(error);
                                    report.skipped_effects += 1;
                                }
                            }
                        }
                    }
                    Err(error) => {
                        sink.report(error);
                        report.skipped_effects += 1;
                    }
                }
            }
        }
        Ok(())
    }

    fn materialize(&self, api: &mut dyn ElementApi, ty: Option<&str>) -> Vec<ElementHandle> {
        let Some(ty) = ty else {
            return vec![api.create_element(RAW_TEXT_TAG)];
        };
        let Some(template) = self.templates.get(ty) else {
            return Vec::new();
        };
        let mut handles: Vec<ElementHandle> = Vec::with_capacity(template.elements().len());
        for def in template.elements() {
            let element = api.create_element(&def.tag);
            if let Some(parent) = def.parent.and_then(|p| handles.get(p).copied()) {
                api.insert_before(parent, element, None);
            }
            handles.push(element);
        }
        handles
    }

    /// Element that hosts the children of `id`.
    fn mount_point(&self, id: SnapshotId) -> Result<ElementHandle, RuntimeError> {
        if id == ROOT_ID {
            return Ok(self.page);
        }
        let node = self.tree.get(id).ok_or(RuntimeError::UnknownElementIndex {
            id,
            element: 0,
            materialized: 0,
        })?;
        let slot = node
            .ty()
            .and_then(|ty| self.templates.get(ty))
            .and_then(|t| t.slot_element())
            .unwrap_or(0);
        element_at(node, slot)
    }

    fn root_element(&self, id: SnapshotId) -> Result<ElementHandle, RuntimeError> {
        match self.tree.get(id) {
            Some(node) => element_at(node, 0),
            None => Err(RuntimeError::UnknownElementIndex {
                id,
                element: 0,
                materialized: 0,
            }),
        }
    }

    /// Pushes one value slot to the native side. Returns `false` when the
    /// effect had to be skipped.
    fn apply_part(
        &self,
        api: &mut dyn ElementApi,
        id: SnapshotId,
        index: usize,
        value: &Value,
        sink: &dyn ErrorSink,
    ) -> bool {
        let Some(node) = self.tree.get(id) else {
            return false;
        };
        let Some(ty) = node.ty() else {
            if index == 0 {
                match element_at(node, 0) {
                    Ok(element) => api.set_attribute(element, "text", value),
                    Err(error) => {
                        sink.report(error);
                        return false;
                    }
                }
            }
            return true;
        };
        let Some(template) = self.templates.get(ty) else {
            return false;
        };
        let Some(part) = template.parts().get(index) else {
            log::trace!("template `{ty}` has no dynamic part {index}; value kept only");
            return true;
        };
        let element = match element_at(node, part.element()) {
            Ok(element) => element,
            Err(error) => {
                sink.report(error);
                return false;
            }
        };

        match part {
            DynamicPart::Attribute { name, .. } => api.set_attribute(element, name, value),
            DynamicPart::Text { .. } => api.set_attribute(element, "text", value),
            DynamicPart::Event {
                event_type, name, ..
            } => match value {
                Value::Null => api.set_event(element, event_type, name, None),
                Value::String(sign) => api.set_event(
                    element,
                    event_type,
                    name,
                    Some(EventHandler::Background(sign.clone())),
                ),
                other => {
                    log::warn!("ignoring background handler {other} for {event_type}:{name}");
                    return false;
                }
            },
            DynamicPart::MainThreadEvent {
                event_type, name, ..
            } => match parse_worklet_value(value) {
                Some(WorkletValue::Install(worklet)) => api.set_event(
                    element,
                    event_type,
                    name,
                    Some(EventHandler::Worklet(worklet)),
                ),
                Some(WorkletValue::Remove) => api.set_event(element, event_type, name, None),
                None => {
                    let tag = template
                        .elements()
                        .get(part.element())
                        .map(|def| def.tag.clone())
                        .unwrap_or_default();
                    sink.report(RuntimeError::InvalidWorkletValue {
                        attribute: qualified_main_thread_attribute(event_type, name),
                        tag,
                    });
                    return false;
                }
            },
        }
        true
    }
}

fn element_at(node: &SnapshotInstance, index: usize) -> Result<ElementHandle, RuntimeError> {
    node.elements()
        .get(index)
        .copied()
        .ok_or(RuntimeError::UnknownElementIndex {
            id: node.id(),
            element: index,
            materialized: node.elements().len(),
        })
}

fn reject(reason: MalformedReason, sink: &dyn ErrorSink) -> RuntimeError {
    let error = RuntimeError::MalformedPatch { reason };
    sink.report(error.clone());
    error
}
