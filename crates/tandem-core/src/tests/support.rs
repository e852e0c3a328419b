use serde_json::{json, Value};

use crate::{
    PatchOp, SnapshotId, SnapshotInstance, SnapshotTree, Template, TemplateRegistry, TreeError,
};

/// Attaches a container instance of type `ty` under `parent`.
pub(crate) fn node(
    tree: &mut SnapshotTree,
    parent: SnapshotId,
    id: SnapshotId,
    ty: &str,
    values: Vec<Value>,
) {
    tree.insert(SnapshotInstance::new(id, Some(ty.to_owned()), values).container())
        .expect("insert container");
    tree.insert_before(parent, id, None).expect("attach container");
}

/// Attaches a leaf instance of type `ty` under `parent`.
pub(crate) fn leaf(
    tree: &mut SnapshotTree,
    parent: SnapshotId,
    id: SnapshotId,
    ty: &str,
    values: Vec<Value>,
) {
    tree.insert(SnapshotInstance::new(id, Some(ty.to_owned()), values))
        .expect("insert leaf");
    tree.insert_before(parent, id, None).expect("attach leaf");
}

pub(crate) fn raw(tree: &mut SnapshotTree, parent: SnapshotId, id: SnapshotId, text: &str) {
    tree.insert(SnapshotInstance::raw(id, json!(text)))
        .expect("insert raw");
    tree.insert_before(parent, id, None).expect("attach raw");
}

/// `T`: `<view><text/></view>`, value 0 is the text, children mount on the view.
/// `Button`: leaf `<view>` with a class, a background tap and a main-thread tap.
/// `Broken`: leaf whose only part points at an element that does not exist.
pub(crate) fn templates() -> TemplateRegistry {
    let mut container = Template::new("view");
    let label = container.child(0, "text");
    let container = container.text(label).slot(0);

    let button = Template::new("view")
        .attribute(0, "class")
        .event(0, "bindEvent", "tap")
        .main_thread_event(0, "bindEvent", "tap");

    let broken = Template::new("image").attribute(5, "src");

    TemplateRegistry::new()
        .with("T", container)
        .with("Button", button)
        .with("Broken", broken)
}

/// Replays `ops` structurally on a copy of `tree`, without any native side.
pub(crate) fn replay(tree: &SnapshotTree, ops: &[PatchOp]) -> Result<SnapshotTree, TreeError> {
    let mut out = tree.clone();
    for op in ops {
        match op {
            PatchOp::Create { id, ty, values } => {
                let instance = SnapshotInstance::new(*id, ty.clone(), values.clone());
                let instance = if ty.is_some() {
                    instance.container()
                } else {
                    instance
                };
                out.insert(instance)?;
            }
            PatchOp::Remove { id } => {
                out.remove(*id)?;
            }
            PatchOp::InsertBefore { id, parent, before } => {
                out.insert_before(*parent, *id, *before)?;
            }
            PatchOp::UpdateValue { id, index, value } => {
                out.set_value(*id, *index, value.clone())?;
            }
            PatchOp::UpdateChildren { id, children } => {
                out.set_children(*id, children.clone())?;
            }
        }
    }
    Ok(out)
}

/// Small deterministic generator so mutation sequences are reproducible.
pub(crate) struct Lcg(u64);

impl Lcg {
    pub(crate) fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub(crate) fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    pub(crate) fn below(&mut self, bound: usize) -> usize {
        (self.next() % bound.max(1) as u64) as usize
    }
}
