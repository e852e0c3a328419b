//! Shorthands for render events, templates and first-screen trees.

use serde_json::{json, Value};
use tandem_core::{
    RenderEvent, SnapshotId, SnapshotInstance, SnapshotTree, Template, TemplateRegistry,
    TreeError,
};
use tandem_list::ITEM_KEY;

/// Container instance of type `ty`.
pub fn created(id: SnapshotId, ty: &str, values: Vec<Value>) -> RenderEvent {
    RenderEvent::Created {
        id,
        ty: Some(ty.to_owned()),
        values,
        container: true,
        extra_props: None,
    }
}

/// Leaf instance of type `ty`.
pub fn created_leaf(id: SnapshotId, ty: &str, values: Vec<Value>) -> RenderEvent {
    RenderEvent::Created {
        id,
        ty: Some(ty.to_owned()),
        values,
        container: false,
        extra_props: None,
    }
}

/// Raw text instance.
pub fn created_raw(id: SnapshotId, text: &str) -> RenderEvent {
    RenderEvent::Created {
        id,
        ty: None,
        values: vec![json!(text)],
        container: false,
        extra_props: None,
    }
}

/// List item: a leaf carrying its `item-key` as an extra prop.
pub fn created_item(id: SnapshotId, ty: &str, item_key: &str, label: &str) -> RenderEvent {
    RenderEvent::Created {
        id,
        ty: Some(ty.to_owned()),
        values: vec![json!(label)],
        container: false,
        extra_props: Some(json!({ ITEM_KEY: item_key })),
    }
}

pub fn children(id: SnapshotId, ids: Vec<SnapshotId>) -> RenderEvent {
    RenderEvent::Updated {
        id,
        values: None,
        children: Some(ids),
    }
}

pub fn values(id: SnapshotId, values: Vec<Value>) -> RenderEvent {
    RenderEvent::Updated {
        id,
        values: Some(values),
        children: None,
    }
}

pub fn removed(id: SnapshotId) -> RenderEvent {
    RenderEvent::Removed { id }
}

/// Templates used across the integration tests.
///
/// * `T`: `<view><text/></view>`, value 0 is the label, children mount on the view.
/// * `List`: `<list/>` hosting its items.
/// * `Item`: leaf `<text/>`, value 0 is the text.
/// * `Button`: leaf `<view>` with a class, a background tap and a main-thread tap.
pub fn demo_templates() -> TemplateRegistry {
    let mut container = Template::new("view");
    let label = container.child(0, "text");
    let container = container.text(label).slot(0);

    let button = Template::new("view")
        .attribute(0, "class")
        .event(0, "bindEvent", "tap")
        .main_thread_event(0, "bindEvent", "tap");

    TemplateRegistry::new()
        .with("T", container)
        .with("List", Template::new("list").slot(0))
        .with("Item", Template::new("text").text(0))
        .with("Button", button)
}

/// Builds a snapshot tree directly, the way the main thread renders the
/// first screen before any background session exists.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    tree: SnapshotTree,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(
        &mut self,
        parent: SnapshotId,
        id: SnapshotId,
        ty: &str,
        values: Vec<Value>,
    ) -> Result<&mut Self, TreeError> {
        self.attach(
            parent,
            SnapshotInstance::new(id, Some(ty.to_owned()), values).container(),
        )
    }

    pub fn leaf(
        &mut self,
        parent: SnapshotId,
        id: SnapshotId,
        ty: &str,
        values: Vec<Value>,
    ) -> Result<&mut Self, TreeError> {
        self.attach(parent, SnapshotInstance::new(id, Some(ty.to_owned()), values))
    }

    pub fn raw(
        &mut self,
        parent: SnapshotId,
        id: SnapshotId,
        text: &str,
    ) -> Result<&mut Self, TreeError> {
        self.attach(parent, SnapshotInstance::raw(id, json!(text)))
    }

    fn attach(
        &mut self,
        parent: SnapshotId,
        instance: SnapshotInstance,
    ) -> Result<&mut Self, TreeError> {
        let id = instance.id();
        self.tree.insert(instance)?;
        self.tree.insert_before(parent, id, None)?;
        Ok(self)
    }

    pub fn build(&mut self) -> SnapshotTree {
        std::mem::take(&mut self.tree)
    }
}
