//! Seam to the native element API owned by the main thread.
//!
//! The runtime only decides which calls to make; [`ElementApi`] implementations
//! perform them. [`MemoryElementApi`] keeps an in-memory element tree and a call
//! log so apply behaviour can be asserted without a platform.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::collections::map::HashMap;

/// Key carrying a worklet's identity inside its descriptor object.
pub const WORKLET_ID_KEY: &str = "_wkltId";

/// Tag used for elements backing raw-value instances.
pub const RAW_TEXT_TAG: &str = "raw-text";

/// Tag of the element bound to the root instance.
pub const PAGE_TAG: &str = "page";

/// Opaque handle to a native element.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementHandle(pub u64);

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handler installed on a native event slot.
#[derive(Debug, Clone, PartialEq)]
pub enum EventHandler {
    /// Sign of a handler living in the background context.
    Background(String),
    /// Worklet descriptor executed on the main thread.
    Worklet(Value),
}

/// Outcome of interpreting a main-thread event value.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkletValue {
    Remove,
    Install(Value),
}

/// Checks that `value` is a worklet descriptor (`{ "_wkltId": "...", ... }`)
/// or `null`. Returns `None` for any other shape.
pub fn parse_worklet_value(value: &Value) -> Option<WorkletValue> {
    match value {
        Value::Null => Some(WorkletValue::Remove),
        Value::Object(map) => match map.get(WORKLET_ID_KEY) {
            Some(Value::String(_)) => Some(WorkletValue::Install(value.clone())),
            _ => None,
        },
        _ => None,
    }
}

/// Native element primitives the main-thread apply drives.
pub trait ElementApi {
    fn create_element(&mut self, tag: &str) -> ElementHandle;
    fn set_attribute(&mut self, element: ElementHandle, name: &str, value: &Value);
    fn set_event(
        &mut self,
        element: ElementHandle,
        event_type: &str,
        name: &str,
        handler: Option<EventHandler>,
    );
    /// Inserts `child` under `parent`, moving it if it is already attached.
    /// `before == None` appends.
    fn insert_before(
        &mut self,
        parent: ElementHandle,
        child: ElementHandle,
        before: Option<ElementHandle>,
    );
    fn remove_child(&mut self, parent: ElementHandle, child: ElementHandle);
    fn release_element(&mut self, element: ElementHandle);
}

/// Recorded [`ElementApi`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementCall {
    Create {
        element: ElementHandle,
        tag: String,
    },
    SetAttribute {
        element: ElementHandle,
        name: String,
        value: Value,
    },
    SetEvent {
        element: ElementHandle,
        event_type: String,
        name: String,
        handler: Option<EventHandler>,
    },
    InsertBefore {
        parent: ElementHandle,
        child: ElementHandle,
        before: Option<ElementHandle>,
    },
    RemoveChild {
        parent: ElementHandle,
        child: ElementHandle,
    },
    Release {
        element: ElementHandle,
    },
}

#[derive(Debug, Default, Clone)]
struct MemoryElement {
    tag: String,
    parent: Option<ElementHandle>,
    children: Vec<ElementHandle>,
    attributes: HashMap<String, Value>,
    events: HashMap<(String, String), EventHandler>,
}

/// In-memory element tree that records every call.
#[derive(Debug, Default)]
pub struct MemoryElementApi {
    next_handle: u64,
    elements: HashMap<ElementHandle, MemoryElement>,
    calls: Vec<ElementCall>,
}

impl MemoryElementApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[ElementCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<ElementCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn tag(&self, element: ElementHandle) -> Option<&str> {
        self.elements.get(&element).map(|e| e.tag.as_str())
    }

    pub fn attribute(&self, element: ElementHandle, name: &str) -> Option<&Value> {
        self.elements.get(&element)?.attributes.get(name)
    }

    pub fn event(
        &self,
        element: ElementHandle,
        event_type: &str,
        name: &str,
    ) -> Option<&EventHandler> {
        self.elements
            .get(&element)?
            .events
            .get(&(event_type.to_owned(), name.to_owned()))
    }

    pub fn children(&self, element: ElementHandle) -> &[ElementHandle] {
        self.elements
            .get(&element)
            .map(|e| e.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn parent(&self, element: ElementHandle) -> Option<ElementHandle> {
        self.elements.get(&element)?.parent
    }

    /// Renders the element subtree as indented text, one element per line.
    pub fn dump(&self, root: ElementHandle) -> String {
        let mut output = String::new();
        self.dump_element(&mut output, root, 0);
        output
    }

    fn dump_element(&self, output: &mut String, element: ElementHandle, depth: usize) {
        let indent = "  ".repeat(depth);
        match self.elements.get(&element) {
            Some(node) => {
                let text = node
                    .attributes
                    .get("text")
                    .map(|v| format!(" {v}"))
                    .unwrap_or_default();
                output.push_str(&format!("{indent}<{}>{text}\n", node.tag));
                for child in &node.children {
                    self.dump_element(output, *child, depth + 1);
                }
            }
            None => output.push_str(&format!("{indent}{element} (released)\n")),
        }
    }

    fn detach(&mut self, child: ElementHandle) {
        let parent = self.elements.get(&child).and_then(|e| e.parent);
        if let Some(parent) = parent {
            if let Some(node) = self.elements.get_mut(&parent) {
                node.children.retain(|c| *c != child);
            }
        }
        if let Some(node) = self.elements.get_mut(&child) {
            node.parent = None;
        }
    }
}

impl ElementApi for MemoryElementApi {
    fn create_element(&mut self, tag: &str) -> ElementHandle {
        self.next_handle += 1;
        let element = ElementHandle(self.next_handle);
        self.elements.insert(
            element,
            MemoryElement {
                tag: tag.to_owned(),
                ..MemoryElement::default()
            },
        );
        self.calls.push(ElementCall::Create {
            element,
            tag: tag.to_owned(),
        });
        element
    }

    fn set_attribute(&mut self, element: ElementHandle, name: &str, value: &Value) {
        if let Some(node) = self.elements.get_mut(&element) {
            node.attributes.insert(name.to_owned(), value.clone());
        }
        self.calls.push(ElementCall::SetAttribute {
            element,
            name: name.to_owned(),
            value: value.clone(),
        });
    }

    fn set_event(
        &mut self,
        element: ElementHandle,
        event_type: &str,
        name: &str,
        handler: Option<EventHandler>,
    ) {
        if let Some(node) = self.elements.get_mut(&element) {
            let key = (event_type.to_owned(), name.to_owned());
            match &handler {
                Some(handler) => {
                    node.events.insert(key, handler.clone());
                }
                None => {
                    node.events.remove(&key);
                }
            }
        }
        self.calls.push(ElementCall::SetEvent {
            element,
            event_type: event_type.to_owned(),
            name: name.to_owned(),
            handler,
        });
    }

    fn insert_before(
        &mut self,
        parent: ElementHandle,
        child: ElementHandle,
        before: Option<ElementHandle>,
    ) {
        self.detach(child);
        if let Some(node) = self.elements.get_mut(&parent) {
            let position = before
                .and_then(|b| node.children.iter().position(|c| *c == b))
                .unwrap_or(node.children.len());
            node.children.insert(position, child);
        }
        if let Some(node) = self.elements.get_mut(&child) {
            node.parent = Some(parent);
        }
        self.calls.push(ElementCall::InsertBefore {
            parent,
            child,
            before,
        });
    }

    fn remove_child(&mut self, parent: ElementHandle, child: ElementHandle) {
        if let Some(node) = self.elements.get_mut(&parent) {
            node.children.retain(|c| *c != child);
        }
        if let Some(node) = self.elements.get_mut(&child) {
            node.parent = None;
        }
        self.calls.push(ElementCall::RemoveChild { parent, child });
    }

    fn release_element(&mut self, element: ElementHandle) {
        self.detach(element);
        self.elements.remove(&element);
        self.calls.push(ElementCall::Release { element });
    }
}
