//! Compiled template descriptions used by the main thread to materialise
//! instances.
//!
//! Template compilation itself happens elsewhere; this registry only records
//! the element skeleton of each template, which element every value slot
//! drives, and where child instances are mounted.

use crate::collections::map::HashMap;

/// One element of a template skeleton. `parent` indexes an earlier element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementDef {
    pub tag: String,
    pub parent: Option<usize>,
}

/// What a value slot drives on the native side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DynamicPart {
    Attribute {
        element: usize,
        name: String,
    },
    Text {
        element: usize,
    },
    /// Handler running in the background context; the value is its sign.
    Event {
        element: usize,
        event_type: String,
        name: String,
    },
    /// Handler running on the main thread; the value is a worklet descriptor.
    MainThreadEvent {
        element: usize,
        event_type: String,
        name: String,
    },
}

impl DynamicPart {
    pub fn element(&self) -> usize {
        match self {
            DynamicPart::Attribute { element, .. }
            | DynamicPart::Text { element }
            | DynamicPart::Event { element, .. }
            | DynamicPart::MainThreadEvent { element, .. } => *element,
        }
    }
}

/// `bindEvent` + `tap` -> `main-thread:bindtap`.
pub fn qualified_main_thread_attribute(event_type: &str, name: &str) -> String {
    let prefix = event_type.strip_suffix("Event").unwrap_or(event_type);
    format!("main-thread:{prefix}{name}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    elements: Vec<ElementDef>,
    parts: Vec<DynamicPart>,
    slot: Option<usize>,
}

impl Template {
    /// Starts a template whose root element has `tag`.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            elements: vec![ElementDef {
                tag: tag.into(),
                parent: None,
            }],
            parts: Vec::new(),
            slot: None,
        }
    }

    /// Adds an element under `parent` and returns its index.
    pub fn child(&mut self, parent: usize, tag: impl Into<String>) -> usize {
        self.elements.push(ElementDef {
            tag: tag.into(),
            parent: Some(parent),
        });
        self.elements.len() - 1
    }

    pub fn attribute(mut self, element: usize, name: impl Into<String>) -> Self {
        self.parts.push(DynamicPart::Attribute {
            element,
            name: name.into(),
        });
        self
    }

    pub fn text(mut self, element: usize) -> Self {
        self.parts.push(DynamicPart::Text { element });
        self
    }

    pub fn event(
        mut self,
        element: usize,
        event_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        self.parts.push(DynamicPart::Event {
            element,
            event_type: event_type.into(),
            name: name.into(),
        });
        self
    }

    pub fn main_thread_event(
        mut self,
        element: usize,
        event_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        self.parts.push(DynamicPart::MainThreadEvent {
            element,
            event_type: event_type.into(),
            name: name.into(),
        });
        self
    }

    /// Marks `element` as the mount point for child instances.
    pub fn slot(mut self, element: usize) -> Self {
        self.slot = Some(element);
        self
    }

    pub fn elements(&self) -> &[ElementDef] {
        &self.elements
    }

    pub fn parts(&self) -> &[DynamicPart] {
        &self.parts
    }

    pub fn slot_element(&self) -> Option<usize> {
        self.slot
    }

    pub fn accepts_children(&self) -> bool {
        self.slot.is_some()
    }
}

/// Templates by type name.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: HashMap<String, Template>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, ty: impl Into<String>, template: Template) -> Option<Template> {
        self.templates.insert(ty.into(), template)
    }

    pub fn with(mut self, ty: impl Into<String>, template: Template) -> Self {
        self.register(ty, template);
        self
    }

    pub fn get(&self, ty: &str) -> Option<&Template> {
        self.templates.get(ty)
    }

    pub fn contains(&self, ty: &str) -> bool {
        self.templates.contains_key(ty)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
