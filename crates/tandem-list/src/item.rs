//! Backing items of a virtualised list.

use serde_json::{Map, Value};
use tandem_core::SnapshotInstance;

/// Extra prop carrying the stable identity of a list item.
pub const ITEM_KEY: &str = "item-key";

/// One entry of a list's backing item set.
#[derive(Debug, Clone, PartialEq)]
pub struct ListItemSpec {
    pub item_key: String,
    /// Template type of the item.
    pub ty: String,
    /// Remaining extra props, forwarded verbatim in `insertAction`s.
    pub attributes: Map<String, Value>,
}

impl ListItemSpec {
    pub fn new(item_key: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            item_key: item_key.into(),
            ty: ty.into(),
            attributes: Map::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Reads an item from a list child instance. Raw instances and instances
    /// without a string `item-key` extra prop are not items.
    pub fn from_instance(instance: &SnapshotInstance) -> Option<Self> {
        let ty = instance.ty()?;
        let props = instance.extra_props()?.as_object()?;
        let item_key = props.get(ITEM_KEY)?.as_str()?;
        let attributes = props
            .iter()
            .filter(|(name, _)| name.as_str() != ITEM_KEY)
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Some(Self {
            item_key: item_key.to_owned(),
            ty: ty.to_owned(),
            attributes,
        })
    }

    /// Whether the native row has to be refreshed to show `other`.
    pub(crate) fn differs_from(&self, other: &ListItemSpec) -> bool {
        self.ty != other.ty || self.attributes != other.attributes
    }
}
