//! Wire shape of list update batches.
//!
//! A batch serialises to
//! `{"insertAction":[{"position":..,"type":..,"item-key":..,...}],"removeAction":[..],"updateAction":[{"from":..,"to":..,"item-key":..,"type":..,"flush":..}]}`.
//! Remove positions refer to the list before the batch; insert and update
//! target positions refer to the list after it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::item::ListItemSpec;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertAction {
    pub position: usize,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(rename = "item-key")]
    pub item_key: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl InsertAction {
    pub fn for_item(position: usize, item: &ListItemSpec) -> Self {
        Self {
            position,
            ty: item.ty.clone(),
            item_key: item.item_key.clone(),
            attributes: item.attributes.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateAction {
    pub from: usize,
    pub to: usize,
    #[serde(rename = "item-key")]
    pub item_key: String,
    #[serde(rename = "type")]
    pub ty: String,
    /// Set when the item changed type and the row must be rebuilt right away.
    pub flush: bool,
}

/// Delta against the previous batch of the same list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListUpdateBatch {
    #[serde(rename = "insertAction", default)]
    pub insert_action: Vec<InsertAction>,
    #[serde(rename = "removeAction", default)]
    pub remove_action: Vec<usize>,
    #[serde(rename = "updateAction", default)]
    pub update_action: Vec<UpdateAction>,
}

impl ListUpdateBatch {
    pub fn is_empty(&self) -> bool {
        self.insert_action.is_empty()
            && self.remove_action.is_empty()
            && self.update_action.is_empty()
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
