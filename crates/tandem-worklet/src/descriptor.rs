//! Serialised forms exchanged with the background context.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WorkletError;
use crate::WorkletValueId;

/// Key marking an object as a worklet ref.
pub const WORKLET_VALUE_ID_KEY: &str = "_wvid";

/// `{ "_wvid": id, "_initValue": value }` as captured in worklet closures.
/// Negative ids were minted during first-screen rendering on the main
/// thread; non-negative ids come from the background.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkletRefDescriptor {
    #[serde(rename = "_wvid")]
    pub wvid: WorkletValueId,
    #[serde(rename = "_initValue", default)]
    pub init_value: Value,
}

impl WorkletRefDescriptor {
    pub fn new(wvid: WorkletValueId, init_value: Value) -> Self {
        Self { wvid, init_value }
    }

    pub fn is_first_screen(&self) -> bool {
        self.wvid < 0
    }

    /// Reads a descriptor out of a closure value; `None` if `value` is not a ref.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let wvid = object.get(WORKLET_VALUE_ID_KEY)?.as_i64()?;
        Some(Self {
            wvid,
            init_value: object.get("_initValue").cloned().unwrap_or(Value::Null),
        })
    }
}

/// Parses an init patch: `[[id, value], ...]`.
pub fn decode_init_patch(patch: &Value) -> Result<Vec<(WorkletValueId, Value)>, WorkletError> {
    let entries = patch.as_array().ok_or_else(|| WorkletError::InvalidInitPatch {
        reason: "expected an array of [id, value] pairs".into(),
    })?;
    entries
        .iter()
        .enumerate()
        .map(|(position, entry)| match entry.as_array().map(Vec::as_slice) {
            Some([id, value]) => id
                .as_i64()
                .map(|id| (id, value.clone()))
                .ok_or_else(|| WorkletError::InvalidInitPatch {
                    reason: format!("entry {position}: id {id} is not an integer"),
                }),
            _ => Err(WorkletError::InvalidInitPatch {
                reason: format!("entry {position} is not an [id, value] pair"),
            }),
        })
        .collect()
}

pub fn encode_init_patch(changes: &[(WorkletValueId, Value)]) -> Value {
    Value::Array(
        changes
            .iter()
            .map(|(id, value)| Value::Array(vec![Value::from(*id), value.clone()]))
            .collect(),
    )
}
