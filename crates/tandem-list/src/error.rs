use std::fmt;

use crate::{ListId, Sign};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListError {
    UnknownList { list: ListId },
    UnknownSign { list: ListId, sign: Sign },
    IndexOutOfRange { list: ListId, index: usize, len: usize },
    /// `leave_list_item` on a sign that is already pooled.
    AlreadyOffscreen { list: ListId, sign: Sign },
    /// A freshly materialised sign collides with one the list already tracks.
    DuplicateSign { list: ListId, sign: Sign },
    DuplicateItemKey { list: ListId, item_key: String },
    /// A received batch could not be decoded.
    InvalidBatch { list: ListId, reason: String },
}

impl fmt::Display for ListError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListError::UnknownList { list } => write!(f, "list {list} is not registered"),
            ListError::UnknownSign { list, sign } => {
                write!(f, "sign {sign} does not belong to list {list}")
            }
            ListError::IndexOutOfRange { list, index, len } => {
                write!(f, "index {index} out of range for list {list} ({len} items)")
            }
            ListError::AlreadyOffscreen { list, sign } => {
                write!(f, "sign {sign} of list {list} is already offscreen")
            }
            ListError::DuplicateSign { list, sign } => {
                write!(f, "sign {sign} is already tracked by list {list}")
            }
            ListError::DuplicateItemKey { list, item_key } => {
                write!(f, "item-key `{item_key}` appears twice in list {list}")
            }
            ListError::InvalidBatch { list, reason } => {
                write!(f, "invalid update batch for list {list}: {reason}")
            }
        }
    }
}

impl std::error::Error for ListError {}
