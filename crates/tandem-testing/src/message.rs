//! Messages exchanged between the background and main-thread contexts.
//!
//! Every message crosses the [`Channel`] as JSON text, so anything the two
//! sides share has to survive serialisation.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tandem_core::PatchBatch;
use tandem_list::{ListId, ListUpdateBatch};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    /// Snapshot patch stream for the main-thread tree.
    Patch { batch: PatchBatch },
    /// Item-set deltas for one list, in order.
    ListUpdates {
        list: ListId,
        batches: Vec<ListUpdateBatch>,
    },
    /// Worklet ref init values, `[[wvid, value], ...]`.
    WorkletInit { patch: Value },
    /// Background copy of a worklet context rendered during first screen.
    Hydrate {
        new_ctx: Value,
        first_screen_ctx: Value,
    },
}

/// One-directional FIFO of serialised messages.
#[derive(Debug, Default)]
pub struct Channel {
    queue: VecDeque<String>,
    sent: usize,
}

impl Channel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&mut self, message: &Message) -> Result<(), serde_json::Error> {
        let text = serde_json::to_string(message)?;
        log::trace!("send {text}");
        self.queue.push_back(text);
        self.sent += 1;
        Ok(())
    }

    /// Queues raw text, bypassing serialisation.
    pub fn send_raw(&mut self, text: impl Into<String>) {
        self.queue.push_back(text.into());
        self.sent += 1;
    }

    pub fn recv(&mut self) -> Option<Result<Message, serde_json::Error>> {
        let text = self.queue.pop_front()?;
        Some(serde_json::from_str(&text))
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Messages sent over the channel's lifetime.
    pub fn sent(&self) -> usize {
        self.sent
    }
}
