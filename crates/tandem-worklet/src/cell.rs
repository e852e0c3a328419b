use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::WorkletValueId;

struct RefSlot {
    wvid: WorkletValueId,
    current: Value,
    written: bool,
}

/// Shared, single-threaded cell behind a worklet ref.
///
/// Clones point at the same slot, so once hydration links a background id to
/// a first-screen cell both registries observe the same value.
pub struct WorkletRef {
    inner: Rc<RefCell<RefSlot>>,
}

impl Clone for WorkletRef {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl fmt::Debug for WorkletRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.inner.borrow();
        f.debug_struct("WorkletRef")
            .field("wvid", &slot.wvid)
            .field("current", &slot.current)
            .field("written", &slot.written)
            .finish()
    }
}

impl WorkletRef {
    pub fn new(wvid: WorkletValueId, initial: Value) -> Self {
        Self {
            inner: Rc::new(RefCell::new(RefSlot {
                wvid,
                current: initial,
                written: false,
            })),
        }
    }

    /// Id the cell was created for. A linked cell keeps its first-screen id.
    pub fn wvid(&self) -> WorkletValueId {
        self.inner.borrow().wvid
    }

    pub fn current(&self) -> Value {
        self.inner.borrow().current.clone()
    }

    /// Run `f` with the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&Value) -> R) -> R {
        f(&self.inner.borrow().current)
    }

    /// Main-thread write through `ref.current = value`.
    pub fn set_current(&self, value: Value) {
        let mut slot = self.inner.borrow_mut();
        slot.current = value;
        slot.written = true;
    }

    /// Whether [`set_current`](Self::set_current) was ever called.
    pub fn was_written(&self) -> bool {
        self.inner.borrow().written
    }

    /// Replaces the value without counting as a main-thread write.
    pub(crate) fn seed(&self, value: Value) {
        self.inner.borrow_mut().current = value;
    }

    pub fn ptr_eq(&self, other: &WorkletRef) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}
