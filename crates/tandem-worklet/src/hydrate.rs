//! Merging first-screen worklet state into the background's.
//!
//! A worklet context is the JSON object a worklet closes over:
//! `{"_wkltId": "...", "_c": {...}}`. The background re-creates every context
//! it rendered during first screen; hydration walks the background copy and
//! the first-screen copy side by side and links each pair of refs found at
//! the same key path. Nested contexts whose `_wkltId` differ belong to
//! different worklets and are skipped whole.

use serde_json::{Map, Value};
use tandem_core::element::WORKLET_ID_KEY;

use crate::descriptor::WorkletRefDescriptor;
use crate::error::WorkletError;
use crate::runtime::{HydrationPhase, WorkletRuntime};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HydrationReport {
    /// Ref pairs linked to a first-screen cell.
    pub merged: usize,
    /// Ref pairs whose first-screen ref was never dereferenced.
    pub untouched: usize,
    /// Nested contexts skipped because their worklet ids differ.
    pub skipped_contexts: usize,
}

impl WorkletRuntime {
    /// Links the refs of `first_screen_ctx` into the persistent registry
    /// according to `new_ctx`.
    ///
    /// For each linked pair the surviving value is the last main-thread write
    /// if one happened, otherwise the background's initial value.
    pub fn hydrate_ctx(
        &mut self,
        new_ctx: &Value,
        first_screen_ctx: &Value,
    ) -> Result<HydrationReport, WorkletError> {
        if self.phase == HydrationPhase::Cleared {
            return Err(WorkletError::AlreadyCleared);
        }
        let (Some(new_obj), Some(fs_obj)) = (new_ctx.as_object(), first_screen_ctx.as_object())
        else {
            return Err(WorkletError::InvalidContext {
                reason: "both contexts must be objects".into(),
            });
        };

        let mut report = HydrationReport::default();
        if worklet_ids_differ(new_obj, fs_obj) {
            log::debug!(
                "hydration skipped: worklet {:?} vs {:?}",
                new_obj.get(WORKLET_ID_KEY),
                fs_obj.get(WORKLET_ID_KEY)
            );
            report.skipped_contexts += 1;
        } else {
            let mut path = String::new();
            self.walk_objects(new_obj, fs_obj, &mut path, &mut report);
        }

        self.phase = HydrationPhase::Hydrated;
        log::debug!(
            "hydrated: {} merged, {} untouched, {} contexts skipped",
            report.merged,
            report.untouched,
            report.skipped_contexts
        );
        Ok(report)
    }

    fn walk(&mut self, new: &Value, fs: &Value, path: &mut String, report: &mut HydrationReport) {
        match (new, fs) {
            (Value::Object(new_obj), Value::Object(fs_obj)) => {
                if let (Some(bg_ref), Some(fs_ref)) = (
                    WorkletRefDescriptor::from_value(new),
                    WorkletRefDescriptor::from_value(fs),
                ) {
                    self.merge_ref(&bg_ref, &fs_ref, path, report);
                    return;
                }
                if worklet_ids_differ(new_obj, fs_obj) {
                    log::debug!("hydration mismatch at `{path}`: nested worklet ids differ");
                    report.skipped_contexts += 1;
                    return;
                }
                self.walk_objects(new_obj, fs_obj, path, report);
            }
            (Value::Array(new_items), Value::Array(fs_items)) => {
                for (index, (new_item, fs_item)) in new_items.iter().zip(fs_items).enumerate() {
                    let len = path.len();
                    path.push_str(&format!("[{index}]"));
                    self.walk(new_item, fs_item, path, report);
                    path.truncate(len);
                }
            }
            _ => {}
        }
    }

    fn walk_objects(
        &mut self,
        new: &Map<String, Value>,
        fs: &Map<String, Value>,
        path: &mut String,
        report: &mut HydrationReport,
    ) {
        for (key, new_value) in new {
            let Some(fs_value) = fs.get(key) else {
                continue;
            };
            let len = path.len();
            if !path.is_empty() {
                path.push('.');
            }
            path.push_str(key);
            self.walk(new_value, fs_value, path, report);
            path.truncate(len);
        }
    }

    fn merge_ref(
        &mut self,
        bg_ref: &WorkletRefDescriptor,
        fs_ref: &WorkletRefDescriptor,
        path: &str,
        report: &mut HydrationReport,
    ) {
        if bg_ref.is_first_screen() || !fs_ref.is_first_screen() {
            log::debug!(
                "hydration mismatch at `{path}`: refs {} and {} are not a background/first-screen pair",
                bg_ref.wvid,
                fs_ref.wvid
            );
            return;
        }
        let Some(cell) = self.first_screen.get(&fs_ref.wvid).cloned() else {
            report.untouched += 1;
            return;
        };
        if !cell.was_written() {
            let declared = self
                .persistent
                .get(&bg_ref.wvid)
                .map(|existing| existing.current())
                .unwrap_or_else(|| bg_ref.init_value.clone());
            cell.seed(declared);
        }
        log::trace!("linked ref {} to first-screen ref {} at `{path}`", bg_ref.wvid, fs_ref.wvid);
        self.persistent.insert(bg_ref.wvid, cell);
        report.merged += 1;
    }
}

fn worklet_ids_differ(new: &Map<String, Value>, fs: &Map<String, Value>) -> bool {
    match (new.get(WORKLET_ID_KEY), fs.get(WORKLET_ID_KEY)) {
        (None, None) => false,
        (new_id, fs_id) => new_id != fs_id,
    }
}
