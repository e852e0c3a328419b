//! Main-thread worklet ref registries.
//!
//! Two registries exist. The first-screen map holds cells created lazily while
//! the main thread renders before the background context is up; their ids are
//! negative. The persistent map holds cells announced by the background
//! through init patches. Hydration links the two, after which the first-screen
//! map is cleared exactly once.

use serde_json::Value;
use tandem_core::collections::map::HashMap;

use crate::cell::WorkletRef;
use crate::descriptor::{decode_init_patch, WorkletRefDescriptor};
use crate::error::WorkletError;
use crate::WorkletValueId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkletConfig {
    /// Serve first-screen lookups after clear from fresh, unlinked cells
    /// instead of failing.
    pub recover_cleared_first_screen: bool,
}

impl Default for WorkletConfig {
    fn default() -> Self {
        Self {
            recover_cleared_first_screen: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydrationPhase {
    FirstScreen,
    Hydrated,
    Cleared,
}

#[derive(Debug)]
pub struct WorkletRuntime {
    pub(crate) config: WorkletConfig,
    pub(crate) persistent: HashMap<WorkletValueId, WorkletRef>,
    pub(crate) first_screen: HashMap<WorkletValueId, WorkletRef>,
    /// Cells handed out for first-screen ids after the map was cleared.
    recovered: HashMap<WorkletValueId, WorkletRef>,
    pub(crate) phase: HydrationPhase,
}

impl WorkletRuntime {
    pub fn init(config: WorkletConfig) -> Self {
        log::debug!("worklet runtime initialised: {config:?}");
        Self {
            config,
            persistent: HashMap::default(),
            first_screen: HashMap::default(),
            recovered: HashMap::default(),
            phase: HydrationPhase::FirstScreen,
        }
    }

    /// Drops both registries. Cells still held elsewhere stay valid.
    pub fn teardown(self) {
        log::debug!(
            "worklet runtime torn down: {} persistent, {} first-screen, {} recovered refs",
            self.persistent.len(),
            self.first_screen.len(),
            self.recovered.len()
        );
    }

    pub fn phase(&self) -> HydrationPhase {
        self.phase
    }

    pub fn config(&self) -> WorkletConfig {
        self.config
    }

    pub fn persistent_len(&self) -> usize {
        self.persistent.len()
    }

    pub fn first_screen_len(&self) -> usize {
        self.first_screen.len()
    }

    /// Persistent cell for `wvid`, if registered.
    pub fn persistent(&self, wvid: WorkletValueId) -> Option<WorkletRef> {
        self.persistent.get(&wvid).cloned()
    }

    /// Resolves the cell behind a ref captured by a worklet.
    pub fn get_from_worklet_ref_map(
        &mut self,
        descriptor: &WorkletRefDescriptor,
    ) -> Result<WorkletRef, WorkletError> {
        let wvid = descriptor.wvid;
        if !descriptor.is_first_screen() {
            return self
                .persistent
                .get(&wvid)
                .cloned()
                .ok_or(WorkletError::MissingRef { wvid });
        }

        if self.phase != HydrationPhase::Cleared {
            let cell = self
                .first_screen
                .entry(wvid)
                .or_insert_with(|| WorkletRef::new(wvid, descriptor.init_value.clone()));
            return Ok(cell.clone());
        }

        if !self.config.recover_cleared_first_screen {
            return Err(WorkletError::FirstScreenCleared { wvid });
        }
        let cell = self.recovered.entry(wvid).or_insert_with(|| {
            log::warn!("first-screen ref {wvid} requested after clear; serving an unlinked cell");
            WorkletRef::new(wvid, descriptor.init_value.clone())
        });
        Ok(cell.clone())
    }

    /// Registers background init values. Ids already present keep their cell
    /// and value. Returns how many ids were added.
    pub fn update_worklet_ref_init_value_changes(
        &mut self,
        changes: &[(WorkletValueId, Value)],
    ) -> usize {
        let mut added = 0;
        for (wvid, value) in changes {
            if *wvid < 0 {
                log::warn!("ignoring init value for first-screen ref id {wvid}");
                continue;
            }
            if self.persistent.contains_key(wvid) {
                continue;
            }
            self.persistent
                .insert(*wvid, WorkletRef::new(*wvid, value.clone()));
            added += 1;
        }
        added
    }

    /// Decodes an init patch from its wire form and registers it.
    pub fn apply_init_patch(&mut self, patch: &Value) -> Result<usize, WorkletError> {
        let changes = decode_init_patch(patch)?;
        Ok(self.update_worklet_ref_init_value_changes(&changes))
    }

    /// Drops the first-screen registry. Must follow at least one hydration
    /// and may only happen once.
    pub fn clear_first_screen_worklet_ref_map(&mut self) -> Result<(), WorkletError> {
        match self.phase {
            HydrationPhase::FirstScreen => Err(WorkletError::NotHydrated),
            HydrationPhase::Cleared => Err(WorkletError::AlreadyCleared),
            HydrationPhase::Hydrated => {
                log::debug!("clearing {} first-screen refs", self.first_screen.len());
                self.first_screen.clear();
                self.phase = HydrationPhase::Cleared;
                Ok(())
            }
        }
    }
}
