//! Sign tracking and item diffing for virtualised lists.
//!
//! Every list owns a set of native row identities ("signs"). A sign is either
//! bound to an item index (onscreen) or parked in a FIFO reuse pool
//! (offscreen). Entering an index prefers the oldest parked sign over
//! materialising a new row. Reuse is purely structural: the pooled sign may
//! last have shown an item of a different type or key, and the caller is
//! expected to re-apply the new item's attributes onto it.
//!
//! Separately from sign reuse, [`ListEngine::set_items`] diffs the backing
//! item set by `item-key` and queues one [`ListUpdateBatch`] describing the
//! change. Those batches replay cumulatively onto the previous item set.
//!
//! Row actions caused by scrolling (an `insertAction` for a materialised row,
//! a `removeAction` for a row that left past a shrunk end) describe native
//! rows, not the item set, and go to a separate queue read through
//! [`ListEngine::row_updates`].

use std::collections::VecDeque;
use std::fmt;

use tandem_core::collections::map::{HashMap, HashSet};
use tandem_core::lis::longest_increasing_subsequence;
use tandem_core::SnapshotTree;

use crate::actions::{InsertAction, ListUpdateBatch, UpdateAction};
use crate::error::ListError;
use crate::item::ListItemSpec;
use crate::pending::PendingListUpdates;
use crate::{ListId, Sign};

/// Default number of offscreen signs kept per list, matching common
/// recycler cache sizes.
const DEFAULT_MAX_OFFSCREEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListConfig {
    /// Offscreen signs beyond this count are released instead of pooled.
    pub max_offscreen: usize,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            max_offscreen: DEFAULT_MAX_OFFSCREEN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignState {
    Onscreen { index: usize },
    Offscreen { last_index: usize },
}

/// Result of [`ListEngine::enter_list_item_at_index`].
#[derive(Debug, Clone, PartialEq)]
pub struct EnterOutcome {
    pub sign: Sign,
    /// The sign came from the offscreen pool (or was already bound here).
    pub reused: bool,
    /// Index the sign was last bound to, if it existed before this call.
    pub previous_index: Option<usize>,
    /// Item now shown by the sign.
    pub item: ListItemSpec,
}

/// Result of [`ListEngine::leave_list_item`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The sign waits in the reuse pool.
    Pooled,
    /// The pool was full; the native row can be destroyed.
    Released,
}

#[derive(Default)]
struct ListState {
    items: Vec<ListItemSpec>,
    signs: HashMap<Sign, SignState>,
    offscreen: VecDeque<Sign>,
}

impl fmt::Debug for ListState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListState")
            .field("items", &self.items.len())
            .field("signs", &self.signs.len())
            .field("offscreen", &self.offscreen)
            .finish()
    }
}

impl ListState {
    fn bound_sign(&self, index: usize) -> Option<Sign> {
        self.signs.iter().find_map(|(sign, state)| match state {
            SignState::Onscreen { index: bound } if *bound == index => Some(*sign),
            _ => None,
        })
    }
}

#[derive(Debug, Default)]
pub struct ListEngine {
    config: ListConfig,
    lists: HashMap<ListId, ListState>,
    pending: PendingListUpdates,
    rows: PendingListUpdates,
}

impl ListEngine {
    pub fn new(config: ListConfig) -> Self {
        Self {
            config,
            lists: HashMap::default(),
            pending: PendingListUpdates::new(),
            rows: PendingListUpdates::new(),
        }
    }

    pub fn config(&self) -> ListConfig {
        self.config
    }

    /// Starts tracking `list`. Registering twice keeps the existing state.
    pub fn register_list(&mut self, list: ListId) {
        self.lists.entry(list).or_default();
    }

    /// Stops tracking `list` and returns every sign it still held, so the
    /// caller can destroy the native rows.
    pub fn unregister_list(&mut self, list: ListId) -> Result<Vec<Sign>, ListError> {
        let state = self
            .lists
            .remove(&list)
            .ok_or(ListError::UnknownList { list })?;
        self.pending.take(list);
        self.rows.take(list);
        let mut signs: Vec<Sign> = state.signs.into_keys().collect();
        signs.sort_unstable();
        Ok(signs)
    }

    pub fn contains(&self, list: ListId) -> bool {
        self.lists.contains_key(&list)
    }

    fn state(&self, list: ListId) -> Result<&ListState, ListError> {
        self.lists.get(&list).ok_or(ListError::UnknownList { list })
    }

    fn state_mut(&mut self, list: ListId) -> Result<&mut ListState, ListError> {
        self.lists
            .get_mut(&list)
            .ok_or(ListError::UnknownList { list })
    }

    pub fn items(&self, list: ListId) -> Result<&[ListItemSpec], ListError> {
        Ok(&self.state(list)?.items)
    }

    pub fn sign_state(&self, list: ListId, sign: Sign) -> Result<SignState, ListError> {
        self.state(list)?
            .signs
            .get(&sign)
            .copied()
            .ok_or(ListError::UnknownSign { list, sign })
    }

    /// Onscreen signs as `(index, sign)`, by index.
    pub fn onscreen(&self, list: ListId) -> Result<Vec<(usize, Sign)>, ListError> {
        let mut bound: Vec<(usize, Sign)> = self
            .state(list)?
            .signs
            .iter()
            .filter_map(|(sign, state)| match state {
                SignState::Onscreen { index } => Some((*index, *sign)),
                SignState::Offscreen { .. } => None,
            })
            .collect();
        bound.sort_unstable();
        Ok(bound)
    }

    /// Offscreen signs in reuse order.
    pub fn offscreen(&self, list: ListId) -> Result<Vec<Sign>, ListError> {
        Ok(self.state(list)?.offscreen.iter().copied().collect())
    }

    pub fn pending(&self) -> &PendingListUpdates {
        &self.pending
    }

    pub fn take_pending(&mut self) -> PendingListUpdates {
        std::mem::take(&mut self.pending)
    }

    /// Drains the item-set batches queued for `list` only.
    pub fn take_pending_for(&mut self, list: ListId) -> Vec<ListUpdateBatch> {
        self.pending.take(list)
    }

    /// Row actions queued by enter and leave.
    pub fn row_updates(&self) -> &PendingListUpdates {
        &self.rows
    }

    pub fn take_row_updates_for(&mut self, list: ListId) -> Vec<ListUpdateBatch> {
        self.rows.take(list)
    }

    /// Replaces the backing item set of `list` and queues the batch turning
    /// the previous set into the new one.
    pub fn set_items(&mut self, list: ListId, items: Vec<ListItemSpec>) -> Result<(), ListError> {
        let mut keys: HashSet<&str> = HashSet::default();
        for item in &items {
            if !keys.insert(item.item_key.as_str()) {
                return Err(ListError::DuplicateItemKey {
                    list,
                    item_key: item.item_key.clone(),
                });
            }
        }

        let state = self.state_mut(list)?;
        let batch = diff_items(&state.items, &items);
        log::debug!(
            "list {list}: {} items -> {} (+{} -{} ~{})",
            state.items.len(),
            items.len(),
            batch.insert_action.len(),
            batch.remove_action.len(),
            batch.update_action.len()
        );
        state.items = items;
        self.pending.push(list, batch);
        Ok(())
    }

    /// Reads the item set from the children of the list instance in `tree`.
    /// Children that are not items (no type or no `item-key`) are skipped.
    pub fn sync_from_snapshot(
        &mut self,
        list: ListId,
        tree: &SnapshotTree,
    ) -> Result<(), ListError> {
        let instance = tree.get(list).ok_or(ListError::UnknownList { list })?;
        let items: Vec<ListItemSpec> = instance
            .children()
            .iter()
            .filter_map(|child| tree.get(*child))
            .filter_map(ListItemSpec::from_instance)
            .collect();
        let skipped = instance.children().len() - items.len();
        if skipped > 0 {
            log::debug!("list {list}: {skipped} children without item-key ignored");
        }
        self.set_items(list, items)
    }

    /// Binds a sign to `index`. The oldest offscreen sign is reused when one
    /// exists; otherwise `materialize` creates a new row and a row
    /// `insertAction` is queued for it.
    pub fn enter_list_item_at_index(
        &mut self,
        list: ListId,
        index: usize,
        materialize: impl FnOnce(&ListItemSpec) -> Sign,
    ) -> Result<EnterOutcome, ListError> {
        let state = self.state_mut(list)?;
        let item = state
            .items
            .get(index)
            .cloned()
            .ok_or(ListError::IndexOutOfRange {
                list,
                index,
                len: state.items.len(),
            })?;

        if let Some(sign) = state.bound_sign(index) {
            return Ok(EnterOutcome {
                sign,
                reused: true,
                previous_index: Some(index),
                item,
            });
        }

        if let Some(sign) = state.offscreen.pop_front() {
            let previous_index = match state.signs.insert(sign, SignState::Onscreen { index }) {
                Some(SignState::Offscreen { last_index }) => Some(last_index),
                _ => None,
            };
            log::trace!("list {list}: reusing sign {sign} for index {index}");
            return Ok(EnterOutcome {
                sign,
                reused: true,
                previous_index,
                item,
            });
        }

        let sign = materialize(&item);
        if state.signs.contains_key(&sign) {
            return Err(ListError::DuplicateSign { list, sign });
        }
        state.signs.insert(sign, SignState::Onscreen { index });
        self.rows.push(
            list,
            ListUpdateBatch {
                insert_action: vec![InsertAction::for_item(index, &item)],
                ..ListUpdateBatch::default()
            },
        );
        Ok(EnterOutcome {
            sign,
            reused: false,
            previous_index: None,
            item,
        })
    }

    /// Moves `sign` offscreen. If its index fell off the end of the item set,
    /// a row `removeAction` for that index is queued as well.
    pub fn leave_list_item(&mut self, list: ListId, sign: Sign) -> Result<LeaveOutcome, ListError> {
        let max_offscreen = self.config.max_offscreen;
        let state = self.state_mut(list)?;
        let index = match state.signs.get(&sign) {
            Some(SignState::Onscreen { index }) => *index,
            Some(SignState::Offscreen { .. }) => {
                return Err(ListError::AlreadyOffscreen { list, sign })
            }
            None => return Err(ListError::UnknownSign { list, sign }),
        };
        let shrunk = index >= state.items.len();

        let outcome = if state.offscreen.len() >= max_offscreen {
            state.signs.remove(&sign);
            log::debug!("list {list}: reuse pool full, releasing sign {sign}");
            LeaveOutcome::Released
        } else {
            state
                .signs
                .insert(sign, SignState::Offscreen { last_index: index });
            state.offscreen.push_back(sign);
            LeaveOutcome::Pooled
        };

        if shrunk {
            self.rows.push(
                list,
                ListUpdateBatch {
                    remove_action: vec![index],
                    ..ListUpdateBatch::default()
                },
            );
        }
        Ok(outcome)
    }
}

/// Remove positions are old indices of dropped and moved keys; insert
/// positions are new indices of added and moved keys. Keys kept in place
/// whose content changed get an update.
fn diff_items(old: &[ListItemSpec], new: &[ListItemSpec]) -> ListUpdateBatch {
    let old_positions: HashMap<&str, usize> = old
        .iter()
        .enumerate()
        .map(|(position, item)| (item.item_key.as_str(), position))
        .collect();

    let survivors: Vec<(usize, usize)> = new
        .iter()
        .enumerate()
        .filter_map(|(to, item)| {
            old_positions
                .get(item.item_key.as_str())
                .map(|from| (*from, to))
        })
        .collect();
    let froms: Vec<usize> = survivors.iter().map(|(from, _)| *from).collect();
    let staying: Vec<(usize, usize)> = longest_increasing_subsequence(&froms)
        .into_iter()
        .map(|i| survivors[i])
        .collect();
    let stays_at: HashMap<usize, usize> = staying.iter().map(|(from, to)| (*to, *from)).collect();
    let kept_from: HashSet<usize> = staying.iter().map(|(from, _)| *from).collect();

    let mut batch = ListUpdateBatch {
        remove_action: (0..old.len())
            .filter(|position| !kept_from.contains(position))
            .collect(),
        ..ListUpdateBatch::default()
    };

    for (to, item) in new.iter().enumerate() {
        match stays_at.get(&to) {
            Some(&from) => {
                let previous = &old[from];
                if previous.differs_from(item) {
                    batch.update_action.push(UpdateAction {
                        from,
                        to,
                        item_key: item.item_key.clone(),
                        ty: item.ty.clone(),
                        flush: previous.ty != item.ty,
                    });
                }
            }
            None => batch.insert_action.push(InsertAction::for_item(to, item)),
        }
    }
    batch
}
