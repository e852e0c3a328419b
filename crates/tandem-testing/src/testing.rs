use std::fmt;

use serde_json::{json, Value};
use tandem_core::collections::map::HashMap;
use tandem_core::{
    diff, DiffError, ElementApi, ElementHandle, MainThreadTree, MemoryElementApi, PatchBatch,
    RecordingSink, RenderEvent, RuntimeError, SessionError, SnapshotSession, SnapshotTree,
    TemplateRegistry,
};
use tandem_list::{
    EnterOutcome, LeaveOutcome, ListAttribute, ListConfig, ListEngine, ListError, ListId,
    ListUpdateBatch, Sign, ITEM_KEY,
};
use tandem_worklet::{
    encode_init_patch, HydrationReport, WorkletConfig, WorkletError, WorkletRuntime,
    WorkletValueId,
};

use crate::message::{Channel, Message};

/// Tag of the native rows created for list items.
pub const LIST_ROW_TAG: &str = "list-item";

#[derive(Debug)]
pub enum HarnessError {
    Session(SessionError),
    Diff(DiffError),
    Runtime(RuntimeError),
    List(ListError),
    Worklet(WorkletError),
    Channel(serde_json::Error),
}

impl fmt::Display for HarnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HarnessError::Session(err) => write!(f, "session: {err}"),
            HarnessError::Diff(err) => write!(f, "diff: {err}"),
            HarnessError::Runtime(err) => write!(f, "main thread: {err}"),
            HarnessError::List(err) => write!(f, "list: {err}"),
            HarnessError::Worklet(err) => write!(f, "worklet: {err}"),
            HarnessError::Channel(err) => write!(f, "channel: {err}"),
        }
    }
}

impl std::error::Error for HarnessError {}

impl From<SessionError> for HarnessError {
    fn from(err: SessionError) -> Self {
        HarnessError::Session(err)
    }
}

impl From<DiffError> for HarnessError {
    fn from(err: DiffError) -> Self {
        HarnessError::Diff(err)
    }
}

impl From<RuntimeError> for HarnessError {
    fn from(err: RuntimeError) -> Self {
        HarnessError::Runtime(err)
    }
}

impl From<ListError> for HarnessError {
    fn from(err: ListError) -> Self {
        HarnessError::List(err)
    }
}

impl From<WorkletError> for HarnessError {
    fn from(err: WorkletError) -> Self {
        HarnessError::Worklet(err)
    }
}

impl From<serde_json::Error> for HarnessError {
    fn from(err: serde_json::Error) -> Self {
        HarnessError::Channel(err)
    }
}

/// Headless harness joining a background session and a main-thread tree.
///
/// The background side renders through a [`SnapshotSession`] and only talks
/// to the main thread through a [`Channel`]; nothing reaches the main-thread
/// tree, the worklet runtime or the list consumers until [`pump`] delivers
/// the queued messages. List rows are driven directly, the way native scroll
/// callbacks would.
///
/// [`pump`]: TandemTestRule::pump
pub struct TandemTestRule {
    session: SnapshotSession,
    to_main: Channel,
    main: MainThreadTree,
    api: MemoryElementApi,
    sink: RecordingSink,
    worklets: WorkletRuntime,
    lists: ListEngine,
    registered: Vec<ListId>,
    attributes: HashMap<ListId, ListAttribute>,
    rows: HashMap<(ListId, Sign), ElementHandle>,
    row_updates: Vec<(ListId, ListUpdateBatch)>,
    next_sign: Sign,
    rejected: usize,
    hydrations: Vec<HydrationReport>,
}

impl TandemTestRule {
    pub fn new(templates: TemplateRegistry) -> Self {
        Self::with_config(templates, ListConfig::default(), WorkletConfig::default())
    }

    pub fn with_config(
        templates: TemplateRegistry,
        list_config: ListConfig,
        worklet_config: WorkletConfig,
    ) -> Self {
        let mut api = MemoryElementApi::new();
        let main = MainThreadTree::new(templates, &mut api);
        Self {
            session: SnapshotSession::new(),
            to_main: Channel::new(),
            main,
            api,
            sink: RecordingSink::new(),
            worklets: WorkletRuntime::init(worklet_config),
            lists: ListEngine::new(list_config),
            registered: Vec::new(),
            attributes: HashMap::default(),
            rows: HashMap::default(),
            row_updates: Vec::new(),
            next_sign: 0,
            rejected: 0,
            hydrations: Vec::new(),
        }
    }

    pub fn session(&self) -> &SnapshotSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SnapshotSession {
        &mut self.session
    }

    pub fn main(&self) -> &MainThreadTree {
        &self.main
    }

    pub fn api(&self) -> &MemoryElementApi {
        &self.api
    }

    pub fn api_mut(&mut self) -> &mut MemoryElementApi {
        &mut self.api
    }

    pub fn sink(&self) -> &RecordingSink {
        &self.sink
    }

    pub fn worklets(&self) -> &WorkletRuntime {
        &self.worklets
    }

    pub fn worklets_mut(&mut self) -> &mut WorkletRuntime {
        &mut self.worklets
    }

    pub fn lists(&self) -> &ListEngine {
        &self.lists
    }

    /// Consumer-side view of `list`, once any item-set batch reached it.
    pub fn list_attribute(&self, list: ListId) -> Option<&ListAttribute> {
        self.attributes.get(&list)
    }

    /// Row-level batches produced by enter and leave, in order.
    pub fn row_updates(&self) -> &[(ListId, ListUpdateBatch)] {
        &self.row_updates
    }

    /// Native row element bound to `sign`.
    pub fn row(&self, list: ListId, sign: Sign) -> Option<ElementHandle> {
        self.rows.get(&(list, sign)).copied()
    }

    /// Patch batches the main thread refused.
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    pub fn hydrations(&self) -> &[HydrationReport] {
        &self.hydrations
    }

    pub fn in_flight(&self) -> usize {
        self.to_main.len()
    }

    /// Dump of the native element tree under the page.
    pub fn dump_tree(&self) -> String {
        self.api.dump(self.main.page())
    }

    /// Renders `tree` synchronously on the main thread and seeds the session
    /// with it, so the first background commit only carries the delta.
    pub fn render_first_screen(&mut self, tree: SnapshotTree) -> Result<(), HarnessError> {
        let ops = diff(&SnapshotTree::new(), &tree)?;
        self.main.apply_ops(&mut self.api, &ops, &self.sink)?;
        self.session.adopt_first_screen(tree);
        self.flush_list_items()
    }

    /// Background side: feeds reconciler events into the working tree.
    pub fn render(
        &mut self,
        events: impl IntoIterator<Item = RenderEvent>,
    ) -> Result<(), HarnessError> {
        self.session.handle_all(events)?;
        Ok(())
    }

    /// Background side: commits the working tree and queues the resulting
    /// patch and list updates. Returns the new revision if anything changed.
    pub fn commit(&mut self) -> Result<Option<u64>, HarnessError> {
        let Some(batch) = self.session.commit()? else {
            return Ok(None);
        };
        let revision = batch.revision;
        self.to_main.send(&Message::Patch { batch })?;
        self.flush_list_items()?;
        Ok(Some(revision))
    }

    pub fn render_and_commit(
        &mut self,
        events: impl IntoIterator<Item = RenderEvent>,
    ) -> Result<Option<u64>, HarnessError> {
        self.render(events)?;
        self.commit()
    }

    /// Queues an already encoded stream, bypassing the session.
    pub fn send_stream(&mut self, revision: u64, ops: Vec<Value>) -> Result<(), HarnessError> {
        self.to_main.send(&Message::Patch {
            batch: PatchBatch { revision, ops },
        })?;
        Ok(())
    }

    /// Queues text that does not parse as a message.
    pub fn send_garbage(&mut self, text: &str) {
        self.to_main.send_raw(text);
    }

    pub fn send_worklet_init(
        &mut self,
        changes: &[(WorkletValueId, Value)],
    ) -> Result<(), HarnessError> {
        self.to_main.send(&Message::WorkletInit {
            patch: encode_init_patch(changes),
        })?;
        Ok(())
    }

    pub fn send_hydrate(
        &mut self,
        new_ctx: Value,
        first_screen_ctx: Value,
    ) -> Result<(), HarnessError> {
        self.to_main.send(&Message::Hydrate {
            new_ctx,
            first_screen_ctx,
        })?;
        Ok(())
    }

    /// Main-thread side: delivers every queued message in order. Rejected
    /// patch batches are counted and reported to the sink; they do not stop
    /// the pump. Returns how many messages were handled.
    pub fn pump(&mut self) -> Result<usize, HarnessError> {
        let mut handled = 0;
        while let Some(message) = self.to_main.recv() {
            handled += 1;
            match message? {
                Message::Patch { batch } => {
                    if let Err(err) = self.main.apply_batch(&mut self.api, &batch, &self.sink) {
                        log::warn!("revision {} rejected: {err}", batch.revision);
                        self.rejected += 1;
                    }
                }
                Message::ListUpdates { list, batches } => {
                    self.attributes
                        .entry(list)
                        .or_insert_with(|| ListAttribute::new(list))
                        .apply_all(&batches)?;
                }
                Message::WorkletInit { patch } => {
                    self.worklets.apply_init_patch(&patch)?;
                }
                Message::Hydrate {
                    new_ctx,
                    first_screen_ctx,
                } => {
                    let report = self.worklets.hydrate_ctx(&new_ctx, &first_screen_ctx)?;
                    self.hydrations.push(report);
                }
            }
        }
        Ok(handled)
    }

    /// Recovers from a rejected batch: the main thread drops its tree and the
    /// session queues a full rebuild. Returns the rebuild's revision.
    pub fn resync(&mut self) -> Result<u64, HarnessError> {
        self.main.reset(&mut self.api);
        let batch = self.session.resend_full()?;
        let revision = batch.revision;
        self.to_main.send(&Message::Patch { batch })?;
        Ok(revision)
    }

    /// Starts tracking the list instance `list`. Its current items are
    /// queued right away if the instance is already committed.
    pub fn register_list(&mut self, list: ListId) -> Result<(), HarnessError> {
        self.lists.register_list(list);
        if !self.registered.contains(&list) {
            self.registered.push(list);
        }
        self.flush_list_items()
    }

    /// Native scroll callback: `index` is about to become visible.
    pub fn enter(&mut self, list: ListId, index: usize) -> Result<EnterOutcome, HarnessError> {
        let api = &mut self.api;
        let rows = &mut self.rows;
        let next_sign = &mut self.next_sign;
        let outcome = self.lists.enter_list_item_at_index(list, index, |_| {
            *next_sign += 1;
            rows.insert((list, *next_sign), api.create_element(LIST_ROW_TAG));
            *next_sign
        })?;

        // Reused rows keep their element; the caller re-applies the item.
        if let Some(row) = self.rows.get(&(list, outcome.sign)) {
            self.api
                .set_attribute(*row, ITEM_KEY, &json!(outcome.item.item_key));
            for (name, value) in &outcome.item.attributes {
                self.api.set_attribute(*row, name, value);
            }
        }
        self.collect_row_updates(list);
        Ok(outcome)
    }

    /// Native scroll callback: the row bound to `sign` left the viewport.
    pub fn leave(&mut self, list: ListId, sign: Sign) -> Result<LeaveOutcome, HarnessError> {
        let outcome = self.lists.leave_list_item(list, sign)?;
        if outcome == LeaveOutcome::Released {
            if let Some(row) = self.rows.remove(&(list, sign)) {
                self.api.release_element(row);
            }
        }
        self.collect_row_updates(list);
        Ok(outcome)
    }

    fn flush_list_items(&mut self) -> Result<(), HarnessError> {
        for &list in &self.registered {
            if !self.session.committed().contains(list) {
                continue;
            }
            self.lists.sync_from_snapshot(list, self.session.committed())?;
            let batches = self.lists.take_pending_for(list);
            if !batches.is_empty() {
                self.to_main.send(&Message::ListUpdates { list, batches })?;
            }
        }
        Ok(())
    }

    fn collect_row_updates(&mut self, list: ListId) {
        for batch in self.lists.take_row_updates_for(list) {
            self.row_updates.push((list, batch));
        }
    }
}

impl fmt::Debug for TandemTestRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TandemTestRule")
            .field("revision", &self.session.revision())
            .field("main_revision", &self.main.revision())
            .field("in_flight", &self.to_main.len())
            .field("rejected", &self.rejected)
            .field("lists", &self.registered)
            .finish()
    }
}
