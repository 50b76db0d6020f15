use std::collections::BTreeMap;

use orion_error::prelude::*;

use crate::error::{CoreReason, CoreResult};
use crate::partition::{OutputTag, PartitionKey, TableSemantics};
use crate::row::Row;
use crate::state::{KeyedState, Namespace};
use crate::window::TimeWindow;

// ---------------------------------------------------------------------------
// Side channels
// ---------------------------------------------------------------------------

/// Tagged side outputs of one invocation; each tag keeps its own order.
pub(crate) struct SideChannels<'a> {
    tags: &'a [OutputTag],
    open: bool,
    rows: BTreeMap<String, Vec<Row>>,
}

impl<'a> SideChannels<'a> {
    pub(crate) fn open(tags: &'a [OutputTag]) -> Self {
        Self {
            tags,
            open: true,
            rows: BTreeMap::new(),
        }
    }

    /// Channels for `clear`, which must not emit.
    pub(crate) fn closed() -> Self {
        Self {
            tags: &[],
            open: false,
            rows: BTreeMap::new(),
        }
    }

    fn emit(&mut self, tag: &str, row: Row) -> CoreResult<()> {
        if !self.open {
            return StructError::from(CoreReason::UserLogic)
                .with_detail(format!("output to {tag:?} is not permitted during clear"))
                .err();
        }
        if !self.tags.iter().any(|t| t.name == tag) {
            return StructError::from(CoreReason::UserLogic)
                .with_detail(format!("undeclared side output tag {tag:?}"))
                .err();
        }
        self.rows.entry(tag.to_string()).or_default().push(row);
        Ok(())
    }

    fn into_rows(self) -> BTreeMap<String, Vec<Row>> {
        self.rows
    }
}

// ---------------------------------------------------------------------------
// ScopedState
// ---------------------------------------------------------------------------

/// State handle bound to one namespace of the invoking key.
pub struct ScopedState<'a> {
    state: &'a mut KeyedState,
    namespace: Namespace,
}

impl ScopedState<'_> {
    pub async fn get(&self, name: &str) -> CoreResult<Option<Row>> {
        self.state.get(self.namespace, name).await
    }

    pub async fn get_or_empty(&self, name: &str) -> CoreResult<Row> {
        self.state.get_or_empty(self.namespace, name).await
    }

    pub async fn put(&mut self, name: &str, value: Row) -> CoreResult<()> {
        self.state.put(self.namespace, name, value).await
    }

    pub async fn clear(&mut self, name: &str) -> CoreResult<()> {
        self.state.clear(self.namespace, name).await
    }

    /// Clear every entry of this namespace.
    pub async fn clear_all(&mut self) -> CoreResult<()> {
        self.state.clear_namespace(self.namespace).await
    }
}

// ---------------------------------------------------------------------------
// WindowContext
// ---------------------------------------------------------------------------

/// Services available to one window-function invocation.
///
/// Valid only for the invocation that received it.
pub struct WindowContext<'a> {
    window: TimeWindow,
    watermark: i64,
    processing_time: i64,
    state: &'a mut KeyedState,
    side: SideChannels<'a>,
}

impl<'a> WindowContext<'a> {
    pub(crate) fn new(
        window: TimeWindow,
        watermark: i64,
        state: &'a mut KeyedState,
        side: SideChannels<'a>,
    ) -> Self {
        Self {
            window,
            watermark,
            processing_time: state.now_ms(),
            state,
            side,
        }
    }

    pub fn key(&self) -> &PartitionKey {
        self.state.key()
    }

    pub fn window(&self) -> TimeWindow {
        self.window
    }

    pub fn current_processing_time(&self) -> i64 {
        self.processing_time
    }

    pub fn current_watermark(&self) -> i64 {
        self.watermark
    }

    /// State scoped to `(key, window)`.
    pub fn window_state(&mut self) -> ScopedState<'_> {
        ScopedState {
            state: self.state,
            namespace: Namespace::Window(self.window),
        }
    }

    /// State scoped to the key, shared by all of its windows.
    pub fn global_state(&mut self) -> ScopedState<'_> {
        ScopedState {
            state: self.state,
            namespace: Namespace::Global,
        }
    }

    /// Emit `row` on side channel `tag`.
    pub fn output(&mut self, tag: &str, row: Row) -> CoreResult<()> {
        self.side.emit(tag, row)
    }

    pub(crate) fn into_side(self) -> BTreeMap<String, Vec<Row>> {
        self.side.into_rows()
    }
}

// ---------------------------------------------------------------------------
// PtfContext
// ---------------------------------------------------------------------------

enum PendingClear {
    Entry(String),
    All,
}

/// Handle to one named, partition-scoped state entry of a table function.
pub struct NamedState<'a> {
    state: &'a mut KeyedState,
    name: String,
}

impl NamedState<'_> {
    pub async fn get(&self) -> CoreResult<Option<Row>> {
        self.state.get(Namespace::Global, &self.name).await
    }

    /// The stored row, or the declared schema's all-null row.
    pub async fn get_or_empty(&self) -> CoreResult<Row> {
        self.state.get_or_empty(Namespace::Global, &self.name).await
    }

    pub async fn put(&mut self, value: Row) -> CoreResult<()> {
        self.state.put(Namespace::Global, &self.name, value).await
    }
}

/// Services available to one `eval` call of a process table function.
///
/// `clear_state`/`clear_all_state` take effect when `eval` returns, after the
/// writes made during the same call.
pub struct PtfContext<'a> {
    semantics: &'a TableSemantics,
    watermark: i64,
    processing_time: i64,
    state: &'a mut KeyedState,
    side: SideChannels<'a>,
    pending: Vec<PendingClear>,
}

impl<'a> PtfContext<'a> {
    pub(crate) fn new(
        semantics: &'a TableSemantics,
        watermark: i64,
        state: &'a mut KeyedState,
        side: SideChannels<'a>,
    ) -> Self {
        Self {
            semantics,
            watermark,
            processing_time: state.now_ms(),
            state,
            side,
            pending: Vec::new(),
        }
    }

    pub fn key(&self) -> &PartitionKey {
        self.state.key()
    }

    /// Partition metadata of the table argument declared as `arg`.
    pub fn table_semantics_for(&self, arg: &str) -> CoreResult<&TableSemantics> {
        if self.semantics.argument() == arg {
            return Ok(self.semantics);
        }
        StructError::from(CoreReason::Partition)
            .with_detail(format!("no table argument named {arg:?}"))
            .err()
    }

    pub fn current_processing_time(&self) -> i64 {
        self.processing_time
    }

    pub fn current_watermark(&self) -> i64 {
        self.watermark
    }

    pub fn state(&mut self, name: &str) -> NamedState<'_> {
        NamedState {
            state: self.state,
            name: name.to_string(),
        }
    }

    pub fn clear_state(&mut self, name: &str) {
        self.pending.push(PendingClear::Entry(name.to_string()));
    }

    pub fn clear_all_state(&mut self) {
        self.pending.push(PendingClear::All);
    }

    pub fn output(&mut self, tag: &str, row: Row) -> CoreResult<()> {
        self.side.emit(tag, row)
    }

    /// Apply deferred clears and hand back the side outputs.
    pub(crate) async fn finish(self) -> CoreResult<BTreeMap<String, Vec<Row>>> {
        for clear in self.pending {
            match clear {
                PendingClear::Entry(name) => self.state.clear(Namespace::Global, &name).await?,
                PendingClear::All => self.state.clear_key().await?,
            }
        }
        Ok(self.side.into_rows())
    }
}
