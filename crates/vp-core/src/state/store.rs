use std::sync::Arc;

use orion_error::prelude::*;

use super::backend::{Namespace, StagedOp, StateAddress, StateBackend, StateValue, StoredEntry};
use super::decl::{StateDecl, StateDecls};
use super::txn::StateTxn;
use crate::clock::Clock;
use crate::error::{CoreReason, CoreResult};
use crate::partition::PartitionKey;
use crate::row::Row;
use crate::window::TimeWindow;

/// Reserved entry holding the buffered elements of a window.
pub const WINDOW_BUFFER: &str = "__window_buffer";

// ---------------------------------------------------------------------------
// StateStore
// ---------------------------------------------------------------------------

/// Facade over a [`StateBackend`]: the only path through which state is read
/// or mutated. Applies declarations (TTL) and per-key scoping.
#[derive(Clone)]
pub struct StateStore {
    backend: Arc<dyn StateBackend>,
    decls: Arc<StateDecls>,
    clock: Arc<dyn Clock>,
}

impl StateStore {
    pub fn new(backend: Arc<dyn StateBackend>, decls: StateDecls, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            decls: Arc::new(decls),
            clock,
        }
    }

    pub fn decls(&self) -> &StateDecls {
        &self.decls
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Open a staged view of one key's state for a single invocation.
    pub fn begin(&self, key: PartitionKey) -> KeyedState {
        KeyedState {
            store: self.clone(),
            key,
            txn: StateTxn::new(),
        }
    }

    pub async fn get_window_state(
        &self,
        key: &PartitionKey,
        window: TimeWindow,
        name: &str,
    ) -> CoreResult<Option<Row>> {
        self.begin(key.clone())
            .get(Namespace::Window(window), name)
            .await
    }

    pub async fn put_window_state(
        &self,
        key: &PartitionKey,
        window: TimeWindow,
        name: &str,
        value: Row,
    ) -> CoreResult<()> {
        let mut state = self.begin(key.clone());
        state.put(Namespace::Window(window), name, value).await?;
        state.commit().await
    }

    pub async fn get_global_state(
        &self,
        key: &PartitionKey,
        name: &str,
    ) -> CoreResult<Option<Row>> {
        self.begin(key.clone()).get(Namespace::Global, name).await
    }

    pub async fn put_global_state(
        &self,
        key: &PartitionKey,
        name: &str,
        value: Row,
    ) -> CoreResult<()> {
        let mut state = self.begin(key.clone());
        state.put(Namespace::Global, name, value).await?;
        state.commit().await
    }

    /// Clear one entry, window-scoped if `window` is given, else global.
    pub async fn clear_state(
        &self,
        key: &PartitionKey,
        name: &str,
        window: Option<TimeWindow>,
    ) -> CoreResult<()> {
        let mut state = self.begin(key.clone());
        state.clear(namespace_of(window), name).await?;
        state.commit().await
    }

    /// Clear every entry of the window's namespace, or of the whole key when
    /// `window` is `None`.
    pub async fn clear_all_state(
        &self,
        key: &PartitionKey,
        window: Option<TimeWindow>,
    ) -> CoreResult<()> {
        let mut state = self.begin(key.clone());
        match window {
            Some(w) => state.clear_namespace(Namespace::Window(w)).await?,
            None => state.clear_key().await?,
        }
        state.commit().await
    }

    pub async fn has_entries(&self, key: &PartitionKey) -> CoreResult<bool> {
        self.backend.has_entries(key).await
    }

    /// Reclaim TTL-expired entries of every key.
    pub async fn sweep(&self) -> CoreResult<usize> {
        self.backend.sweep(self.clock.now_ms()).await
    }

    fn decl(&self, name: &str) -> CoreResult<Option<&StateDecl>> {
        if name == WINDOW_BUFFER {
            return Ok(None);
        }
        match self.decls.get(name) {
            Some(decl) => Ok(Some(decl)),
            None => StructError::from(CoreReason::StateAccess)
                .with_detail(format!("undeclared state entry {name:?}"))
                .err(),
        }
    }
}

fn namespace_of(window: Option<TimeWindow>) -> Namespace {
    window.map_or(Namespace::Global, Namespace::Window)
}

// ---------------------------------------------------------------------------
// KeyedState
// ---------------------------------------------------------------------------

/// One key's state as seen by a single invocation.
///
/// Mutations are staged and only reach the backend on [`commit`](Self::commit);
/// dropping an uncommitted `KeyedState` discards them.
pub struct KeyedState {
    store: StateStore,
    key: PartitionKey,
    txn: StateTxn,
}

impl KeyedState {
    pub fn key(&self) -> &PartitionKey {
        &self.key
    }

    pub fn now_ms(&self) -> i64 {
        self.store.now_ms()
    }

    /// Number of staged mutations.
    pub fn pending(&self) -> usize {
        self.txn.len()
    }

    pub async fn get(&self, namespace: Namespace, name: &str) -> CoreResult<Option<Row>> {
        self.store.decl(name)?;
        match self.read(namespace, name).await? {
            None => Ok(None),
            Some(StateValue::Row(row)) => Ok(Some(row)),
            Some(StateValue::List(_)) => StructError::from(CoreReason::StateAccess)
                .with_detail(format!("state entry {name:?} holds a list"))
                .err(),
        }
    }

    /// Like [`get`](Self::get) but an absent entry reads as the declared
    /// schema's all-null row.
    pub async fn get_or_empty(&self, namespace: Namespace, name: &str) -> CoreResult<Row> {
        if let Some(row) = self.get(namespace, name).await? {
            return Ok(row);
        }
        Ok(self
            .store
            .decl(name)?
            .map(|d| d.schema.empty_row())
            .unwrap_or_default())
    }

    pub async fn put(&mut self, namespace: Namespace, name: &str, value: Row) -> CoreResult<()> {
        let ttl_ms = self.store.decl(name)?.and_then(|d| d.ttl_ms);
        let addr = self.addr(namespace, name);
        self.txn.stage(StagedOp::Put {
            addr,
            entry: StoredEntry {
                value: StateValue::Row(value),
                last_write_ms: self.store.now_ms(),
                ttl_ms,
            },
        });
        Ok(())
    }

    pub async fn clear(&mut self, namespace: Namespace, name: &str) -> CoreResult<()> {
        self.store.decl(name)?;
        let addr = self.addr(namespace, name);
        self.txn.stage(StagedOp::Remove(addr));
        Ok(())
    }

    pub async fn clear_namespace(&mut self, namespace: Namespace) -> CoreResult<()> {
        self.txn.stage(StagedOp::RemoveNamespace {
            key: self.key.clone(),
            namespace,
        });
        Ok(())
    }

    pub async fn clear_key(&mut self) -> CoreResult<()> {
        self.txn.stage(StagedOp::RemoveKey(self.key.clone()));
        Ok(())
    }

    /// Append to the window's element buffer.
    pub(crate) async fn buffer_element(&mut self, window: TimeWindow, row: Row) -> CoreResult<()> {
        let addr = self.addr(Namespace::Window(window), WINDOW_BUFFER);
        let at_ms = self.store.now_ms();
        self.txn.stage(StagedOp::Append { addr, row, at_ms });
        Ok(())
    }

    pub(crate) async fn buffered_elements(&self, window: TimeWindow) -> CoreResult<Vec<Row>> {
        match self.read(Namespace::Window(window), WINDOW_BUFFER).await? {
            None => Ok(Vec::new()),
            Some(StateValue::List(rows)) => Ok(rows),
            Some(StateValue::Row(row)) => Ok(vec![row]),
        }
    }

    /// Write every staged mutation to the backend, in issue order.
    pub async fn commit(self) -> CoreResult<()> {
        if self.txn.is_empty() {
            return Ok(());
        }
        self.store.backend.commit(self.txn.into_ops()).await
    }

    async fn read(&self, namespace: Namespace, name: &str) -> CoreResult<Option<StateValue>> {
        let addr = self.addr(namespace, name);
        let now = self.store.now_ms();
        let base = match self.store.backend.get(&addr).await? {
            Some(entry) if entry.is_expired(now) => {
                self.store.backend.remove_if_expired(&addr, now).await?;
                tracing::trace!(domain = "state", key = %self.key, name, "ttl expired on read");
                None
            }
            Some(entry) => Some(entry.value),
            None => None,
        };
        Ok(self.txn.overlay(&addr, base))
    }

    fn addr(&self, namespace: Namespace, name: &str) -> StateAddress {
        StateAddress::new(self.key.clone(), namespace, name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::row::{DataKind, FieldDecl, RowSchema, Value};
    use crate::state::backend::MemoryBackend;

    const DAY_MS: i64 = 86_400_000;

    fn count_schema() -> RowSchema {
        RowSchema::new(vec![FieldDecl::new("count", DataKind::Int)])
    }

    fn count(v: i64) -> Row {
        Row::single(Some(Value::Int(v)))
    }

    fn store(clock: Arc<ManualClock>) -> (StateStore, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        let decls = StateDecls::new(vec![
            StateDecl::new("count", count_schema()),
            StateDecl::new("sum", count_schema()),
            StateDecl::new("daily", count_schema())
                .with_ttl("1 day")
                .unwrap(),
        ])
        .unwrap();
        (StateStore::new(backend.clone(), decls, clock), backend)
    }

    #[tokio::test]
    async fn fresh_entry_is_empty() {
        let (store, _) = store(Arc::new(ManualClock::new(0)));
        let key = PartitionKey::from("a");
        assert_eq!(store.get_global_state(&key, "count").await.unwrap(), None);

        let state = store.begin(key);
        let row = state.get_or_empty(Namespace::Global, "count").await.unwrap();
        assert_eq!(row, count_schema().empty_row());
    }

    #[tokio::test]
    async fn undeclared_entry_rejected() {
        let (store, _) = store(Arc::new(ManualClock::new(0)));
        let key = PartitionKey::from("a");
        let err = store.get_global_state(&key, "nope").await.unwrap_err();
        assert!(err.to_string().contains("state access"), "got: {err}");
    }

    #[tokio::test]
    async fn window_and_global_scopes_are_separate() {
        let (store, _) = store(Arc::new(ManualClock::new(0)));
        let key = PartitionKey::from("a");
        let w = TimeWindow::new(0, 10);
        store.put_window_state(&key, w, "count", count(1)).await.unwrap();
        store.put_global_state(&key, "count", count(2)).await.unwrap();

        assert_eq!(store.get_window_state(&key, w, "count").await.unwrap(), Some(count(1)));
        assert_eq!(store.get_global_state(&key, "count").await.unwrap(), Some(count(2)));
        assert_eq!(
            store
                .get_window_state(&key, TimeWindow::new(10, 20), "count")
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn clear_all_state_empties_every_entry_of_window() {
        let (store, _) = store(Arc::new(ManualClock::new(0)));
        let key = PartitionKey::from("a");
        let w = TimeWindow::new(0, 10);
        store.put_window_state(&key, w, "count", count(1)).await.unwrap();
        store.put_window_state(&key, w, "sum", count(5)).await.unwrap();
        store.put_global_state(&key, "count", count(9)).await.unwrap();

        store.clear_all_state(&key, Some(w)).await.unwrap();
        for name in ["count", "sum"] {
            assert_eq!(store.get_window_state(&key, w, name).await.unwrap(), None);
        }
        assert_eq!(store.get_global_state(&key, "count").await.unwrap(), Some(count(9)));

        store.clear_all_state(&key, None).await.unwrap();
        assert_eq!(store.get_global_state(&key, "count").await.unwrap(), None);
        assert!(!store.has_entries(&key).await.unwrap());
    }

    #[tokio::test]
    async fn clear_state_single_entry() {
        let (store, _) = store(Arc::new(ManualClock::new(0)));
        let key = PartitionKey::from("a");
        store.put_global_state(&key, "count", count(1)).await.unwrap();
        store.put_global_state(&key, "sum", count(1)).await.unwrap();
        store.clear_state(&key, "count", None).await.unwrap();
        assert_eq!(store.get_global_state(&key, "count").await.unwrap(), None);
        assert_eq!(store.get_global_state(&key, "sum").await.unwrap(), Some(count(1)));
    }

    #[tokio::test]
    async fn ttl_entry_reads_empty_after_expiry() {
        let clock = Arc::new(ManualClock::new(1_000));
        let (store, backend) = store(clock.clone());
        let key = PartitionKey::from("a");
        store.put_global_state(&key, "daily", count(3)).await.unwrap();

        clock.advance(DAY_MS - 1);
        assert_eq!(store.get_global_state(&key, "daily").await.unwrap(), Some(count(3)));

        clock.advance(DAY_MS + 1);
        assert_eq!(store.get_global_state(&key, "daily").await.unwrap(), None);
        // Lazily reclaimed on that read.
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn ttl_sweep_reclaims_without_reads() {
        let clock = Arc::new(ManualClock::new(0));
        let (store, backend) = store(clock.clone());
        store
            .put_global_state(&PartitionKey::from("a"), "daily", count(1))
            .await
            .unwrap();
        store
            .put_global_state(&PartitionKey::from("b"), "count", count(1))
            .await
            .unwrap();
        clock.advance(2 * DAY_MS);
        assert_eq!(store.sweep().await.unwrap(), 1);
        assert_eq!(backend.len().await, 1);
    }

    #[tokio::test]
    async fn staged_writes_visible_only_to_own_view_until_commit() {
        let (store, _) = store(Arc::new(ManualClock::new(0)));
        let key = PartitionKey::from("a");
        let mut state = store.begin(key.clone());
        state.put(Namespace::Global, "count", count(4)).await.unwrap();
        assert_eq!(
            state.get(Namespace::Global, "count").await.unwrap(),
            Some(count(4))
        );
        assert_eq!(store.get_global_state(&key, "count").await.unwrap(), None);

        state.commit().await.unwrap();
        assert_eq!(store.get_global_state(&key, "count").await.unwrap(), Some(count(4)));
    }

    #[tokio::test]
    async fn dropped_view_discards_mutations() {
        let (store, backend) = store(Arc::new(ManualClock::new(0)));
        let key = PartitionKey::from("a");
        {
            let mut state = store.begin(key.clone());
            state.put(Namespace::Global, "count", count(4)).await.unwrap();
            state.buffer_element(TimeWindow::new(0, 10), count(1)).await.unwrap();
            assert_eq!(state.pending(), 2);
        }
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn buffer_accumulates_across_commits() {
        let (store, _) = store(Arc::new(ManualClock::new(0)));
        let key = PartitionKey::from("a");
        let w = TimeWindow::new(0, 10);

        let mut state = store.begin(key.clone());
        state.buffer_element(w, count(1)).await.unwrap();
        state.commit().await.unwrap();

        let mut state = store.begin(key.clone());
        state.buffer_element(w, count(2)).await.unwrap();
        assert_eq!(state.buffered_elements(w).await.unwrap(), vec![count(1), count(2)]);
        state.clear_namespace(Namespace::Window(w)).await.unwrap();
        assert!(state.buffered_elements(w).await.unwrap().is_empty());
        state.commit().await.unwrap();
        assert!(!store.has_entries(&key).await.unwrap());
    }
}
