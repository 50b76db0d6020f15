use std::collections::{BTreeMap, HashMap};
use std::fmt;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::CoreResult;
use crate::partition::PartitionKey;
use crate::row::Row;
use crate::window::TimeWindow;

// ---------------------------------------------------------------------------
// Addressing
// ---------------------------------------------------------------------------

/// Scope of a state entry within a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    Global,
    Window(TimeWindow),
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Global => f.write_str("global"),
            Namespace::Window(w) => write!(f, "window{w}"),
        }
    }
}

/// Fully qualified location of one state entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateAddress {
    pub key: PartitionKey,
    pub namespace: Namespace,
    pub name: String,
}

impl StateAddress {
    pub fn new(key: PartitionKey, namespace: Namespace, name: impl Into<String>) -> Self {
        Self {
            key,
            namespace,
            name: name.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Stored values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum StateValue {
    Row(Row),
    List(Vec<Row>),
}

impl StateValue {
    /// Append `row`, turning a single-row value into a list.
    pub fn push_row(&mut self, row: Row) {
        match self {
            StateValue::List(rows) => rows.push(row),
            StateValue::Row(existing) => {
                *self = StateValue::List(vec![existing.clone(), row]);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
    pub value: StateValue,
    /// Processing time of the last write, epoch milliseconds.
    pub last_write_ms: i64,
    pub ttl_ms: Option<i64>,
}

impl StoredEntry {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        match self.ttl_ms {
            Some(ttl) => now_ms >= self.last_write_ms.saturating_add(ttl),
            None => false,
        }
    }
}

/// A mutation staged by an invocation and applied on commit.
#[derive(Debug, Clone, PartialEq)]
pub enum StagedOp {
    Put {
        addr: StateAddress,
        entry: StoredEntry,
    },
    /// Append to a list entry, creating it if absent.
    Append {
        addr: StateAddress,
        row: Row,
        at_ms: i64,
    },
    Remove(StateAddress),
    RemoveNamespace {
        key: PartitionKey,
        namespace: Namespace,
    },
    RemoveKey(PartitionKey),
}

// ---------------------------------------------------------------------------
// StateBackend
// ---------------------------------------------------------------------------

/// Storage beneath the state facade.
///
/// Failures surface as `StateAccess` errors; the facade never retries.
#[async_trait]
pub trait StateBackend: Send + Sync {
    async fn get(&self, addr: &StateAddress) -> CoreResult<Option<StoredEntry>>;

    /// Apply `ops` in order. Implementations must apply all of them or none.
    async fn commit(&self, ops: Vec<StagedOp>) -> CoreResult<()>;

    /// Delete the entry if it is TTL-expired at `now_ms`. Returns whether it was removed.
    async fn remove_if_expired(&self, addr: &StateAddress, now_ms: i64) -> CoreResult<bool>;

    async fn has_entries(&self, key: &PartitionKey) -> CoreResult<bool>;

    /// Reclaim every TTL-expired entry. Returns the number removed.
    async fn sweep(&self, now_ms: i64) -> CoreResult<usize>;
}

// ---------------------------------------------------------------------------
// MemoryBackend
// ---------------------------------------------------------------------------

type KeyEntries = BTreeMap<(Namespace, String), StoredEntry>;

/// In-process backend. A commit is applied under a single lock acquisition.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<PartitionKey, KeyEntries>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored entries across all keys.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.values().map(BTreeMap::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl StateBackend for MemoryBackend {
    async fn get(&self, addr: &StateAddress) -> CoreResult<Option<StoredEntry>> {
        let guard = self.entries.lock().await;
        Ok(guard
            .get(&addr.key)
            .and_then(|m| m.get(&(addr.namespace, addr.name.clone())))
            .cloned())
    }

    async fn commit(&self, ops: Vec<StagedOp>) -> CoreResult<()> {
        let mut guard = self.entries.lock().await;
        for op in ops {
            match op {
                StagedOp::Put { addr, entry } => {
                    guard
                        .entry(addr.key)
                        .or_default()
                        .insert((addr.namespace, addr.name), entry);
                }
                StagedOp::Append { addr, row, at_ms } => {
                    let slot = guard
                        .entry(addr.key)
                        .or_default()
                        .entry((addr.namespace, addr.name))
                        .or_insert_with(|| StoredEntry {
                            value: StateValue::List(Vec::new()),
                            last_write_ms: at_ms,
                            ttl_ms: None,
                        });
                    slot.value.push_row(row);
                    slot.last_write_ms = at_ms;
                }
                StagedOp::Remove(addr) => {
                    if let Some(m) = guard.get_mut(&addr.key) {
                        m.remove(&(addr.namespace, addr.name));
                        if m.is_empty() {
                            guard.remove(&addr.key);
                        }
                    }
                }
                StagedOp::RemoveNamespace { key, namespace } => {
                    if let Some(m) = guard.get_mut(&key) {
                        m.retain(|(ns, _), _| *ns != namespace);
                        if m.is_empty() {
                            guard.remove(&key);
                        }
                    }
                }
                StagedOp::RemoveKey(key) => {
                    guard.remove(&key);
                }
            }
        }
        Ok(())
    }

    async fn remove_if_expired(&self, addr: &StateAddress, now_ms: i64) -> CoreResult<bool> {
        let mut guard = self.entries.lock().await;
        let Some(m) = guard.get_mut(&addr.key) else {
            return Ok(false);
        };
        let slot = (addr.namespace, addr.name.clone());
        let expired = m.get(&slot).is_some_and(|e| e.is_expired(now_ms));
        if expired {
            m.remove(&slot);
            if m.is_empty() {
                guard.remove(&addr.key);
            }
        }
        Ok(expired)
    }

    async fn has_entries(&self, key: &PartitionKey) -> CoreResult<bool> {
        Ok(self
            .entries
            .lock()
            .await
            .get(key)
            .is_some_and(|m| !m.is_empty()))
    }

    async fn sweep(&self, now_ms: i64) -> CoreResult<usize> {
        let mut guard = self.entries.lock().await;
        let mut removed = 0;
        guard.retain(|_, m| {
            let before = m.len();
            m.retain(|_, e| !e.is_expired(now_ms));
            removed += before - m.len();
            !m.is_empty()
        });
        Ok(removed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
