use super::backend::{StagedOp, StateAddress, StateValue};

/// Ordered log of mutations issued by one invocation.
///
/// Reads replay the log over the committed value so an invocation observes
/// its own writes before they reach the backend.
#[derive(Debug, Default)]
pub struct StateTxn {
    ops: Vec<StagedOp>,
}

impl StateTxn {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&mut self, op: StagedOp) {
        self.ops.push(op);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<StagedOp> {
        self.ops
    }

    /// Apply every staged op touching `addr`, in order, to `base`.
    pub fn overlay(&self, addr: &StateAddress, base: Option<StateValue>) -> Option<StateValue> {
        let mut current = base;
        for op in &self.ops {
            match op {
                StagedOp::Put { addr: a, entry } if a == addr => {
                    current = Some(entry.value.clone());
                }
                StagedOp::Append { addr: a, row, .. } if a == addr => match current.as_mut() {
                    Some(value) => value.push_row(row.clone()),
                    None => current = Some(StateValue::List(vec![row.clone()])),
                },
                StagedOp::Remove(a) if a == addr => current = None,
                StagedOp::RemoveNamespace { key, namespace }
                    if *key == addr.key && *namespace == addr.namespace =>
                {
                    current = None;
                }
                StagedOp::RemoveKey(key) if *key == addr.key => current = None,
                _ => {}
            }
        }
        current
    }
}
