use tokio::task::JoinHandle;

use orion_error::prelude::*;

use crate::error::{RuntimeReason, RuntimeResult};

/// A named group of tasks that are shut down together.
///
/// Groups are assembled in start order and joined in reverse:
///
///   start:  output → sweeper → scheduler
///   join:   scheduler → sweeper → output
///
/// The scheduler drains its workers before the output writer is joined, so
/// every committed record reaches the sink.
pub(crate) struct TaskGroup {
    pub(super) name: &'static str,
    handles: Vec<JoinHandle<RuntimeResult<()>>>,
}

impl TaskGroup {
    pub(super) fn new(name: &'static str) -> Self {
        Self {
            name,
            handles: Vec::new(),
        }
    }

    pub(super) fn push(&mut self, handle: JoinHandle<RuntimeResult<()>>) {
        self.handles.push(handle);
    }

    /// Join all tasks in this group, returning the first error.
    pub(super) async fn wait(self) -> RuntimeResult<()> {
        let mut first_err = None;
        for handle in self.handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => StructError::from(RuntimeReason::Shutdown)
                    .with_detail(format!("task join error: {e}"))
                    .err(),
            };
            if let Err(e) = result
                && first_err.is_none()
            {
                first_err = Some(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
