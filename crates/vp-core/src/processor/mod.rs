//! Per-key execution units.
//!
//! An [`Operator`] owns everything shared by its keys (function, schemas,
//! state store) and creates one [`KeyedProcessor`] per virtual processor. A
//! processor turns each command (an element or a watermark) into function
//! invocations, commits their state changes as one unit, and reports the
//! outputs the caller may release.

mod ptf;
mod window;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::partition::{KeySelector, PartitionKey};
use crate::row::{Element, Row, RowSchema};
use crate::state::StateStore;
use crate::window::TimeWindow;

pub use ptf::{PtfOperator, PtfProcessor};
pub use window::{WindowOperator, WindowProcessor};

/// Channel name of the main result stream.
pub const MAIN_CHANNEL: &str = "main";

/// Everything one successful invocation emitted, in emission order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvocationOutput {
    pub window: Option<TimeWindow>,
    pub main: Vec<Row>,
    pub side: BTreeMap<String, Vec<Row>>,
}

impl InvocationOutput {
    pub fn is_empty(&self) -> bool {
        self.main.is_empty() && self.side.values().all(Vec::is_empty)
    }
}

/// Result of one command. Its outputs are committed and safe to forward.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessReport {
    pub outputs: Vec<InvocationOutput>,
    pub invocations: u64,
    pub fired: u64,
    pub cleared: u64,
    pub dropped_late: u64,
    pub late_side_output: u64,
}

impl ProcessReport {
    pub fn main_rows(&self) -> impl Iterator<Item = &Row> {
        self.outputs.iter().flat_map(|o| o.main.iter())
    }

    pub fn side_rows<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Row> + 'a {
        self.outputs
            .iter()
            .filter_map(move |o| o.side.get(tag))
            .flatten()
    }
}

/// One virtual processor. Commands must be delivered serially.
#[async_trait]
pub trait KeyedProcessor: Send + Sync {
    fn key(&self) -> &PartitionKey;

    async fn on_element(&mut self, element: Element) -> CoreResult<ProcessReport>;

    async fn on_watermark(&mut self, watermark: i64) -> CoreResult<ProcessReport>;

    /// No tracked windows and no stored state: safe to retire.
    async fn is_idle(&self) -> CoreResult<bool>;
}

/// Factory and shared context of the processors of one operator.
pub trait Operator: Send + Sync {
    fn name(&self) -> &str;

    fn input_schema(&self) -> &RowSchema;

    fn key_selector(&self) -> &KeySelector;

    /// Schema of an output channel: `main`, `late-data` or a declared tag.
    fn channel_schema(&self, channel: &str) -> Option<&RowSchema>;

    fn state_store(&self) -> &StateStore;

    fn create_processor(&self, key: PartitionKey) -> Box<dyn KeyedProcessor>;
}
