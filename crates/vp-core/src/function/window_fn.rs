use async_trait::async_trait;

use super::collector::Collector;
use super::context::WindowContext;
use crate::error::CoreResult;
use crate::partition::{FunctionDescriptor, PartitionKey};
use crate::row::Row;
use crate::window::TimeWindow;

/// What a single `process` invocation is fed.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowInput {
    /// Incremental mode: one element accepted into the window.
    Element(Row),
    /// Buffered mode: the window fired; every element it holds, in arrival
    /// order.
    Fire(Vec<Row>),
    /// Incremental mode: the window fired. Carries no element.
    FireSignal,
}

/// User-defined function evaluated per `(key, window)`.
///
/// Both methods may suspend on state access. Their state writes and outputs
/// take effect only if the invocation returns `Ok`.
#[async_trait]
pub trait AsyncWindowFunction: Send + Sync {
    fn descriptor(&self) -> &FunctionDescriptor;

    async fn process(
        &self,
        key: &PartitionKey,
        window: TimeWindow,
        ctx: &mut WindowContext<'_>,
        input: WindowInput,
        out: &mut Collector,
    ) -> CoreResult<()>;

    /// Called exactly once when the window expires. Must not emit.
    async fn clear(&self, window: TimeWindow, ctx: &mut WindowContext<'_>) -> CoreResult<()>;
}
