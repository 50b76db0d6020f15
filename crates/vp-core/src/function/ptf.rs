use async_trait::async_trait;

use super::collector::Collector;
use super::context::PtfContext;
use crate::error::CoreResult;
use crate::partition::FunctionDescriptor;
use crate::row::Row;

/// Partitioned stateful table function, invoked once per input row of its
/// partition.
#[async_trait]
pub trait ProcessTableFunction: Send + Sync {
    fn descriptor(&self) -> &FunctionDescriptor;

    async fn eval(
        &self,
        ctx: &mut PtfContext<'_>,
        input: Row,
        out: &mut Collector,
    ) -> CoreResult<()>;
}
