use async_trait::async_trait;

use super::collector::Collector;
use super::context::{PtfContext, WindowContext};
use super::ptf::ProcessTableFunction;
use super::window_fn::{AsyncWindowFunction, WindowInput};
use crate::error::CoreResult;
use crate::partition::{ArgumentKind, FunctionDescriptor, PartitionKey};
use crate::row::{DataKind, FieldDecl, Row, RowSchema, Value};
use crate::state::StateDecl;
use crate::window::TimeWindow;

const COUNT: &str = "count";

fn count_schema() -> RowSchema {
    RowSchema::new(vec![FieldDecl::new(COUNT, DataKind::Int).required()])
}

fn count_of(row: &Row) -> i64 {
    row.get(0).and_then(Value::as_i64).unwrap_or(0)
}

fn count_row(n: i64) -> Row {
    Row::single(Some(Value::Int(n)))
}

// ---------------------------------------------------------------------------
// CountWindowFunction
// ---------------------------------------------------------------------------

/// Number of elements per `(key, window)`.
///
/// Works in both firing modes: buffered firings count the delivered rows,
/// incremental mode keeps a running `count` in window state.
pub struct CountWindowFunction {
    descriptor: FunctionDescriptor,
}

impl CountWindowFunction {
    pub fn new(input: RowSchema) -> Self {
        let descriptor = FunctionDescriptor::new("count", count_schema())
            .with_table_arg(
                "input",
                ArgumentKind::Set {
                    optional_partition: true,
                },
                input,
            )
            .with_state(StateDecl::new(COUNT, count_schema()));
        Self { descriptor }
    }
}

#[async_trait]
impl AsyncWindowFunction for CountWindowFunction {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    async fn process(
        &self,
        _key: &PartitionKey,
        _window: TimeWindow,
        ctx: &mut WindowContext<'_>,
        input: WindowInput,
        out: &mut Collector,
    ) -> CoreResult<()> {
        match input {
            WindowInput::Fire(rows) => {
                out.collect(Some(count_row(rows.len() as i64)));
            }
            WindowInput::Element(_) => {
                let mut state = ctx.window_state();
                let current = count_of(&state.get_or_empty(COUNT).await?);
                state.put(COUNT, count_row(current + 1)).await?;
            }
            WindowInput::FireSignal => {
                let current = ctx.window_state().get_or_empty(COUNT).await?;
                out.collect(Some(count_row(count_of(&current))));
            }
        }
        Ok(())
    }

    async fn clear(&self, _window: TimeWindow, ctx: &mut WindowContext<'_>) -> CoreResult<()> {
        ctx.window_state().clear(COUNT).await
    }
}

// ---------------------------------------------------------------------------
// RunningCountFunction
// ---------------------------------------------------------------------------

/// Table function emitting the running row count of each partition.
pub struct RunningCountFunction {
    descriptor: FunctionDescriptor,
}

impl RunningCountFunction {
    pub fn new(input: RowSchema) -> Self {
        Self::build(input, StateDecl::new(COUNT, count_schema()))
    }

    /// Counter that resets once it has not been written for `ttl`.
    pub fn with_ttl(input: RowSchema, ttl: &str) -> CoreResult<Self> {
        let decl = StateDecl::new(COUNT, count_schema()).with_ttl(ttl)?;
        Ok(Self::build(input, decl))
    }

    fn build(input: RowSchema, decl: StateDecl) -> Self {
        let descriptor = FunctionDescriptor::new("running_count", count_schema())
            .with_table_arg(
                "input",
                ArgumentKind::Set {
                    optional_partition: true,
                },
                input,
            )
            .with_state(decl);
        Self { descriptor }
    }
}

#[async_trait]
impl ProcessTableFunction for RunningCountFunction {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    async fn eval(
        &self,
        ctx: &mut PtfContext<'_>,
        _input: Row,
        out: &mut Collector,
    ) -> CoreResult<()> {
        let mut state = ctx.state(COUNT);
        let next = count_of(&state.get_or_empty().await?) + 1;
        state.put(count_row(next)).await?;
        out.collect(Some(count_row(next)));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
