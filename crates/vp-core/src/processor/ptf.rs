use std::sync::Arc;

use async_trait::async_trait;

use super::{InvocationOutput, KeyedProcessor, MAIN_CHANNEL, Operator, ProcessReport};
use crate::clock::Clock;
use crate::error::CoreResult;
use crate::function::context::SideChannels;
use crate::function::{Collector, ProcessTableFunction, PtfContext};
use crate::partition::{KeySelector, PartitionKey, TableSemantics};
use crate::row::{Element, RowSchema};
use crate::state::{StateBackend, StateStore};

struct PtfShared {
    function: Arc<dyn ProcessTableFunction>,
    semantics: TableSemantics,
    selector: KeySelector,
    store: StateStore,
}

/// Partitioned table function: one [`PtfProcessor`] per partition key.
pub struct PtfOperator {
    shared: Arc<PtfShared>,
}

impl PtfOperator {
    pub fn new(
        function: Arc<dyn ProcessTableFunction>,
        arg: &str,
        partition_by: &[&str],
        backend: Arc<dyn StateBackend>,
        clock: Arc<dyn Clock>,
    ) -> CoreResult<Self> {
        let descriptor = function.descriptor();
        let semantics = descriptor.bind(arg, partition_by)?;
        let store = StateStore::new(backend, descriptor.state_decls()?, clock);
        Ok(Self {
            shared: Arc::new(PtfShared {
                selector: semantics.key_selector(),
                semantics,
                function,
                store,
            }),
        })
    }

    pub fn semantics(&self) -> &TableSemantics {
        &self.shared.semantics
    }
}

impl Operator for PtfOperator {
    fn name(&self) -> &str {
        &self.shared.function.descriptor().name
    }

    fn input_schema(&self) -> &RowSchema {
        self.shared.semantics.data_type()
    }

    fn key_selector(&self) -> &KeySelector {
        &self.shared.selector
    }

    fn channel_schema(&self, channel: &str) -> Option<&RowSchema> {
        let descriptor = self.shared.function.descriptor();
        match channel {
            MAIN_CHANNEL => Some(&descriptor.output),
            tag => descriptor.side_output(tag).map(|t| &t.schema),
        }
    }

    fn state_store(&self) -> &StateStore {
        &self.shared.store
    }

    fn create_processor(&self, key: PartitionKey) -> Box<dyn KeyedProcessor> {
        Box::new(PtfProcessor {
            key,
            shared: Arc::clone(&self.shared),
            watermark: i64::MIN,
        })
    }
}

/// State and clock view of one partition of a table function.
pub struct PtfProcessor {
    key: PartitionKey,
    shared: Arc<PtfShared>,
    watermark: i64,
}

#[async_trait]
impl KeyedProcessor for PtfProcessor {
    fn key(&self) -> &PartitionKey {
        &self.key
    }

    async fn on_element(&mut self, element: Element) -> CoreResult<ProcessReport> {
        let shared = &*self.shared;
        let mut state = shared.store.begin(self.key.clone());
        let mut out = Collector::new();
        let tags = &shared.function.descriptor().side_outputs;

        let mut ctx = PtfContext::new(
            &shared.semantics,
            self.watermark,
            &mut state,
            SideChannels::open(tags),
        );
        shared.function.eval(&mut ctx, element.row, &mut out).await?;
        let side = ctx.finish().await?;
        state.commit().await?;

        Ok(ProcessReport {
            outputs: vec![InvocationOutput {
                window: None,
                main: out.into_rows(),
                side,
            }],
            invocations: 1,
            ..ProcessReport::default()
        })
    }

    async fn on_watermark(&mut self, watermark: i64) -> CoreResult<ProcessReport> {
        self.watermark = self.watermark.max(watermark);
        Ok(ProcessReport::default())
    }

    async fn is_idle(&self) -> CoreResult<bool> {
        Ok(!self.shared.store.has_entries(&self.key).await?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use orion_error::prelude::*;

    use super::*;
    use crate::clock::ManualClock;
    use crate::error::CoreReason;
    use crate::function::RunningCountFunction;
    use crate::partition::{ArgumentKind, FunctionDescriptor};
    use crate::row::{Row, Value};
    use crate::state::{MemoryBackend, StateDecl};

    fn input() -> RowSchema {
        RowSchema::parse_decl("region:str, amount:int").unwrap()
    }

    fn row(region: &str, amount: i64) -> Row {
        Row::new(vec![Some(Value::Str(region.into())), Some(Value::Int(amount))])
    }

    fn last_count(report: &ProcessReport) -> Option<i64> {
        report.main_rows().last().and_then(|r| r.get(0)).and_then(Value::as_i64)
    }

    #[tokio::test]
    async fn partitions_keep_separate_counters() {
        let op = PtfOperator::new(
            Arc::new(RunningCountFunction::new(input())),
            "input",
            &["region"],
            Arc::new(MemoryBackend::new()),
            Arc::new(ManualClock::new(0)),
        )
        .unwrap();

        let mut east = op.create_processor(PartitionKey::from("east"));
        let mut west = op.create_processor(PartitionKey::from("west"));
        let mut seen = Vec::new();
        for (region, amount) in [("east", 1), ("west", 2), ("east", 3), ("east", 4), ("west", 5)] {
            let r = row(region, amount);
            assert_eq!(op.key_selector().select(&r), PartitionKey::from(region));
            let p = if region == "east" { &mut east } else { &mut west };
            let report = p.on_element(Element::new(0, r)).await.unwrap();
            seen.push((region, last_count(&report)));
        }
        assert_eq!(
            seen,
            vec![
                ("east", Some(1)),
                ("west", Some(1)),
                ("east", Some(2)),
                ("east", Some(3)),
                ("west", Some(2)),
            ]
        );
    }

    #[tokio::test]
    async fn optional_partition_collapses_to_global_key() {
        let op = PtfOperator::new(
            Arc::new(RunningCountFunction::new(input())),
            "input",
            &[],
            Arc::new(MemoryBackend::new()),
            Arc::new(ManualClock::new(0)),
        )
        .unwrap();
        assert!(op.key_selector().select(&row("east", 1)).is_global());
        assert!(op.semantics().partition_by_columns().is_empty());
    }

    /// Records the amount, then clears on a zero amount.
    struct ResetOnZero {
        descriptor: FunctionDescriptor,
    }

    impl ResetOnZero {
        fn new() -> Self {
            let state = RowSchema::parse_decl("last:int").unwrap();
            Self {
                descriptor: FunctionDescriptor::new("reset", state.clone())
                    .with_table_arg(
                        "input",
                        ArgumentKind::Set {
                            optional_partition: false,
                        },
                        input(),
                    )
                    .with_state(StateDecl::new("last", state.clone()))
                    .with_state(StateDecl::new("seen", state)),
            }
        }
    }

    #[async_trait]
    impl ProcessTableFunction for ResetOnZero {
        fn descriptor(&self) -> &FunctionDescriptor {
            &self.descriptor
        }

        async fn eval(
            &self,
            ctx: &mut PtfContext<'_>,
            input: Row,
            out: &mut Collector,
        ) -> CoreResult<()> {
            let sem = ctx.table_semantics_for("input")?;
            assert_eq!(sem.partition_by_columns(), &[0]);
            assert!(ctx.table_semantics_for("other").is_err());

            let amount = input.get(1).and_then(Value::as_i64).unwrap_or(0);
            let previous = ctx.state("last").get().await?;
            ctx.state("last").put(Row::single(Some(Value::Int(amount)))).await?;
            ctx.state("seen").put(Row::single(Some(Value::Int(1)))).await?;
            if amount < 0 {
                return StructError::from(CoreReason::UserLogic)
                    .with_detail("negative amount")
                    .err();
            }
            if amount == 0 {
                // Applied after the writes above.
                ctx.clear_all_state();
            }
            out.collect(previous);
            Ok(())
        }
    }

    #[tokio::test]
    async fn clears_apply_after_eval_and_failures_discard_writes() {
        let op = PtfOperator::new(
            Arc::new(ResetOnZero::new()),
            "input",
            &["region"],
            Arc::new(MemoryBackend::new()),
            Arc::new(ManualClock::new(0)),
        )
        .unwrap();
        let key = PartitionKey::from("east");
        let mut p = op.create_processor(key.clone());

        let report = p.on_element(Element::new(0, row("east", 5))).await.unwrap();
        assert_eq!(report.main_rows().count(), 0);
        assert!(!p.is_idle().await.unwrap());

        assert!(p.on_element(Element::new(0, row("east", -1))).await.is_err());
        let report = p.on_element(Element::new(0, row("east", 0))).await.unwrap();
        assert_eq!(last_count(&report), Some(5));

        assert!(p.is_idle().await.unwrap());
        assert_eq!(op.state_store().get_global_state(&key, "last").await.unwrap(), None);
    }
}
