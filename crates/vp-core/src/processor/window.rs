use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use orion_error::prelude::*;
use vp_config::{FiringMode, LatePolicy, WindowConfig};

use super::{InvocationOutput, KeyedProcessor, MAIN_CHANNEL, Operator, ProcessReport};
use crate::clock::Clock;
use crate::error::{CoreReason, CoreResult};
use crate::function::context::SideChannels;
use crate::function::{AsyncWindowFunction, Collector, WindowContext, WindowInput};
use crate::partition::{ArgumentKind, KeySelector, LATE_DATA_TAG, PartitionKey, TableSemantics};
use crate::row::{Element, Row, RowSchema};
use crate::state::{KeyedState, Namespace, StateBackend, StateStore};
use crate::window::{ElementDecision, TimeWindow, WindowAction, WindowAssigner, WindowLifecycle};

// ---------------------------------------------------------------------------
// WindowOperator
// ---------------------------------------------------------------------------

struct WindowShared {
    name: String,
    function: Arc<dyn AsyncWindowFunction>,
    semantics: TableSemantics,
    selector: KeySelector,
    assigner: WindowAssigner,
    allowed_lateness: i64,
    late_policy: LatePolicy,
    firing: FiringMode,
    store: StateStore,
}

/// Windowed aggregation: one [`WindowProcessor`] per partition key.
pub struct WindowOperator {
    shared: Arc<WindowShared>,
}

impl WindowOperator {
    /// Bind `function` to a window definition, partitioning its first table
    /// argument by `partition_by`.
    pub fn new(
        config: &WindowConfig,
        function: Arc<dyn AsyncWindowFunction>,
        partition_by: &[&str],
        backend: Arc<dyn StateBackend>,
        clock: Arc<dyn Clock>,
    ) -> CoreResult<Self> {
        let descriptor = function.descriptor();
        let Some(arg) = descriptor.table_args.first() else {
            return StructError::from(CoreReason::WindowConfig)
                .with_detail(format!("function {:?} declares no table argument", descriptor.name))
                .err();
        };
        if arg.kind == ArgumentKind::Row {
            return StructError::from(CoreReason::Partition)
                .with_detail(format!(
                    "window function {:?} needs a set-semantics argument",
                    descriptor.name
                ))
                .err();
        }
        let semantics = descriptor.bind(&arg.name, partition_by)?;
        let assigner = WindowAssigner::from_spec(&config.assigner)?;
        let store = StateStore::new(backend, descriptor.state_decls()?, clock);

        Ok(Self {
            shared: Arc::new(WindowShared {
                name: config.name.clone(),
                selector: semantics.key_selector(),
                semantics,
                function,
                assigner,
                allowed_lateness: config.allowed_lateness.as_millis_i64(),
                late_policy: config.late_policy,
                firing: config.firing,
                store,
            }),
        })
    }
}

impl Operator for WindowOperator {
    fn name(&self) -> &str {
        &self.shared.name
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
            LATE_DATA_TAG => Some(self.shared.semantics.data_type()),
            tag => descriptor.side_output(tag).map(|t| &t.schema),
        }
    }

    fn state_store(&self) -> &StateStore {
        &self.shared.store
    }

    fn create_processor(&self, key: PartitionKey) -> Box<dyn KeyedProcessor> {
        Box::new(WindowProcessor {
            key,
            lifecycle: WindowLifecycle::new(self.shared.allowed_lateness),
            shared: Arc::clone(&self.shared),
        })
    }
}

// ---------------------------------------------------------------------------
// WindowProcessor
// ---------------------------------------------------------------------------

/// Windows of a single key.
///
/// Every command runs against one staged [`KeyedState`] that is committed
/// only after all of its invocations succeed. On failure the lifecycle is
/// rolled back too, so the command can be replayed.
pub struct WindowProcessor {
    key: PartitionKey,
    shared: Arc<WindowShared>,
    lifecycle: WindowLifecycle,
}

impl WindowProcessor {
    pub fn watermark(&self) -> i64 {
        self.lifecycle.watermark()
    }

    async fn handle_element(&mut self, ts: i64, row: Row) -> CoreResult<ProcessReport> {
        let shared = Arc::clone(&self.shared);
        let mut state = shared.store.begin(self.key.clone());
        let mut report = ProcessReport::default();

        for window in shared.assigner.assign_windows(ts)? {
            let decision = self.lifecycle.on_element(window);
            if decision == ElementDecision::DropLate {
                self.late(window, ts, &row, &mut report);
                continue;
            }
            match shared.firing {
                FiringMode::Buffered => state.buffer_element(window, row.clone()).await?,
                FiringMode::Incremental => {
                    self.invoke(&mut state, window, WindowInput::Element(row.clone()), &mut report)
                        .await?
                }
            }
            if decision == ElementDecision::AcceptAndFire {
                self.fire(&mut state, window, &mut report).await?;
            }
        }

        state.commit().await?;
        Ok(report)
    }

    async fn handle_actions(&self, actions: Vec<WindowAction>) -> CoreResult<ProcessReport> {
        let mut state = self.shared.store.begin(self.key.clone());
        let mut report = ProcessReport::default();
        for action in actions {
            match action {
                WindowAction::Fire(window) => self.fire(&mut state, window, &mut report).await?,
                WindowAction::Expire(window) => self.expire(&mut state, window, &mut report).await?,
            }
        }
        state.commit().await?;
        Ok(report)
    }

    async fn fire(
        &self,
        state: &mut KeyedState,
        window: TimeWindow,
        report: &mut ProcessReport,
    ) -> CoreResult<()> {
        let input = match self.shared.firing {
            FiringMode::Buffered => WindowInput::Fire(state.buffered_elements(window).await?),
            FiringMode::Incremental => WindowInput::FireSignal,
        };
        report.fired += 1;
        self.invoke(state, window, input, report).await
    }

    async fn invoke(
        &self,
        state: &mut KeyedState,
        window: TimeWindow,
        input: WindowInput,
        report: &mut ProcessReport,
    ) -> CoreResult<()> {
        let function = &self.shared.function;
        let tags = &function.descriptor().side_outputs;
        let mut ctx = WindowContext::new(window, self.watermark(), state, SideChannels::open(tags));
        let mut out = Collector::new();
        function
            .process(&self.key, window, &mut ctx, input, &mut out)
            .await?;
        report.invocations += 1;
        report.outputs.push(InvocationOutput {
            window: Some(window),
            main: out.into_rows(),
            side: ctx.into_side(),
        });
        Ok(())
    }

    async fn expire(
        &self,
        state: &mut KeyedState,
        window: TimeWindow,
        report: &mut ProcessReport,
    ) -> CoreResult<()> {
        {
            let mut ctx =
                WindowContext::new(window, self.watermark(), state, SideChannels::closed());
            self.shared.function.clear(window, &mut ctx).await?;
        }
        // Whatever the function left behind goes with the window.
        state.clear_namespace(Namespace::Window(window)).await?;
        report.invocations += 1;
        report.cleared += 1;
        Ok(())
    }

    fn late(&self, window: TimeWindow, ts: i64, row: &Row, report: &mut ProcessReport) {
        match self.shared.late_policy {
            LatePolicy::Drop => {
                tracing::debug!(
                    domain = "pipe",
                    key = %self.key,
                    %window,
                    ts,
                    watermark = self.watermark(),
                    "late element dropped"
                );
                report.dropped_late += 1;
            }
            LatePolicy::SideOutput => {
                report.late_side_output += 1;
                report.outputs.push(InvocationOutput {
                    window: Some(window),
                    main: Vec::new(),
                    side: BTreeMap::from([(LATE_DATA_TAG.to_string(), vec![row.clone()])]),
                });
            }
        }
    }
}

#[async_trait]
impl KeyedProcessor for WindowProcessor {
    fn key(&self) -> &PartitionKey {
        &self.key
    }

    async fn on_element(&mut self, element: Element) -> CoreResult<ProcessReport> {
        let Some(ts) = element.timestamp else {
            return StructError::from(CoreReason::DataFormat)
                .with_detail(format!("element for key {} has no event timestamp", self.key))
                .err();
        };
        let snapshot = self.lifecycle.clone();
        let result = self.handle_element(ts, element.row).await;
        if result.is_err() {
            self.lifecycle = snapshot;
        }
        result
    }

    async fn on_watermark(&mut self, watermark: i64) -> CoreResult<ProcessReport> {
        if watermark <= self.lifecycle.watermark() {
            tracing::debug!(
                domain = "pipe",
                key = %self.key,
                watermark,
                current = self.lifecycle.watermark(),
                "non-advancing watermark ignored"
            );
            return Ok(ProcessReport::default());
        }
        let snapshot = self.lifecycle.clone();
        let actions = self.lifecycle.advance_watermark(watermark);
        let result = self.handle_actions(actions).await;
        if result.is_err() {
            self.lifecycle = snapshot;
        }
        result
    }

    async fn is_idle(&self) -> CoreResult<bool> {
        if !self.lifecycle.is_empty() {
            return Ok(false);
        }
        Ok(!self.shared.store.has_entries(&self.key).await?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use vp_config::{AssignerSpec, HumanDuration};

    use super::*;
    use crate::clock::ManualClock;
    use crate::function::CountWindowFunction;
    use crate::partition::{FunctionDescriptor, OutputTag};
    use crate::row::Value;
    use crate::state::{MemoryBackend, StagedOp, StateAddress, StoredEntry};

    fn ms(v: u64) -> HumanDuration {
        HumanDuration::from(Duration::from_millis(v))
    }

    fn tumbling(lateness: u64, firing: FiringMode, late_policy: LatePolicy) -> WindowConfig {
        WindowConfig {
            name: "w".into(),
            assigner: AssignerSpec::Tumbling {
                size: ms(10),
                offset: ms(0),
            },
            allowed_lateness: ms(lateness),
            late_policy,
            firing,
        }
    }

    fn input() -> RowSchema {
        RowSchema::parse_decl("user:str, v:int").unwrap()
    }

    fn element(ts: i64, user: &str) -> Element {
        Element::new(
            ts,
            Row::new(vec![Some(Value::Str(user.into())), Some(Value::Int(ts))]),
        )
    }

    fn counts(report: &ProcessReport) -> Vec<i64> {
        report
            .main_rows()
            .filter_map(|r| r.get(0).and_then(Value::as_i64))
            .collect()
    }

    fn operator(config: &WindowConfig, backend: Arc<dyn StateBackend>) -> WindowOperator {
        WindowOperator::new(
            config,
            Arc::new(CountWindowFunction::new(input())),
            &["user"],
            backend,
            Arc::new(ManualClock::new(0)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn buffered_fires_once_with_all_elements_then_clears() {
        let backend = Arc::new(MemoryBackend::new());
        let op = operator(&tumbling(0, FiringMode::Buffered, LatePolicy::Drop), backend.clone());
        let mut p = op.create_processor(PartitionKey::from("a"));

        for ts in [1, 3, 9] {
            let report = p.on_element(element(ts, "a")).await.unwrap();
            assert_eq!(report.invocations, 0);
        }
        assert!(!backend.is_empty().await);

        let report = p.on_watermark(10).await.unwrap();
        assert_eq!(report.fired, 1);
        assert_eq!(report.cleared, 1);
        assert_eq!(report.invocations, 2);
        assert_eq!(counts(&report), vec![3]);
        assert_eq!(report.outputs[0].window, Some(TimeWindow::new(0, 10)));

        assert!(backend.is_empty().await);
        assert!(p.is_idle().await.unwrap());
    }

    #[tokio::test]
    async fn incremental_processes_each_element_then_signals() {
        let backend = Arc::new(MemoryBackend::new());
        let op = operator(&tumbling(0, FiringMode::Incremental, LatePolicy::Drop), backend.clone());
        let mut p = op.create_processor(PartitionKey::from("a"));

        for ts in [1, 3, 9] {
            let report = p.on_element(element(ts, "a")).await.unwrap();
            assert_eq!(report.invocations, 1);
            assert!(report.main_rows().next().is_none());
        }

        let report = p.on_watermark(10).await.unwrap();
        assert_eq!((report.fired, report.cleared), (1, 1));
        assert_eq!(counts(&report), vec![3]);
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn element_after_expiry_is_dropped() {
        let backend = Arc::new(MemoryBackend::new());
        let op = operator(&tumbling(0, FiringMode::Buffered, LatePolicy::Drop), backend.clone());
        let mut p = op.create_processor(PartitionKey::from("a"));

        p.on_element(element(1, "a")).await.unwrap();
        p.on_watermark(11).await.unwrap();

        let report = p.on_element(element(2, "a")).await.unwrap();
        assert_eq!(report.dropped_late, 1);
        assert_eq!(report.invocations, 0);
        assert!(report.outputs.is_empty());
        assert!(backend.is_empty().await);
        assert!(p.is_idle().await.unwrap());
    }

    #[tokio::test]
    async fn late_element_goes_to_side_channel() {
        let op = operator(
            &tumbling(0, FiringMode::Buffered, LatePolicy::SideOutput),
            Arc::new(MemoryBackend::new()),
        );
        let mut p = op.create_processor(PartitionKey::from("a"));
        p.on_watermark(20).await.unwrap();

        let late = element(2, "a");
        let report = p.on_element(late.clone()).await.unwrap();
        assert_eq!(report.late_side_output, 1);
        assert_eq!(report.side_rows(LATE_DATA_TAG).collect::<Vec<_>>(), vec![&late.row]);
        assert_eq!(op.channel_schema(LATE_DATA_TAG), Some(&input()));
    }

    #[tokio::test]
    async fn element_within_lateness_refires_window() {
        let backend = Arc::new(MemoryBackend::new());
        let op = operator(&tumbling(5, FiringMode::Buffered, LatePolicy::Drop), backend.clone());
        let mut p = op.create_processor(PartitionKey::from("a"));

        p.on_element(element(1, "a")).await.unwrap();
        let report = p.on_watermark(10).await.unwrap();
        assert_eq!((report.fired, report.cleared), (1, 0));
        assert_eq!(counts(&report), vec![1]);

        let report = p.on_element(element(4, "a")).await.unwrap();
        assert_eq!(report.fired, 1);
        assert_eq!(counts(&report), vec![2]);

        // cleanup = max(end, max_timestamp + lateness) = 14
        assert_eq!(p.on_watermark(13).await.unwrap().cleared, 0);
        let report = p.on_watermark(14).await.unwrap();
        assert_eq!((report.fired, report.cleared), (0, 1));
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn duplicate_watermark_never_clears_twice() {
        let op = operator(
            &tumbling(0, FiringMode::Buffered, LatePolicy::Drop),
            Arc::new(MemoryBackend::new()),
        );
        let mut p = op.create_processor(PartitionKey::from("a"));
        p.on_element(element(1, "a")).await.unwrap();
        assert_eq!(p.on_watermark(10).await.unwrap().cleared, 1);
        assert_eq!(p.on_watermark(10).await.unwrap(), ProcessReport::default());
        assert_eq!(p.on_watermark(5).await.unwrap(), ProcessReport::default());
    }

    #[tokio::test]
    async fn sliding_window_fires_every_overlapping_window() {
        let config = WindowConfig {
            name: "s".into(),
            assigner: AssignerSpec::Sliding {
                size: ms(10),
                slide: ms(5),
                offset: ms(0),
            },
            allowed_lateness: ms(0),
            late_policy: LatePolicy::Drop,
            firing: FiringMode::Buffered,
        };
        let op = operator(&config, Arc::new(MemoryBackend::new()));
        let mut p = op.create_processor(PartitionKey::from("a"));
        p.on_element(element(7, "a")).await.unwrap();

        let report = p.on_watermark(15).await.unwrap();
        let fired: Vec<_> = report.outputs.iter().filter_map(|o| o.window).collect();
        assert_eq!(fired, vec![TimeWindow::new(0, 10), TimeWindow::new(5, 15)]);
        assert_eq!(report.cleared, 2);
    }

    #[tokio::test]
    async fn missing_timestamp_is_a_data_format_error() {
        let op = operator(
            &tumbling(0, FiringMode::Buffered, LatePolicy::Drop),
            Arc::new(MemoryBackend::new()),
        );
        let mut p = op.create_processor(PartitionKey::from("a"));
        let err = p
            .on_element(Element {
                timestamp: None,
                row: Row::single(None),
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("data format"), "got: {err}");
    }

    #[tokio::test]
    async fn timestamp_without_representable_window_is_rejected() {
        let backend = Arc::new(MemoryBackend::new());
        let op = operator(&tumbling(0, FiringMode::Buffered, LatePolicy::Drop), backend.clone());
        let mut p = op.create_processor(PartitionKey::from("a"));

        let err = p.on_element(element(i64::MAX - 3, "a")).await.unwrap_err();
        assert!(err.to_string().contains("data format"), "got: {err}");
        assert!(backend.is_empty().await);
        assert!(p.is_idle().await.unwrap());

        p.on_element(element(1, "a")).await.unwrap();
        assert_eq!(counts(&p.on_watermark(10).await.unwrap()), vec![1]);
    }

    // -- failure atomicity ----------------------------------------------------

    /// Counts like the built-in but fails its first firing.
    struct FailOnceOnFire {
        inner: CountWindowFunction,
        failed: AtomicBool,
        clears: AtomicUsize,
    }

    #[async_trait]
    impl AsyncWindowFunction for FailOnceOnFire {
        fn descriptor(&self) -> &FunctionDescriptor {
            self.inner.descriptor()
        }

        async fn process(
            &self,
            key: &PartitionKey,
            window: TimeWindow,
            ctx: &mut WindowContext<'_>,
            input: WindowInput,
            out: &mut Collector,
        ) -> CoreResult<()> {
            let firing = matches!(input, WindowInput::Fire(_));
            self.inner.process(key, window, ctx, input, out).await?;
            if firing && !self.failed.swap(true, Ordering::SeqCst) {
                return StructError::from(CoreReason::UserLogic)
                    .with_detail("boom")
                    .err();
            }
            Ok(())
        }

        async fn clear(&self, window: TimeWindow, ctx: &mut WindowContext<'_>) -> CoreResult<()> {
            self.clears.fetch_add(1, Ordering::SeqCst);
            self.inner.clear(window, ctx).await
        }
    }

    #[tokio::test]
    async fn failed_firing_leaves_state_and_lifecycle_untouched() {
        let backend = Arc::new(MemoryBackend::new());
        let function = Arc::new(FailOnceOnFire {
            inner: CountWindowFunction::new(input()),
            failed: AtomicBool::new(false),
            clears: AtomicUsize::new(0),
        });
        let op = WindowOperator::new(
            &tumbling(0, FiringMode::Buffered, LatePolicy::Drop),
            function.clone(),
            &["user"],
            backend.clone(),
            Arc::new(ManualClock::new(0)),
        )
        .unwrap();
        let mut p = op.create_processor(PartitionKey::from("a"));
        p.on_element(element(1, "a")).await.unwrap();
        p.on_element(element(2, "a")).await.unwrap();

        let err = p.on_watermark(10).await.unwrap_err();
        assert!(err.to_string().contains("user logic"), "got: {err}");
        assert_eq!(function.clears.load(Ordering::SeqCst), 0);
        assert_eq!(backend.len().await, 1);

        // Replaying the watermark sees the same buffered window.
        let report = p.on_watermark(10).await.unwrap();
        assert_eq!(counts(&report), vec![2]);
        assert_eq!(function.clears.load(Ordering::SeqCst), 1);
        assert!(backend.is_empty().await);
    }

    /// Backend whose commits can be switched to fail.
    #[derive(Default)]
    struct FlakyBackend {
        inner: MemoryBackend,
        fail_commits: AtomicBool,
    }

    #[async_trait]
    impl StateBackend for FlakyBackend {
        async fn get(&self, addr: &StateAddress) -> CoreResult<Option<StoredEntry>> {
            self.inner.get(addr).await
        }

        async fn commit(&self, ops: Vec<StagedOp>) -> CoreResult<()> {
            if self.fail_commits.load(Ordering::SeqCst) {
                return StructError::from(CoreReason::StateAccess)
                    .with_detail("backend unavailable")
                    .err();
            }
            self.inner.commit(ops).await
        }

        async fn remove_if_expired(&self, addr: &StateAddress, now_ms: i64) -> CoreResult<bool> {
            self.inner.remove_if_expired(addr, now_ms).await
        }

        async fn has_entries(&self, key: &PartitionKey) -> CoreResult<bool> {
            self.inner.has_entries(key).await
        }

        async fn sweep(&self, now_ms: i64) -> CoreResult<usize> {
            self.inner.sweep(now_ms).await
        }
    }

    #[tokio::test]
    async fn failed_commit_discards_outputs_and_window() {
        let backend = Arc::new(FlakyBackend::default());
        let op = operator(&tumbling(0, FiringMode::Incremental, LatePolicy::Drop), backend.clone());
        let mut p = op.create_processor(PartitionKey::from("a"));

        backend.fail_commits.store(true, Ordering::SeqCst);
        assert!(p.on_element(element(1, "a")).await.is_err());
        assert!(p.is_idle().await.unwrap());

        backend.fail_commits.store(false, Ordering::SeqCst);
        p.on_element(element(3, "a")).await.unwrap();
        let report = p.on_watermark(10).await.unwrap();
        assert_eq!(counts(&report), vec![1]);
    }

    // -- side outputs -----------------------------------------------------------

    struct Audited {
        descriptor: FunctionDescriptor,
    }

    impl Audited {
        fn new() -> Self {
            let descriptor = FunctionDescriptor::new("audited", input())
                .with_table_arg(
                    "input",
                    ArgumentKind::Set {
                        optional_partition: false,
                    },
                    input(),
                )
                .with_side_output(OutputTag::new("audit", input()));
            Self { descriptor }
        }
    }

    #[async_trait]
    impl AsyncWindowFunction for Audited {
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
            if let WindowInput::Fire(rows) = input {
                for row in rows {
                    ctx.output("audit", row.clone())?;
                    out.collect(Some(row));
                }
            }
            Ok(())
        }

        async fn clear(&self, _window: TimeWindow, ctx: &mut WindowContext<'_>) -> CoreResult<()> {
            // Emitting from clear is rejected.
            assert!(ctx.output("audit", Row::single(None)).is_err());
            assert!(ctx.output("nope", Row::single(None)).is_err());
            Ok(())
        }
    }

    #[tokio::test]
    async fn declared_side_output_is_reported_separately() {
        let op = WindowOperator::new(
            &tumbling(0, FiringMode::Buffered, LatePolicy::Drop),
            Arc::new(Audited::new()),
            &["user"],
            Arc::new(MemoryBackend::new()),
            Arc::new(ManualClock::new(0)),
        )
        .unwrap();
        let mut p = op.create_processor(PartitionKey::from("a"));
        p.on_element(element(1, "a")).await.unwrap();
        p.on_element(element(2, "a")).await.unwrap();

        let report = p.on_watermark(10).await.unwrap();
        assert_eq!(report.main_rows().count(), 2);
        assert_eq!(report.side_rows("audit").count(), 2);
        assert_eq!(op.channel_schema("audit"), Some(&input()));
        assert_eq!(op.channel_schema("missing"), None);
    }

    #[test]
    fn window_function_requires_set_semantics_argument() {
        let descriptor = FunctionDescriptor::new("rows", input()).with_table_arg(
            "input",
            ArgumentKind::Row,
            input(),
        );
        struct RowFn(FunctionDescriptor);
        #[async_trait]
        impl AsyncWindowFunction for RowFn {
            fn descriptor(&self) -> &FunctionDescriptor {
                &self.0
            }
            async fn process(
                &self,
                _: &PartitionKey,
                _: TimeWindow,
                _: &mut WindowContext<'_>,
                _: WindowInput,
                _: &mut Collector,
            ) -> CoreResult<()> {
                Ok(())
            }
            async fn clear(&self, _: TimeWindow, _: &mut WindowContext<'_>) -> CoreResult<()> {
                Ok(())
            }
        }
        let result = WindowOperator::new(
            &tumbling(0, FiringMode::Buffered, LatePolicy::Drop),
            Arc::new(RowFn(descriptor)),
            &[],
            Arc::new(MemoryBackend::new()),
            Arc::new(ManualClock::new(0)),
        );
        assert!(result.is_err());
    }
}
