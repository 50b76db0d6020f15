mod signal;
mod spawn;
mod types;

use std::sync::Arc;

use orion_error::op_context;
use orion_error::prelude::*;
use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;

use vp_config::EngineConfig;
use vp_core::processor::Operator;
use vp_core::sink::OutputSink;

use crate::error::{RuntimeReason, RuntimeResult};
use crate::input::PipelineEvent;
use crate::metrics::EngineMetrics;
use crate::scheduler::SchedulerSettings;

pub use signal::wait_for_signal;

use spawn::{spawn_output_task, spawn_scheduler_task, spawn_sweeper_task};
use types::TaskGroup;

/// Top-level handle of a running pipeline: one operator, its scheduler and
/// workers, the TTL sweeper and the output writer.
///
/// Input is pushed through [`input`](Self::input). The pipeline ends when the
/// input closes (every sender dropped, see [`close_input`](Self::close_input))
/// or when [`shutdown`](Self::shutdown) is requested; either way buffered
/// input is processed and committed output flushed before
/// [`wait`](Self::wait) returns.
pub struct Engine {
    cancel: CancellationToken,
    /// Stopped only after the scheduler finished.
    sweeper_cancel: CancellationToken,
    input: Option<mpsc::Sender<PipelineEvent>>,
    metrics: Arc<EngineMetrics>,
    operator_name: String,
    groups: Vec<TaskGroup>,
}

impl Engine {
    #[tracing::instrument(name = "engine.start", skip_all, fields(operator = %operator.name()))]
    pub async fn start(
        config: &EngineConfig,
        operator: Arc<dyn Operator>,
        sink: Arc<dyn OutputSink>,
    ) -> RuntimeResult<Self> {
        let mut op = op_context!("engine-bootstrap").with_auto_log();
        op.record("operator", operator.name());
        op.record("parallelism", config.runtime.parallelism.to_string().as_str());

        if config.runtime.parallelism == 0 {
            return StructError::from(RuntimeReason::Bootstrap)
                .with_detail("runtime.parallelism must be at least 1")
                .err();
        }

        let cancel = CancellationToken::new();
        let sweeper_cancel = CancellationToken::new();
        let metrics = Arc::new(EngineMetrics::new());
        let swept = Arc::new(Notify::new());

        // Start order: output → sweeper → scheduler
        let mut groups = Vec::with_capacity(3);

        let (output_tx, output_group) = spawn_output_task(sink);
        groups.push(output_group);

        groups.push(spawn_sweeper_task(
            &operator,
            &metrics,
            config.state.sweep_interval.as_duration(),
            Arc::clone(&swept),
            sweeper_cancel.child_token(),
        ));

        let operator_name = operator.name().to_string();
        let (input, scheduler_group) = spawn_scheduler_task(
            operator,
            SchedulerSettings {
                parallelism: config.runtime.parallelism,
                key_queue_capacity: config.runtime.key_queue_capacity,
            },
            config.runtime.input_capacity,
            output_tx,
            Arc::clone(&metrics),
            swept,
            cancel.child_token(),
        );
        groups.push(scheduler_group);

        vp_info!(
            sys,
            operator = %operator_name,
            parallelism = config.runtime.parallelism,
            "engine started"
        );
        op.mark_suc();
        Ok(Self {
            cancel,
            sweeper_cancel,
            input: Some(input),
            metrics,
            operator_name,
            groups,
        })
    }

    /// A sender for pipeline input, or `None` once the input was closed.
    pub fn input(&self) -> Option<mpsc::Sender<PipelineEvent>> {
        self.input.clone()
    }

    /// Push one event, waiting for channel capacity.
    pub async fn send(&self, event: PipelineEvent) -> RuntimeResult<()> {
        let Some(tx) = &self.input else {
            return StructError::from(RuntimeReason::Shutdown)
                .with_detail("engine input already closed")
                .err();
        };
        tx.send(event).await.map_err(|_| {
            StructError::from(RuntimeReason::Shutdown).with_detail("pipeline stopped")
        })
    }

    /// Drop the engine's own input sender. The pipeline drains once every
    /// other clone is dropped too.
    pub fn close_input(&mut self) {
        self.input = None;
    }

    /// Request graceful shutdown: stop reading input, drain, flush.
    pub fn shutdown(&self) {
        vp_info!(sys, "initiating graceful shutdown");
        self.cancel.cancel();
    }

    /// Root cancellation token (for signal integration).
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn metrics(&self) -> Arc<EngineMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Close the engine's input and wait for all task groups to finish.
    ///
    /// Groups are joined in reverse start order. Every group is joined even
    /// after a failure; the first error is returned.
    pub async fn wait(mut self) -> RuntimeResult<()> {
        self.input = None;
        let mut first_err = None;
        while let Some(group) = self.groups.pop() {
            let name = group.name;
            vp_debug!(sys, task_group = name, "waiting for task group to finish");
            if let Err(e) = group.wait().await {
                vp_error!(sys, task_group = name, error = %e, "task group failed");
                first_err.get_or_insert(e);
            } else {
                vp_debug!(sys, task_group = name, "task group finished");
            }
            if name == "scheduler" {
                // Workers are gone; no more state is written.
                self.sweeper_cancel.cancel();
            }
        }
        vp_info!(
            res,
            operator = %self.operator_name,
            summary = %self.metrics.summary_line(),
            "engine stopped"
        );
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
