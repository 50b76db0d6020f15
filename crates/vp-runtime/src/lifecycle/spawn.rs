use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;

use vp_core::processor::Operator;
use vp_core::sink::{OutputRecord, OutputSink};

use crate::input::PipelineEvent;
use crate::metrics::EngineMetrics;
use crate::output_task;
use crate::scheduler::{Scheduler, SchedulerSettings};
use crate::sweeper_task;

use super::types::TaskGroup;

/// Spawn the output writer. Returns (output_tx, task_group).
pub(super) fn spawn_output_task(
    sink: Arc<dyn OutputSink>,
) -> (mpsc::Sender<OutputRecord>, TaskGroup) {
    let (output_tx, output_rx) = mpsc::channel(output_task::OUTPUT_CHANNEL_CAPACITY);
    let mut group = TaskGroup::new("output");
    group.push(tokio::spawn(async move {
        output_task::run_output_writer(output_rx, sink).await;
        Ok(())
    }));
    (output_tx, group)
}

/// Spawn the periodic TTL sweeper.
pub(super) fn spawn_sweeper_task(
    operator: &Arc<dyn Operator>,
    metrics: &Arc<EngineMetrics>,
    interval: Duration,
    swept: Arc<Notify>,
    cancel: CancellationToken,
) -> TaskGroup {
    let operator = Arc::clone(operator);
    let metrics = Arc::clone(metrics);
    let mut group = TaskGroup::new("sweeper");
    group.push(tokio::spawn(async move {
        sweeper_task::run_sweeper(operator, metrics, interval, swept, cancel).await;
        Ok(())
    }));
    group
}

/// Spawn the scheduler. Returns (input_tx, task_group).
///
/// The scheduler takes the only long-lived `output_tx`; the output channel
/// closes once it and its workers have finished.
pub(super) fn spawn_scheduler_task(
    operator: Arc<dyn Operator>,
    settings: SchedulerSettings,
    input_capacity: usize,
    output_tx: mpsc::Sender<OutputRecord>,
    metrics: Arc<EngineMetrics>,
    swept: Arc<Notify>,
    cancel: CancellationToken,
) -> (mpsc::Sender<PipelineEvent>, TaskGroup) {
    let (input_tx, input_rx) = mpsc::channel(input_capacity.max(1));
    let scheduler =
        Scheduler::new(operator, settings, output_tx, metrics).with_sweep_signal(swept);
    let mut group = TaskGroup::new("scheduler");
    group.push(tokio::spawn(scheduler.run(input_rx, cancel)));
    (input_tx, group)
}
