use std::sync::Arc;

use orion_error::prelude::*;
use tokio::sync::{Notify, Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use vp_core::partition::{PartitionKey, VirtualProcessorRouter};
use vp_core::processor::Operator;
use vp_core::row::Element;
use vp_core::sink::OutputRecord;

use crate::error::{RuntimeReason, RuntimeResult};
use crate::input::PipelineEvent;
use crate::metrics::EngineMetrics;
use crate::worker::{KeyWorker, WorkerCommand, WorkerStatus};

/// Scheduler-side handle of one live key worker.
struct WorkerHandle {
    tx: mpsc::Sender<WorkerCommand>,
    /// Sequence number of the last command sent.
    sent_seq: u64,
}

impl WorkerHandle {
    fn next_seq(&mut self) -> u64 {
        self.sent_seq += 1;
        self.sent_seq
    }
}

/// A worker mailbox rejected a command: the worker has exited.
#[derive(Debug)]
struct MailboxClosed;

/// Settings the scheduler needs from the runtime config.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerSettings {
    /// Maximum number of commands executing at once across all keys.
    pub parallelism: usize,
    pub key_queue_capacity: usize,
}

/// Routes pipeline input to per-key workers.
///
/// Each partition key owns one worker task fed through a bounded mailbox,
/// so commands for one key run serially while distinct keys run
/// concurrently, bounded by a shared semaphore. Watermarks are broadcast to
/// every live worker; workers that report idle are retired. A sweep signal
/// makes every worker re-check idleness, since swept TTL state may have
/// been its last.
pub struct Scheduler {
    operator: Arc<dyn Operator>,
    router: VirtualProcessorRouter<WorkerHandle>,
    workers: JoinSet<(PartitionKey, RuntimeResult<()>)>,
    status_tx: mpsc::UnboundedSender<WorkerStatus>,
    status_rx: mpsc::UnboundedReceiver<WorkerStatus>,
    output_tx: mpsc::Sender<OutputRecord>,
    permits: Arc<Semaphore>,
    metrics: Arc<EngineMetrics>,
    swept: Arc<Notify>,
    worker_cancel: CancellationToken,
    key_queue_capacity: usize,
    watermark: i64,
}

impl Scheduler {
    pub fn new(
        operator: Arc<dyn Operator>,
        settings: SchedulerSettings,
        output_tx: mpsc::Sender<OutputRecord>,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        Self {
            operator,
            router: VirtualProcessorRouter::new(),
            workers: JoinSet::new(),
            status_tx,
            status_rx,
            output_tx,
            permits: Arc::new(Semaphore::new(settings.parallelism.max(1))),
            metrics,
            swept: Arc::new(Notify::new()),
            worker_cancel: CancellationToken::new(),
            key_queue_capacity: settings.key_queue_capacity.max(1),
            watermark: i64::MIN,
        }
    }

    /// Use `swept` as the signal that the TTL sweeper removed state.
    pub fn with_sweep_signal(mut self, swept: Arc<Notify>) -> Self {
        self.swept = swept;
        self
    }

    /// Run until the input closes or `cancel` fires, then drain every worker.
    ///
    /// The first worker failure stops the pipeline: the remaining workers are
    /// cancelled and the error is returned.
    #[tracing::instrument(name = "scheduler", skip_all, fields(operator = %self.operator.name()))]
    pub async fn run(
        mut self,
        mut input_rx: mpsc::Receiver<PipelineEvent>,
        cancel: CancellationToken,
    ) -> RuntimeResult<()> {
        let mut closing = false;
        let swept = Arc::clone(&self.swept);
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled(), if !closing => {
                    vp_info!(pipe, "scheduler draining buffered input");
                    input_rx.close();
                    closing = true;
                }

                Some(joined) = self.workers.join_next() => {
                    if let Err(e) = flatten_join(joined) {
                        return self.abort(e).await;
                    }
                }

                Some(status) = self.status_rx.recv() => self.on_status(status),

                _ = swept.notified() => self.recheck_idle(),

                event = input_rx.recv() => {
                    let Some(event) = event else { break };
                    let dispatched = match event {
                        PipelineEvent::Element(element) => self.dispatch_element(element).await,
                        PipelineEvent::Watermark(wm) => self.broadcast_watermark(wm).await,
                    };
                    if dispatched.is_err() {
                        // A mailbox closed under us: its worker failed.
                        return self.drain().await;
                    }
                }
            }
        }
        self.drain().await
    }

    async fn dispatch_element(&mut self, element: Element) -> Result<(), MailboxClosed> {
        self.metrics.inc_element();
        let key = self.operator.key_selector().select(&element.row);
        if self.router.get(&key).is_none() {
            self.spawn_worker(&key).await?;
        }
        let Some(handle) = self.router.get_mut(&key) else {
            return Err(MailboxClosed);
        };
        let seq = handle.next_seq();
        vp_trace!(pipe, key = %key, seq, "element routed");
        handle
            .tx
            .send(WorkerCommand::Element { seq, element })
            .await
            .map_err(|_| MailboxClosed)
    }

    async fn broadcast_watermark(&mut self, watermark: i64) -> Result<(), MailboxClosed> {
        if watermark <= self.watermark {
            vp_debug!(pipe, watermark, current = self.watermark, "non-advancing watermark ignored");
            return Ok(());
        }
        self.watermark = watermark;
        self.metrics.inc_watermark();
        vp_debug!(pipe, watermark, workers = self.router.len(), "watermark broadcast");
        for (_, handle) in self.router.iter_mut() {
            let seq = handle.next_seq();
            handle
                .tx
                .send(WorkerCommand::Watermark { seq, watermark })
                .await
                .map_err(|_| MailboxClosed)?;
        }
        Ok(())
    }

    /// Start a worker for `key`, seeding it with the current watermark.
    async fn spawn_worker(&mut self, key: &PartitionKey) -> Result<(), MailboxClosed> {
        let (tx, mailbox) = mpsc::channel(self.key_queue_capacity);
        let worker = KeyWorker {
            processor: self.operator.create_processor(key.clone()),
            operator: Arc::clone(&self.operator),
            mailbox,
            output_tx: self.output_tx.clone(),
            status_tx: self.status_tx.clone(),
            permits: Arc::clone(&self.permits),
            metrics: Arc::clone(&self.metrics),
            cancel: self.worker_cancel.child_token(),
        };
        let worker_key = key.clone();
        self.workers
            .spawn(async move { (worker_key, worker.run().await) });
        self.metrics.processor_created();
        vp_debug!(pipe, key = %key, "virtual processor created");

        let handle = self
            .router
            .resolve(key, |_| WorkerHandle { tx, sent_seq: 0 });
        if self.watermark > i64::MIN {
            let seq = handle.next_seq();
            let watermark = self.watermark;
            handle
                .tx
                .send(WorkerCommand::Watermark { seq, watermark })
                .await
                .map_err(|_| MailboxClosed)?;
        }
        Ok(())
    }

    fn on_status(&mut self, status: WorkerStatus) {
        match status {
            WorkerStatus::Idle { key, seq } => {
                // Commands sent after `seq` may repopulate the key.
                let current = self.router.get(&key).is_some_and(|h| h.sent_seq == seq);
                if current && self.router.retire(&key).is_some() {
                    self.metrics.processor_retired();
                    vp_debug!(pipe, key = %key, "idle virtual processor retired");
                }
            }
        }
    }

    fn recheck_idle(&mut self) {
        vp_debug!(pipe, workers = self.router.len(), "state swept, re-checking idle workers");
        for (_, handle) in self.router.iter_mut() {
            let seq = handle.sent_seq + 1;
            // A full mailbox re-checks after its pending commands anyway.
            if handle.tx.try_send(WorkerCommand::CheckIdle { seq }).is_ok() {
                handle.sent_seq = seq;
            }
        }
    }

    /// Close every mailbox and wait for the workers to finish their queues.
    async fn drain(mut self) -> RuntimeResult<()> {
        let live = self.router.drain().count();
        vp_debug!(pipe, workers = live, "closing worker mailboxes");
        let mut first_err = None;
        while let Some(joined) = self.workers.join_next().await {
            if let Err(e) = flatten_join(joined) {
                if first_err.is_none() {
                    // Stop the others at their next command boundary.
                    self.worker_cancel.cancel();
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn abort(mut self, err: crate::error::RuntimeError) -> RuntimeResult<()> {
        vp_error!(pipe, error = %err, "worker failed, stopping pipeline");
        self.worker_cancel.cancel();
        self.router.drain().for_each(drop);
        while self.workers.join_next().await.is_some() {}
        Err(err)
    }
}

fn flatten_join(
    joined: Result<(PartitionKey, RuntimeResult<()>), tokio::task::JoinError>,
) -> RuntimeResult<()> {
    match joined {
        Ok((key, result)) => result.map_err(|e| e.with_detail(format!("key {key}"))),
        Err(e) => StructError::from(RuntimeReason::Invocation)
            .with_detail(format!("worker task join error: {e}"))
            .err(),
    }
}
