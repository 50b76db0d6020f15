use std::sync::Arc;
use std::time::Instant;

use orion_error::prelude::*;
use orion_error::ErrorOweBase;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;

use vp_core::partition::PartitionKey;
use vp_core::processor::{KeyedProcessor, Operator, ProcessReport};
use vp_core::row::Element;
use vp_core::sink::{OutputRecord, emitted_now};

use crate::error::{RuntimeReason, RuntimeResult};
use crate::metrics::EngineMetrics;

/// Command delivered to a key worker. `seq` increases by one per command
/// sent to the same worker.
#[derive(Debug)]
pub(crate) enum WorkerCommand {
    Element { seq: u64, element: Element },
    Watermark { seq: u64, watermark: i64 },
    /// Re-check idleness only; sent after the sweeper freed state.
    CheckIdle { seq: u64 },
}

impl WorkerCommand {
    fn seq(&self) -> u64 {
        match self {
            Self::Element { seq, .. }
            | Self::Watermark { seq, .. }
            | Self::CheckIdle { seq } => *seq,
        }
    }
}

/// Report from a worker back to the scheduler.
#[derive(Debug)]
pub(crate) enum WorkerStatus {
    /// The worker finished command `seq` and holds neither windows nor state.
    Idle { key: PartitionKey, seq: u64 },
}

/// Actor owning one virtual processor.
///
/// Commands run strictly in mailbox order. Each command holds one permit of
/// the shared semaphore while its invocations run; outputs are forwarded
/// only after the command committed.
pub(crate) struct KeyWorker {
    pub processor: Box<dyn KeyedProcessor>,
    pub operator: Arc<dyn Operator>,
    pub mailbox: mpsc::Receiver<WorkerCommand>,
    pub output_tx: mpsc::Sender<OutputRecord>,
    pub status_tx: mpsc::UnboundedSender<WorkerStatus>,
    pub permits: Arc<Semaphore>,
    pub metrics: Arc<EngineMetrics>,
    pub cancel: CancellationToken,
}

impl KeyWorker {
    /// Run until the mailbox closes (retired or drained) or `cancel` fires.
    ///
    /// On cancellation the in-flight command is dropped together with its
    /// staged state and outputs.
    pub async fn run(mut self) -> RuntimeResult<()> {
        let key = self.processor.key().clone();
        let cancel = self.cancel.clone();
        let permits = Arc::clone(&self.permits);

        loop {
            let cmd = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                cmd = self.mailbox.recv() => match cmd {
                    Some(cmd) => cmd,
                    None => break,
                },
            };
            let seq = cmd.seq();
            if matches!(cmd, WorkerCommand::CheckIdle { .. }) {
                self.report_if_idle(&key, seq).await?;
                continue;
            }

            let started = Instant::now();
            let result = {
                let _permit = permits.acquire().await.owe(RuntimeReason::Shutdown)?;
                let processor = &mut self.processor;
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        vp_debug!(pipe, key = %key, seq, "in-flight command dropped on cancel");
                        break;
                    }
                    result = execute(processor.as_mut(), cmd) => result,
                }
            };

            let report = match result {
                Ok(report) => report,
                Err(e) => {
                    self.metrics.inc_failure();
                    vp_error!(pipe, key = %key, seq, error = %e, "invocation failed");
                    return Err(e);
                }
            };
            self.metrics.add_report(&report, started.elapsed());
            self.forward(&key, &report).await?;
            self.report_if_idle(&key, seq).await?;
        }
        Ok(())
    }

    async fn report_if_idle(&self, key: &PartitionKey, seq: u64) -> RuntimeResult<()> {
        if self.processor.is_idle().await.err_conv()? {
            // Scheduler may already be gone during shutdown.
            let _ = self.status_tx.send(WorkerStatus::Idle {
                key: key.clone(),
                seq,
            });
        }
        Ok(())
    }

    async fn forward(&self, key: &PartitionKey, report: &ProcessReport) -> RuntimeResult<()> {
        let emitted_at = emitted_now();
        for output in &report.outputs {
            let records =
                OutputRecord::from_invocation(self.operator.as_ref(), key, output, &emitted_at);
            for record in records {
                self.output_tx.send(record).await.map_err(|_| {
                    StructError::from(RuntimeReason::Shutdown).with_detail("output channel closed")
                })?;
                self.metrics.inc_output();
            }
        }
        Ok(())
    }
}

async fn execute(
    processor: &mut dyn KeyedProcessor,
    cmd: WorkerCommand,
) -> RuntimeResult<ProcessReport> {
    let result = match cmd {
        WorkerCommand::Element { element, .. } => processor.on_element(element).await,
        WorkerCommand::Watermark { watermark, .. } => processor.on_watermark(watermark).await,
        WorkerCommand::CheckIdle { .. } => Ok(ProcessReport::default()),
    };
    result.err_conv()
}
