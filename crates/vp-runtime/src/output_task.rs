use std::sync::Arc;

use tokio::sync::mpsc;

use vp_core::sink::{OutputRecord, OutputSink};

/// Bounded channel capacity between the workers and the output task.
pub const OUTPUT_CHANNEL_CAPACITY: usize = 256;

/// Consume committed output records and write them to `sink`.
///
/// Shutdown is driven by channel close: once every worker has finished and
/// dropped its sender, `rx.recv()` returns `None` and the task exits. A sink
/// failure is logged and the record skipped.
pub async fn run_output_writer(mut rx: mpsc::Receiver<OutputRecord>, sink: Arc<dyn OutputSink>) {
    let mut written = 0u64;
    let mut failed = 0u64;
    while let Some(record) = rx.recv().await {
        match sink.send(&record) {
            Ok(()) => written += 1,
            Err(e) => {
                failed += 1;
                vp_warn!(
                    res,
                    operator = %record.operator,
                    key = %record.key,
                    channel = %record.channel,
                    error = %e,
                    "output write failed"
                );
            }
        }
    }
    vp_debug!(res, written, failed, "output writer finished");
}
