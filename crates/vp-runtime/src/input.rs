use std::path::Path;

use arrow::record_batch::RecordBatch;
use orion_error::prelude::*;
use orion_error::{ErrorOwe, ErrorOweBase};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use vp_core::bridge::batch_to_elements;
use vp_core::error::CoreReason;
use vp_core::row::{Element, Row, RowSchema};

use crate::error::{RuntimeReason, RuntimeResult};

/// Watermark emitted at the end of a bounded input: every window fires and
/// expires.
pub const END_OF_INPUT_WATERMARK: i64 = i64::MAX;

/// One unit of pipeline input.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Element(Element),
    Watermark(i64),
}

/// Parse one replay line.
///
/// Accepted forms: `{"ts": <ms>, "row": {...}}`, `{"row": {...}}` (no event
/// time) and `{"watermark": <ms>}`. Blank lines and lines starting with `#`
/// yield `None`.
pub fn parse_replay_line(line: &str, schema: &RowSchema) -> RuntimeResult<Option<PipelineEvent>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let json: serde_json::Value =
        serde_json::from_str(line).owe(RuntimeReason::Core(CoreReason::DataFormat))?;

    if let Some(wm) = json.get("watermark") {
        let Some(wm) = wm.as_i64() else {
            return StructError::from(RuntimeReason::Core(CoreReason::DataFormat))
                .with_detail(format!("watermark must be an integer, got {wm}"))
                .err();
        };
        return Ok(Some(PipelineEvent::Watermark(wm)));
    }

    let Some(row) = json.get("row") else {
        return StructError::from(RuntimeReason::Core(CoreReason::DataFormat))
            .with_detail(format!("replay line has neither \"row\" nor \"watermark\": {line}"))
            .err();
    };
    let row = Row::from_json(schema, row).err_conv()?;
    let timestamp = match json.get("ts") {
        None | Some(serde_json::Value::Null) => None,
        Some(ts) => match ts.as_i64() {
            Some(ts) => Some(ts),
            None => {
                return StructError::from(RuntimeReason::Core(CoreReason::DataFormat))
                    .with_detail(format!("ts must be an integer, got {ts}"))
                    .err();
            }
        },
    };
    Ok(Some(PipelineEvent::Element(Element { timestamp, row })))
}

/// Stream a JSONL replay file into `tx`, ending with
/// [`END_OF_INPUT_WATERMARK`] when `bounded` is set.
///
/// Stops early without error when `cancel` fires or the pipeline closes.
/// Returns the number of events sent.
pub async fn replay_jsonl(
    path: &Path,
    schema: &RowSchema,
    tx: mpsc::Sender<PipelineEvent>,
    bounded: bool,
    cancel: CancellationToken,
) -> RuntimeResult<u64> {
    let file = tokio::fs::File::open(path).await.owe_sys()?;
    let mut lines = BufReader::new(file).lines();
    let mut sent = 0u64;
    let mut line_no = 0usize;

    loop {
        let line = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                vp_debug!(pipe, sent, "replay cancelled");
                return Ok(sent);
            }
            line = lines.next_line() => line.owe_sys()?,
        };
        let Some(line) = line else { break };
        line_no += 1;
        let event = parse_replay_line(&line, schema).map_err(|e| {
            e.with_detail(format!("{}:{line_no}", path.display()))
        })?;
        if let Some(event) = event {
            if tx.send(event).await.is_err() {
                vp_debug!(pipe, sent, "pipeline closed, replay stopped");
                return Ok(sent);
            }
            sent += 1;
        }
    }

    if bounded && tx.send(PipelineEvent::Watermark(END_OF_INPUT_WATERMARK)).await.is_ok() {
        sent += 1;
    }
    vp_info!(pipe, path = %path.display(), events = sent, "replay finished");
    Ok(sent)
}

/// Feed an Arrow batch as elements, reading event time from `time_column`.
pub async fn ingest_batch(
    batch: &RecordBatch,
    schema: &RowSchema,
    time_column: &str,
    tx: &mpsc::Sender<PipelineEvent>,
) -> RuntimeResult<usize> {
    let elements = batch_to_elements(batch, schema, time_column).err_conv()?;
    let n = elements.len();
    for element in elements {
        tx.send(PipelineEvent::Element(element))
            .await
            .map_err(|_| {
                StructError::from(RuntimeReason::Shutdown).with_detail("pipeline input closed")
            })?;
    }
    vp_debug!(pipe, rows = n, "batch ingested");
    Ok(n)
}
