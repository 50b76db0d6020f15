use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use serde::Serialize;

use crate::partition::PartitionKey;
use crate::processor::{InvocationOutput, MAIN_CHANNEL, Operator};
use crate::row::RowSchema;
use crate::window::TimeWindow;

// ---------------------------------------------------------------------------
// OutputRecord
// ---------------------------------------------------------------------------

/// One emitted row as it leaves the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputRecord {
    pub operator: String,
    pub key: PartitionKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<TimeWindow>,
    pub channel: String,
    pub fields: serde_json::Value,
    pub emitted_at: String,
}

impl OutputRecord {
    /// Flatten an invocation into records: main rows first, then each side
    /// channel in tag order. Row order within a channel is kept.
    pub fn from_invocation(
        operator: &dyn Operator,
        key: &PartitionKey,
        output: &InvocationOutput,
        emitted_at: &str,
    ) -> Vec<OutputRecord> {
        let fallback = RowSchema::default();
        let channels = std::iter::once((MAIN_CHANNEL, &output.main))
            .chain(output.side.iter().map(|(tag, rows)| (tag.as_str(), rows)));

        let mut records = Vec::new();
        for (channel, rows) in channels {
            let schema = operator.channel_schema(channel).unwrap_or(&fallback);
            records.extend(rows.iter().map(|row| OutputRecord {
                operator: operator.name().to_string(),
                key: key.clone(),
                window: output.window,
                channel: channel.to_string(),
                fields: row.to_json(schema),
                emitted_at: emitted_at.to_string(),
            }));
        }
        records
    }
}

/// Current wall-clock time in RFC 3339 with millisecond precision.
pub fn emitted_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Destination for output records.
pub trait OutputSink: Send + Sync {
    fn send(&self, record: &OutputRecord) -> Result<()>;
}

impl<T: OutputSink> OutputSink for Arc<T> {
    fn send(&self, record: &OutputRecord) -> Result<()> {
        (**self).send(record)
    }
}

/// Appends records as JSON Lines to a file.
pub struct FileOutputSink {
    writer: Mutex<BufWriter<File>>,
}

impl FileOutputSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl OutputSink for FileOutputSink {
    fn send(&self, record: &OutputRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        let mut w = self.writer.lock().expect("output sink lock poisoned");
        w.write_all(json.as_bytes())?;
        w.write_all(b"\n")?;
        w.flush()?;
        Ok(())
    }
}

/// Writes records as JSON Lines to stdout.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn send(&self, record: &OutputRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        let mut out = std::io::stdout().lock();
        writeln!(out, "{json}")?;
        Ok(())
    }
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<OutputRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<OutputRecord> {
        self.records.lock().expect("memory sink lock poisoned").clone()
    }
}

impl OutputSink for MemorySink {
    fn send(&self, record: &OutputRecord) -> Result<()> {
        self.records
            .lock()
            .expect("memory sink lock poisoned")
            .push(record.clone());
        Ok(())
    }
}

/// Broadcasts records to multiple sinks.
///
/// Continues sending to all sinks even if one fails. Returns the first error
/// encountered, if any.
pub struct FanOutSink {
    sinks: Vec<Box<dyn OutputSink>>,
}

impl FanOutSink {
    pub fn new(sinks: Vec<Box<dyn OutputSink>>) -> Self {
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl OutputSink for FanOutSink {
    fn send(&self, record: &OutputRecord) -> Result<()> {
        let mut first_err: Option<anyhow::Error> = None;
        for sink in &self.sinks {
            if let Err(e) = sink.send(record) {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::io::Read;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::clock::ManualClock;
    use crate::function::RunningCountFunction;
    use crate::processor::PtfOperator;
    use crate::row::{Row, Value};
    use crate::state::MemoryBackend;

    fn sample_record() -> OutputRecord {
        OutputRecord {
            operator: "count".to_string(),
            key: PartitionKey::from("a"),
            window: Some(TimeWindow::new(0, 10)),
            channel: MAIN_CHANNEL.to_string(),
            fields: serde_json::json!({"count": 3}),
            emitted_at: "2024-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[test]
    fn record_serialization() {
        let json = serde_json::to_value(sample_record()).unwrap();
        assert_eq!(json["operator"], "count");
        assert_eq!(json["key"], "a");
        assert_eq!(json["window"]["start"], 0);
        assert_eq!(json["window"]["end"], 10);
        assert_eq!(json["fields"]["count"], 3);

        let mut global = sample_record();
        global.window = None;
        global.key = PartitionKey::global();
        let json = serde_json::to_value(global).unwrap();
        assert!(json.get("window").is_none());
        assert_eq!(json["key"], "<global>");
    }

    #[test]
    fn invocation_flattens_main_before_side() {
        let input = RowSchema::parse_decl("region:str").unwrap();
        let op = PtfOperator::new(
            Arc::new(RunningCountFunction::new(input)),
            "input",
            &["region"],
            Arc::new(MemoryBackend::new()),
            Arc::new(ManualClock::new(0)),
        )
        .unwrap();
        let output = InvocationOutput {
            window: None,
            main: vec![Row::single(Some(Value::Int(1))), Row::single(Some(Value::Int(2)))],
            side: BTreeMap::from([("extra".to_string(), vec![Row::single(None)])]),
        };

        let records =
            OutputRecord::from_invocation(&op, &PartitionKey::from("east"), &output, "t");
        let channels: Vec<_> = records.iter().map(|r| r.channel.as_str()).collect();
        assert_eq!(channels, vec!["main", "main", "extra"]);
        assert_eq!(records[1].fields, serde_json::json!({"count": 2}));
        // Undeclared channel falls back to positional names.
        assert_eq!(records[2].fields, serde_json::json!({"f0": null}));
    }

    #[test]
    fn file_sink_writes_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.jsonl");
        {
            let sink = FileOutputSink::open(&path).unwrap();
            sink.send(&sample_record()).unwrap();
            let mut second = sample_record();
            second.channel = "late-data".to_string();
            sink.send(&second).unwrap();
        }

        let mut contents = String::new();
        File::open(&path)
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        let lines: Vec<&str> = contents.trim().split('\n').collect();
        assert_eq!(lines.len(), 2);
        let parsed: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed["channel"], "late-data");
    }

    // -- FanOutSink tests --

    /// In-memory sink that records how many records it received.
    struct CountingSink {
        count: AtomicUsize,
    }

    impl CountingSink {
        fn new() -> Self {
            Self {
                count: AtomicUsize::new(0),
            }
        }
        fn count(&self) -> usize {
            self.count.load(Ordering::SeqCst)
        }
    }

    impl OutputSink for CountingSink {
        fn send(&self, _record: &OutputRecord) -> Result<()> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailSink;

    impl OutputSink for FailSink {
        fn send(&self, _record: &OutputRecord) -> Result<()> {
            anyhow::bail!("intentional failure");
        }
    }

    #[test]
    fn fanout_continues_after_failure() {
        let s1 = Arc::new(CountingSink::new());
        let s2 = Arc::new(CountingSink::new());
        let sink = FanOutSink::new(vec![
            Box::new(Arc::clone(&s1)),
            Box::new(FailSink),
            Box::new(Arc::clone(&s2)),
        ]);

        assert!(sink.send(&sample_record()).is_err());
        assert_eq!(s1.count(), 1);
        assert_eq!(s2.count(), 1);
    }

    #[test]
    fn fanout_empty_returns_ok() {
        let sink = FanOutSink::new(vec![]);
        assert!(sink.is_empty());
        assert!(sink.send(&sample_record()).is_ok());
    }

    #[test]
    fn memory_sink_keeps_order() {
        let sink = MemorySink::new();
        for i in 0..3 {
            let mut r = sample_record();
            r.fields = serde_json::json!({"count": i});
            sink.send(&r).unwrap();
        }
        let seen: Vec<_> = sink.records().iter().map(|r| r.fields["count"].clone()).collect();
        assert_eq!(seen, vec![0, 1, 2]);
    }
}
