use std::path::Path;

use anyhow::Context;

use vp_config::{SinkUri, parse_sink_uri};
use vp_core::sink::{FanOutSink, FileOutputSink, OutputSink, StdoutSink};

/// Build one sink per configured URI and combine them into a [`FanOutSink`].
///
/// Relative `file://` paths are resolved against `work_root`.
pub fn build_output_sink(uris: &[String], work_root: &Path) -> anyhow::Result<FanOutSink> {
    let mut sinks: Vec<Box<dyn OutputSink>> = Vec::with_capacity(uris.len());
    for uri in uris {
        let sink: Box<dyn OutputSink> = match parse_sink_uri(uri)? {
            SinkUri::Stdout => Box::new(StdoutSink),
            SinkUri::File { path } => {
                let resolved = if path.is_relative() {
                    work_root.join(&path)
                } else {
                    path
                };
                let sink = FileOutputSink::open(&resolved)
                    .with_context(|| format!("open output file {}", resolved.display()))?;
                Box::new(sink)
            }
        };
        vp_debug!(conf, sink = %uri, "output sink built");
        sinks.push(sink);
    }
    Ok(FanOutSink::new(sinks))
}
