use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Output destinations (URI list, e.g. `"file:///var/log/vp-out.jsonl"` or `"stdout"`).
    pub sinks: Vec<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sinks: vec!["stdout".to_string()],
        }
    }
}

/// A parsed output destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkUri {
    File { path: PathBuf },
    Stdout,
}

/// Parse a sink URI. Supported forms: `file:///abs/path`, `file://rel/path`, `stdout`.
pub fn parse_sink_uri(uri: &str) -> anyhow::Result<SinkUri> {
    if uri == "stdout" {
        return Ok(SinkUri::Stdout);
    }
    let Some(rest) = uri.strip_prefix("file://") else {
        anyhow::bail!("unsupported sink URI {uri:?} (expected file://… or stdout)");
    };
    if rest.is_empty() {
        anyhow::bail!("sink URI {uri:?} has an empty path");
    }
    Ok(SinkUri::File {
        path: PathBuf::from(rest),
    })
}
