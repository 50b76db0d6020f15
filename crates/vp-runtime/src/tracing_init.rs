use std::fmt::{self as stdfmt, Write as _};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::{DefaultFields, Writer};
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};
use tracing_subscriber::fmt::{self, FmtContext, FormatEvent, FormatFields, FormattedFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};
use vp_config::{LogFormat, LoggingConfig};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Field formatter of the file layer. A distinct type keeps its cached span
/// fields apart from the stderr layer's, which may carry ANSI codes.
#[derive(Default)]
struct FileFields(DefaultFields);

impl<'writer> FormatFields<'writer> for FileFields {
    fn format_fields<R: tracing_subscriber::field::RecordFields>(
        &self,
        writer: Writer<'writer>,
        fields: R,
    ) -> stdfmt::Result {
        self.0.format_fields(writer, fields)
    }
}

/// Plain-text event format with the `domain` field lifted into a prefix:
///
/// ```text
/// 2026-02-21T01:17:14Z  INFO [pipe] scheduler{operator=count}: watermark broadcast watermark=10
/// ```
///
/// Events without a `domain` (from dependencies) have no prefix.
struct DomainFormat {
    timer: SystemTime,
}

impl DomainFormat {
    fn new() -> Self {
        Self { timer: SystemTime }
    }
}

/// Write `text` wrapped in an SGR sequence when the writer supports ANSI.
fn paint(w: &mut Writer<'_>, sgr: &str, text: impl stdfmt::Display) -> stdfmt::Result {
    if w.has_ansi_escapes() {
        write!(w, "\x1b[{sgr}m{text}\x1b[0m")
    } else {
        write!(w, "{text}")
    }
}

fn level_sgr(level: Level) -> &'static str {
    match level {
        Level::ERROR => "31",
        Level::WARN => "33",
        Level::INFO => "32",
        Level::DEBUG => "34",
        Level::TRACE => "35",
    }
}

impl<S, N> FormatEvent<S, N> for DomainFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> stdfmt::Result {
        let mut ts = String::new();
        if self.timer.format_time(&mut Writer::new(&mut ts)).is_err() {
            ts.push_str("<unknown time>");
        }
        paint(&mut writer, "2", ts)?;

        let level = *event.metadata().level();
        writer.write_char(' ')?;
        paint(&mut writer, level_sgr(level), format_args!("{level:>5}"))?;
        writer.write_char(' ')?;

        let mut fields = EventFields::default();
        event.record(&mut fields);

        if let Some(domain) = &fields.domain {
            paint(&mut writer, "1;36", format_args!("[{domain}]"))?;
            writer.write_char(' ')?;
        }

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                paint(&mut writer, "1", span.name())?;
                let ext = span.extensions();
                match ext.get::<FormattedFields<N>>() {
                    Some(f) if !f.is_empty() => write!(writer, "{{{f}}}: ")?,
                    _ => write!(writer, "{{}}: ")?,
                }
            }
        }

        writer.write_str(&fields.message)?;
        if !fields.rest.is_empty() {
            writer.write_char(' ')?;
            paint(&mut writer, "3", &fields.rest)?;
        }
        writeln!(writer)
    }
}

/// Splits an event into its domain, message and the remaining `k=v` pairs.
#[derive(Default)]
struct EventFields {
    domain: Option<String>,
    message: String,
    rest: String,
}

impl EventFields {
    fn push_pair(&mut self, name: &str, value: impl stdfmt::Display) {
        if !self.rest.is_empty() {
            self.rest.push(' ');
        }
        let _ = write!(self.rest, "{name}={value}");
    }
}

impl Visit for EventFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "domain" => self.domain = Some(value.to_string()),
            "message" => self.message = value.to_string(),
            name => self.push_pair(name, format_args!("{value:?}")),
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn stdfmt::Debug) {
        match field.name() {
            "domain" => self.domain = Some(format!("{value:?}").trim_matches('"').to_string()),
            "message" => {
                let _ = write!(self.message, "{value:?}");
            }
            name => self.push_pair(name, format_args!("{value:?}")),
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push_pair(field.name(), value);
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push_pair(field.name(), value);
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push_pair(field.name(), value);
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push_pair(field.name(), value);
    }
}

/// `level[,module=level...]` directives of `config`; `RUST_LOG` wins when set.
fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if std::env::var_os("RUST_LOG").is_some() {
        return Ok(EnvFilter::from_default_env());
    }
    let mut modules: Vec<_> = config.modules.iter().collect();
    modules.sort();
    let directives = std::iter::once(config.level.clone())
        .chain(modules.into_iter().map(|(m, l)| format!("{m}={l}")))
        .collect::<Vec<_>>()
        .join(",");
    EnvFilter::try_new(&directives).with_context(|| format!("invalid log filter '{directives}'"))
}

fn resolve_log_path(file: &Path, base_dir: &Path) -> PathBuf {
    if file.is_relative() {
        base_dir.join(file)
    } else {
        file.to_path_buf()
    }
}

fn stderr_layer(format: LogFormat) -> BoxedLayer {
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Plain => fmt::layer()
            .event_format(DomainFormat::new())
            .with_writer(std::io::stderr)
            .boxed(),
    }
}

fn file_layer(format: LogFormat, path: &Path) -> Result<(BoxedLayer, WorkerGuard)> {
    let dir = path
        .parent()
        .context("log file path has no parent directory")?;
    let name = path.file_name().context("log file path has no file name")?;
    std::fs::create_dir_all(dir).with_context(|| format!("create log dir {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(dir, name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let layer = match format {
        LogFormat::Json => fmt::layer()
            .json()
            .fmt_fields(FileFields::default())
            .with_target(false)
            .with_ansi(false)
            .with_writer(writer)
            .boxed(),
        LogFormat::Plain => fmt::layer()
            .event_format(DomainFormat::new())
            .fmt_fields(FileFields::default())
            .with_ansi(false)
            .with_writer(writer)
            .boxed(),
    };
    Ok((layer, guard))
}

/// Install the global `tracing` subscriber described by `config`.
///
/// The returned [`WorkerGuard`] must live until exit; dropping it flushes the
/// log file. The filter applies to every layer.
pub fn init_tracing(config: &LoggingConfig, base_dir: &Path) -> Result<Option<WorkerGuard>> {
    let filter = build_filter(config)?;

    let mut layers = vec![stderr_layer(config.format)];
    let mut guard = None;
    if let Some(file) = &config.file {
        let (layer, g) = file_layer(config.format, &resolve_log_path(file, base_dir))?;
        layers.push(layer);
        guard = Some(g);
    }

    tracing_subscriber::registry()
        .with(layers.with_filter(filter))
        .try_init()
        .context("a global tracing subscriber is already installed")?;
    Ok(guard)
}
