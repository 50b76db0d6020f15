use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use vp_config::EngineConfig;
use vp_core::clock::SystemClock;
use vp_core::function::{CountWindowFunction, RunningCountFunction};
use vp_core::processor::{Operator, PtfOperator, WindowOperator};
use vp_core::row::RowSchema;
use vp_core::state::MemoryBackend;
use vp_runtime::input::replay_jsonl;
use vp_runtime::sink_build::build_output_sink;
use vp_runtime::tracing_init::init_tracing;
use vp_runtime::{Engine, wait_for_signal};

#[derive(Parser)]
#[command(name = "vproc", about = "Windowed keyed-state execution engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSONL input file through one built-in function
    Run {
        /// Path to vp.toml config file
        #[arg(short, long)]
        config: PathBuf,
        /// JSONL input: {"ts": <ms>, "row": {...}} or {"watermark": <ms>} per line
        #[arg(short, long)]
        input: PathBuf,
        /// Input row schema, e.g. "user:str, region:str, amount:int"
        #[arg(long)]
        schema: String,
        /// Partition column (repeatable)
        #[arg(long = "partition-by")]
        partition_by: Vec<String>,
        #[arg(long, value_enum, default_value_t = Function::Count)]
        function: Function,
        /// Window definition to use; required when the config has several
        #[arg(long)]
        window: Option<String>,
        /// State TTL for running-count, e.g. "1h" or "1 day"
        #[arg(long)]
        ttl: Option<String>,
        /// Keep running after the input ends instead of flushing every window
        #[arg(long)]
        unbounded: bool,
        /// Print Prometheus-format metrics to stderr on exit
        #[arg(long)]
        metrics: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Function {
    /// Per-window element count
    Count,
    /// Running count per partition (table function)
    RunningCount,
}

struct OperatorArgs<'a> {
    function: Function,
    schema: RowSchema,
    partition_by: &'a [String],
    window: Option<&'a str>,
    ttl: Option<&'a str>,
}

fn build_operator(config: &EngineConfig, args: OperatorArgs<'_>) -> Result<Arc<dyn Operator>> {
    let partition_by: Vec<&str> = args.partition_by.iter().map(String::as_str).collect();
    let backend = Arc::new(MemoryBackend::new());
    let clock = Arc::new(SystemClock);

    let operator: Arc<dyn Operator> = match args.function {
        Function::Count => {
            let window = match args.window {
                Some(name) => config
                    .window(name)
                    .with_context(|| format!("no window named {name:?} in config"))?,
                None => match config.windows.as_slice() {
                    [only] => only,
                    _ => anyhow::bail!("config defines several windows; pick one with --window"),
                },
            };
            let function = Arc::new(CountWindowFunction::new(args.schema));
            Arc::new(
                WindowOperator::new(window, function, &partition_by, backend, clock)
                    .map_err(|e| anyhow::anyhow!("{e}"))?,
            )
        }
        Function::RunningCount => {
            let function = match args.ttl {
                Some(ttl) => RunningCountFunction::with_ttl(args.schema, ttl)
                    .map_err(|e| anyhow::anyhow!("{e}"))?,
                None => RunningCountFunction::new(args.schema),
            };
            Arc::new(
                PtfOperator::new(Arc::new(function), "input", &partition_by, backend, clock)
                    .map_err(|e| anyhow::anyhow!("{e}"))?,
            )
        }
    };
    Ok(operator)
}

/// Replay `input` into `engine`.
///
/// A bounded replay closes the engine's input and ends with a final
/// watermark, so every open window flushes. An unbounded replay keeps the
/// engine's own sender, leaving the pipeline open until shutdown.
async fn replay_input(
    engine: &mut Engine,
    input: &Path,
    schema: &RowSchema,
    unbounded: bool,
) -> Result<u64> {
    let tx = engine.input().context("engine input closed before replay")?;
    if !unbounded {
        engine.close_input();
    }
    replay_jsonl(input, schema, tx, !unbounded, engine.cancel_token())
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            input,
            schema,
            partition_by,
            function,
            window,
            ttl,
            unbounded,
            metrics,
        } => {
            let config_path = config
                .canonicalize()
                .map_err(|e| anyhow::anyhow!("config path '{}': {e}", config.display()))?;
            let engine_config = EngineConfig::load(&config_path)?;
            let base_dir = config_path.parent().unwrap_or(Path::new("."));

            let _guard = init_tracing(&engine_config.logging, base_dir)?;

            let schema =
                RowSchema::parse_decl(&schema).map_err(|e| anyhow::anyhow!("--schema: {e}"))?;
            let operator = build_operator(
                &engine_config,
                OperatorArgs {
                    function,
                    schema: schema.clone(),
                    partition_by: &partition_by,
                    window: window.as_deref(),
                    ttl: ttl.as_deref(),
                },
            )?;
            let sink = build_output_sink(&engine_config.output.sinks, base_dir)?;

            let mut engine = Engine::start(&engine_config, operator, Arc::new(sink))
                .await
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            tracing::info!(domain = "sys", input = %input.display(), "vproc engine started");

            let cancel = engine.cancel_token();
            tokio::spawn(wait_for_signal(cancel.clone()));

            let replayed = replay_input(&mut engine, &input, &schema, unbounded).await;
            if unbounded && replayed.is_ok() {
                tracing::info!(domain = "sys", "input replayed, running until shutdown signal");
                cancel.cancelled().await;
            }
            let engine_metrics = engine.metrics();
            let result = engine.wait().await;

            if metrics {
                eprint!("{}", engine_metrics.render_prometheus());
            }
            replayed?;
            result.map_err(|e| anyhow::anyhow!("{e}"))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use vp_core::sink::MemorySink;
    use vp_runtime::input::PipelineEvent;

    use super::*;

    const CONFIG: &str = r#"
[runtime]
parallelism = 1

[window.w]
assigner = "tumbling"
size = "10ms"
"#;

    async fn started(sink: Arc<MemorySink>) -> (Engine, RowSchema) {
        let config: EngineConfig = CONFIG.parse().unwrap();
        let schema = RowSchema::parse_decl("user:str").unwrap();
        let operator = build_operator(
            &config,
            OperatorArgs {
                function: Function::Count,
                schema: schema.clone(),
                partition_by: &["user".to_string()],
                window: None,
                ttl: None,
            },
        )
        .unwrap();
        (Engine::start(&config, operator, sink).await.unwrap(), schema)
    }

    fn replay_file(dir: &Path) -> PathBuf {
        let path = dir.join("input.jsonl");
        std::fs::write(
            &path,
            "{\"ts\": 1, \"row\": {\"user\": \"a\"}}\n{\"ts\": 4, \"row\": {\"user\": \"a\"}}\n",
        )
        .unwrap();
        path
    }

    #[tokio::test]
    async fn bounded_replay_flushes_and_closes_input() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(MemorySink::new());
        let (mut engine, schema) = started(sink.clone()).await;

        let sent = replay_input(&mut engine, &replay_file(dir.path()), &schema, false)
            .await
            .unwrap();
        assert_eq!(sent, 3);
        assert!(engine.send(PipelineEvent::Watermark(20)).await.is_err());
        engine.wait().await.unwrap();
        assert_eq!(sink.records().len(), 1);
    }

    #[tokio::test]
    async fn unbounded_replay_keeps_pipeline_open() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(MemorySink::new());
        let (mut engine, schema) = started(sink.clone()).await;

        let sent = replay_input(&mut engine, &replay_file(dir.path()), &schema, true)
            .await
            .unwrap();
        assert_eq!(sent, 2);
        assert!(sink.records().is_empty());

        // Input arriving after the replay is still processed.
        engine.send(PipelineEvent::Watermark(10)).await.unwrap();
        for _ in 0..200 {
            if !sink.records().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(sink.records().len(), 1);
        assert_eq!(sink.records()[0].fields["count"], 2);

        engine.shutdown();
        engine.wait().await.unwrap();
    }
}
