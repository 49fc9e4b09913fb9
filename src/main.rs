//! pipetune - Main Entry Point
//!
//! Measures a media pipeline, then searches device, batch-size and
//! concurrency settings for the fastest configuration on this host.

use anyhow::{Context, Result};
use clap::Parser;
use pipetune::{AutotuneConfig, Orchestrator, PipelineEngine, SearchOutcome};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "pipetune",
    version,
    about = "Search for the fastest configuration of a media pipeline"
)]
struct Cli {
    /// Pipeline description; several arguments are joined with spaces
    #[arg(required_unless_present = "dump_config")]
    pipeline: Vec<String>,

    /// Overall search time in seconds
    #[arg(long)]
    search_duration: Option<f64>,

    /// Length of each sample in seconds
    #[arg(long)]
    sample_duration: Option<f64>,

    /// Log filter, e.g. `debug` or `pipetune=trace`
    #[arg(long)]
    log_level: Option<String>,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Config file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the outcome as JSON
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long, default_value_t = false)]
    dump_config: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _log_guard = match init_logging(cli.log_level.as_deref(), cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// `--log-level`, then `RUST_LOG`, then `info`
fn init_logging(level: Option<&str>, file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).context("Invalid --log-level")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let (file_layer, guard) = match file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .with_context(|| format!("Log file path has no file name: {}", path.display()))?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}

fn run(cli: Cli) -> Result<()> {
    let mut config = AutotuneConfig::resolve(cli.config.as_deref())?;
    if let Some(secs) = cli.search_duration {
        config.search.search_duration_secs = secs;
    }
    if let Some(secs) = cli.sample_duration {
        config.search.sample_duration_secs = secs;
    }
    config.validate().context("Invalid command line durations")?;

    if cli.dump_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let text = cli.pipeline.join(" ");
    tracing::info!("Starting pipetune");

    let outcome = search_with_engine(&text, config)?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

#[cfg(feature = "gstreamer")]
fn search_with_engine(text: &str, config: AutotuneConfig) -> Result<SearchOutcome> {
    let engine = pipetune::engine::GstEngine::new().context("Failed to initialize GStreamer")?;
    search(&engine, text, config)
}

#[cfg(not(feature = "gstreamer"))]
fn search_with_engine(_text: &str, _config: AutotuneConfig) -> Result<SearchOutcome> {
    anyhow::bail!(
        "pipetune was built without a pipeline engine; rebuild with `--features gstreamer`"
    )
}

#[cfg_attr(not(feature = "gstreamer"), allow(dead_code))]
fn search<E: PipelineEngine>(
    engine: &E,
    text: &str,
    config: AutotuneConfig,
) -> Result<SearchOutcome> {
    let search_duration = config.search.search_duration();
    let sample_duration = config.search.sample_duration();
    let outcome =
        Orchestrator::new(engine, config).optimize(text, search_duration, sample_duration)?;
    Ok(outcome)
}

fn print_outcome(outcome: &SearchOutcome) {
    println!("Baseline: {:.2} fps", outcome.baseline_fps);
    for phase in &outcome.phases {
        println!(
            "  {:<12} {:>4} sampled  {:>8.2} -> {:>8.2} fps  ({:.1}s{})",
            phase.generator,
            phase.sampled,
            phase.fps_before,
            phase.fps_after,
            phase.elapsed_secs,
            if phase.budget_exhausted { ", budget spent" } else { "" }
        );
    }
    for name in &outcome.skipped {
        println!("  {:<12} skipped", name);
    }
    println!("Best: {:.2} fps ({:.2}x)", outcome.fps, outcome.speedup());
    println!("{}", outcome.pipeline);
}
