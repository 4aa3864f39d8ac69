use anyhow::Context as _;
use clap::Parser;
use std::path::PathBuf;

use heartbeat_tracker::compare;

/// Pair editor-reported heartbeats with device-recorded ones and write the result as CSV.
#[derive(Parser)]
#[command(name = "compare-heartbeats")]
struct Cli {
    /// Editor heartbeat export (CSV)
    #[arg(long)]
    vs: PathBuf,

    /// Device heartbeat export (CSV)
    #[arg(long)]
    device: PathBuf,

    /// Time tolerance in seconds for matching
    #[arg(long, default_value_t = compare::DEFAULT_TOLERANCE_SECS)]
    tolerance: f64,

    /// Where to write the comparison
    #[arg(long, default_value = "data/output/comparison-results.csv")]
    output: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_ansi(std::env::var("NO_COLOR").is_err())
        .init();

    let cli = Cli::parse();
    anyhow::ensure!(
        cli.tolerance.is_finite() && cli.tolerance >= 0.0,
        "tolerance must be a non-negative number of seconds"
    );

    let vs = compare::read_entries_from(&cli.vs).context("failed to read editor heartbeats")?;
    let device =
        compare::read_entries_from(&cli.device).context("failed to read device heartbeats")?;
    tracing::info!(vs = vs.len(), device = device.len(), "parsed heartbeats");

    let pairs = compare::match_heartbeats(&vs, &device, cli.tolerance);
    let rows = compare::comparison_rows(&vs, &device, &pairs);
    compare::write_comparison_to(&cli.output, &rows)?;

    let summary = compare::summarize(&rows);
    tracing::info!(
        matched = summary.matched,
        vs_only = summary.vs_only,
        device_only = summary.device_only,
        output = %cli.output.display(),
        "comparison written"
    );

    Ok(())
}
