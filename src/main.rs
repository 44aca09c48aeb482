//! Dispatch simulator entry point: CLI wiring and config-driven runs.

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use flex_dispatch::config::ScenarioConfig;
use flex_dispatch::io::export::{export_csv, write_schedule_csv};
use flex_dispatch::runner::run_scenario;

#[derive(Parser)]
#[command(name = "flex-dispatch")]
#[command(author, version, about = "Rolling-horizon dispatch planning for storage and load shifting")]
#[command(
    long_about = "Plans and dispatches a storage device or a load-shifting portfolio against a \
    repeating price profile.\n\
    \nIf neither --config nor --preset is given, the arbitrage preset is used.\n\
    \nExamples:\n  \
    flex-dispatch --preset heuristic\n  \
    flex-dispatch --config scenario.toml --periods 168 --out steps.csv"
)]
struct Cli {
    /// Load the scenario from a TOML file
    #[arg(long, conflicts_with = "preset")]
    config: Option<PathBuf>,

    /// Use a built-in preset (arbitrage, system_cost, price_taker, heuristic, load_shift)
    #[arg(long)]
    preset: Option<String>,

    /// Override the number of simulated periods
    #[arg(long)]
    periods: Option<usize>,

    /// Override the forecast error seed
    #[arg(long)]
    seed: Option<u64>,

    /// Export step results to CSV
    #[arg(long)]
    out: Option<PathBuf>,

    /// Print the schedule held at the end of the run as CSV
    #[arg(long)]
    print_schedule: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // --config takes priority over --preset, then the arbitrage default
    let mut scenario = match (&cli.config, &cli.preset) {
        (Some(path), _) => ScenarioConfig::from_toml_file(path)?,
        (None, Some(name)) => ScenarioConfig::from_preset(name)?,
        (None, None) => ScenarioConfig::arbitrage(),
    };
    if let Some(periods) = cli.periods {
        scenario.simulation.periods = periods;
    }
    if let Some(seed) = cli.seed {
        scenario.simulation.seed = seed;
    }

    let errors = scenario.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        bail!("invalid scenario ({} errors)", errors.len());
    }

    let output = run_scenario(&scenario).context("planning failed")?;

    for r in &output.results {
        println!("{r}");
    }
    println!("\n{}", output.kpi);

    if cli.print_schedule {
        if let Some(schedule) = &output.last_schedule {
            println!();
            write_schedule_csv(schedule, std::io::stdout()).context("failed to print schedule")?;
        }
    }

    if let Some(path) = &cli.out {
        export_csv(&output.results, path).with_context(|| format!("failed to write {}", path.display()))?;
        eprintln!("Step results written to {}", path.display());
    }

    Ok(())
}
