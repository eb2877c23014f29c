use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use mac_bearer::simulation::{self, Scenario};
use tracing::level_filters::LevelFilter;

/// Replays a logical channel scenario slot by slot and prints a JSON report.
#[derive(Parser, Debug)]
#[command(name = "lcsim", version, about)]
struct Cli {
    /// Scenario file (TOML).
    #[arg(long, short)]
    scenario: PathBuf,
    /// Number of slots to run. Defaults to the scenario's `slots`.
    #[arg(long)]
    slots: Option<u64>,
    /// Log verbosity; `RUST_LOG` directives take precedence.
    #[arg(long, env = "LOG_LEVEL", default_value_t = LevelFilter::WARN)]
    log_level: LevelFilter,
    /// Pretty-print the report.
    #[arg(long)]
    pretty: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    mac_bearer::config::set_logger(Some(cli.log_level));

    let scenario = Scenario::load_from_file(&cli.scenario)
        .with_context(|| format!("failed to load scenario {}", cli.scenario.display()))?;
    let report = simulation::run(&scenario, cli.slots).context("simulation failed")?;

    let output = if cli.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{output}");
    Ok(())
}
