//! Command-line driver for the dinosaur ecosystem simulation.

mod telemetry;

use anyhow::{Context, Result};
use clap::Parser;
use dinosim_core::{PopulationStats, ScenarioConfig};
use dinosim_world::{Run, RunReport};
use std::path::PathBuf;
use tracing::{error, info, instrument};

#[derive(Debug, Parser)]
#[command(name = "dinosim", version, about)]
struct Cli {
    /// Scenario file (JSON). The built-in scenario is used when omitted.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Override the scenario's random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override the tick budget
    #[arg(long)]
    ticks: Option<u64>,

    /// Override the simulated seconds per tick
    #[arg(long)]
    dt: Option<f64>,

    /// Override the number of ticks between statistics lines
    #[arg(long)]
    stats_every: Option<u64>,

    /// Print statistics and the final summary as JSON lines, and log as JSON
    #[arg(long)]
    json: bool,

    /// Also write the full run report to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

impl Cli {
    fn scenario(&self) -> Result<ScenarioConfig> {
        let mut scenario = match &self.scenario {
            Some(path) => ScenarioConfig::from_file(path)
                .with_context(|| format!("failed to load scenario {}", path.display()))?,
            None => ScenarioConfig::default(),
        };

        if let Some(seed) = self.seed {
            scenario.seed = seed;
        }
        if let Some(ticks) = self.ticks {
            scenario.max_ticks = ticks;
        }
        if let Some(dt) = self.dt {
            scenario.tick_seconds = dt;
        }
        if let Some(stats_every) = self.stats_every {
            scenario.stats_every = stats_every;
        }
        scenario.validate().context("invalid scenario")?;
        Ok(scenario)
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = telemetry::init_telemetry(cli.json) {
        eprintln!("{err:#}");
        std::process::exit(1);
    }

    if let Err(err) = run_cli(&cli) {
        error!("{err:#}");
        std::process::exit(1);
    }
}

fn run_cli(cli: &Cli) -> Result<()> {
    let scenario = cli.scenario()?;
    info!(
        seed = scenario.seed,
        max_ticks = scenario.max_ticks,
        tick_seconds = scenario.tick_seconds,
        "Starting dinosim"
    );

    let report = simulate(&scenario, cli.json)?;

    if cli.json {
        println!("{}", serde_json::to_string(&report.summary)?);
    } else {
        print_summary(&report);
    }

    if let Some(path) = &cli.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report {}", path.display()))?;
        info!(path = %path.display(), "Report written");
    }

    Ok(())
}

#[instrument(skip_all, fields(seed = scenario.seed))]
fn simulate(scenario: &ScenarioConfig, json: bool) -> Result<RunReport> {
    let mut run = Run::new(scenario).context("failed to set up the world")?;

    while !run.is_over() {
        if let Some(stats) = run.step()? {
            if json {
                println!("{}", serde_json::to_string(&stats)?);
            } else {
                print_stats(&stats);
            }
        }
    }

    Ok(run.finish())
}

fn print_stats(stats: &PopulationStats) {
    let species = stats
        .species
        .iter()
        .map(|(name, s)| format!("{name}={}", s.count))
        .collect::<Vec<_>>()
        .join(" ");
    let ratio = stats
        .predator_prey_ratio
        .map_or_else(|| "-".to_string(), |r| format!("{r:.2}"));

    println!(
        "t={:>8.1}s  total={:<4} predator/prey={:<5} {species}",
        stats.time, stats.total, ratio
    );
}

fn print_summary(report: &RunReport) {
    println!(
        "finished after {} ticks ({:.1}s): {} survivors, {} births, {} deaths",
        report.ticks,
        report.final_time,
        report.survivors.len(),
        report.summary.births,
        report.summary.total_deaths()
    );
    for (cause, count) in &report.summary.deaths {
        println!("  died of {cause:?}: {count}");
    }
    for (species, survival) in &report.summary.avg_survival {
        println!("  {species} average survival: {survival:.1}s");
    }
}
