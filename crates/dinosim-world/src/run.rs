//! A complete run of one scenario: ticking, births, statistics and the final report.

use crate::simulation::Simulation;
use dinosim_core::{AgentSnapshot, PopulationStats, Result, RunSummary, ScenarioConfig};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Drives a [`Simulation`] and collects everything observed along the way
pub struct Run {
    sim: Simulation,
    tick_seconds: f64,
    max_ticks: u64,
    stats_every: u64,
    summary: RunSummary,
    history: Vec<PopulationStats>,
}

impl Run {
    pub fn new(scenario: &ScenarioConfig) -> Result<Self> {
        let sim = Simulation::from_scenario(scenario)?;
        Ok(Self {
            sim,
            tick_seconds: scenario.tick_seconds,
            max_ticks: scenario.max_ticks,
            stats_every: scenario.stats_every.max(1),
            summary: RunSummary::new(),
            history: Vec::new(),
        })
    }

    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    pub fn is_over(&self) -> bool {
        self.sim.is_over(self.max_ticks)
    }

    /// Advance one tick. Returns fresh statistics whenever a sampling point is reached.
    pub fn step(&mut self) -> Result<Option<PopulationStats>> {
        self.sim.tick(self.tick_seconds)?;

        for request in self.sim.drain_birth_requests() {
            self.sim.spawn_offspring(&request)?;
            self.summary.record_birth();
        }
        let now = self.sim.time();
        for removed in self.sim.drain_removed() {
            self.summary.record_removal(&removed, now);
        }

        if self.sim.ticks() % self.stats_every != 0 {
            return Ok(None);
        }
        let stats = PopulationStats::collect(now, &self.sim.snapshot());
        info!(
            event = "population_metrics",
            tick = self.sim.ticks(),
            total_population = stats.total,
            predators = stats.predators,
            prey = stats.prey,
            "Population metrics snapshot"
        );
        self.history.push(stats.clone());
        Ok(Some(stats))
    }

    /// Stop here and build the report
    pub fn finish(self) -> RunReport {
        let survivors = self.sim.snapshot();
        let report = RunReport {
            ticks: self.sim.ticks(),
            final_time: self.sim.time(),
            summary: self.summary,
            history: self.history,
            survivors,
        };

        info!(
            event = "run_summary",
            total_ticks = report.ticks,
            final_time = report.final_time,
            survivors = report.survivors.len(),
            births = report.summary.births,
            deaths = report.summary.total_deaths(),
            "Run complete"
        );
        report
    }

    /// Tick until the run is over
    #[instrument(skip(self), fields(max_ticks = self.max_ticks))]
    pub fn execute(mut self) -> Result<RunReport> {
        while !self.is_over() {
            self.step()?;
        }
        Ok(self.finish())
    }
}

/// Result of a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub ticks: u64,
    pub final_time: f64,
    pub summary: RunSummary,
    pub history: Vec<PopulationStats>,
    pub survivors: Vec<AgentSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> ScenarioConfig {
        let mut scenario = ScenarioConfig {
            seed: 42,
            max_ticks: 200,
            stats_every: 50,
            ..Default::default()
        };
        scenario.grid.width = 24;
        scenario.grid.height = 16;
        scenario
    }

    #[test]
    fn test_run_execution() {
        let report = Run::new(&scenario()).unwrap().execute().unwrap();

        assert!(report.ticks <= 200);
        assert!(!report.history.is_empty());
        assert!(report.history.len() <= 4);
        assert!(report.history.windows(2).all(|w| w[0].time < w[1].time));
    }

    #[test]
    fn test_run_ends_when_everyone_is_dead() {
        let mut scenario = scenario();
        scenario.behavior.hydration_decay = 1_000.0;
        let report = Run::new(&scenario).unwrap().execute().unwrap();

        assert!(report.survivors.is_empty());
        assert!(report.ticks < 200);
        assert!(report.summary.total_deaths() > 0);
    }
}
