//! Snapshots of agents and the statistics aggregated from them.

use crate::{Diet, Gender, SimulationTime, Vector2D};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Why an agent left the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeathCause {
    Hunger,
    Thirst,
    /// Killed and eaten by a hunter
    Eaten,
}

/// Immutable copy of one agent, handed to collectors outside the simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: u64,
    pub species: String,
    pub diet: Diet,
    pub gender: Gender,
    pub position: Vector2D,
    pub nutrition: f64,
    pub max_nutrition: f64,
    pub hydration: f64,
    pub max_hydration: f64,
    pub strength: f64,
    pub reproduction_value: f64,
    pub time_of_birth: SimulationTime,
    pub state: String,
    pub death_cause: Option<DeathCause>,
}

impl AgentSnapshot {
    pub fn age(&self, now: SimulationTime) -> f64 {
        (now - self.time_of_birth).max(0.0)
    }
}

/// Per-species aggregate at one point in time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpeciesStats {
    pub count: usize,
    pub avg_nutrition: f64,
    pub avg_hydration: f64,
    pub avg_age: f64,
}

/// Population aggregate computed from a snapshot of all live agents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PopulationStats {
    pub time: SimulationTime,
    pub total: usize,
    pub species: BTreeMap<String, SpeciesStats>,
    pub predators: usize,
    pub prey: usize,
    /// `predators / prey`, or `None` while there is no prey
    pub predator_prey_ratio: Option<f64>,
}

impl PopulationStats {
    pub fn collect(time: SimulationTime, agents: &[AgentSnapshot]) -> Self {
        let mut species: BTreeMap<String, SpeciesStats> = BTreeMap::new();
        let mut predators = 0;
        let mut prey = 0;

        for agent in agents {
            let entry = species.entry(agent.species.clone()).or_default();
            let n = entry.count as f64;
            let new_n = n + 1.0;

            // Incremental means
            entry.avg_nutrition = (entry.avg_nutrition * n + agent.nutrition) / new_n;
            entry.avg_hydration = (entry.avg_hydration * n + agent.hydration) / new_n;
            entry.avg_age = (entry.avg_age * n + agent.age(time)) / new_n;
            entry.count += 1;

            if agent.diet.eats_meat() {
                predators += 1;
            }
            if agent.diet == Diet::Herbivore {
                prey += 1;
            }
        }

        Self {
            time,
            total: agents.len(),
            species,
            predators,
            prey,
            predator_prey_ratio: (prey > 0).then(|| predators as f64 / prey as f64),
        }
    }
}

/// Totals accumulated over a whole run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub births: u64,
    pub deaths: BTreeMap<DeathCause, u64>,
    /// Mean survival duration of removed agents, per species
    pub avg_survival: BTreeMap<String, f64>,
    removed_per_species: BTreeMap<String, u64>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_birth(&mut self) {
        self.births += 1;
    }

    /// Account for an agent removed at time `now`
    pub fn record_removal(&mut self, agent: &AgentSnapshot, now: SimulationTime) {
        if let Some(cause) = agent.death_cause {
            *self.deaths.entry(cause).or_insert(0) += 1;
        }

        let count = self
            .removed_per_species
            .entry(agent.species.clone())
            .or_insert(0);
        let avg = self.avg_survival.entry(agent.species.clone()).or_insert(0.0);
        let n = *count as f64;
        *avg = (*avg * n + agent.age(now)) / (n + 1.0);
        *count += 1;
    }

    pub fn total_deaths(&self) -> u64 {
        self.deaths.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(species: &str, diet: Diet, nutrition: f64, born: f64) -> AgentSnapshot {
        AgentSnapshot {
            id: 0,
            species: species.to_string(),
            diet,
            gender: Gender::Female,
            position: Vector2D::ZERO,
            nutrition,
            max_nutrition: 100.0,
            hydration: 50.0,
            max_hydration: 100.0,
            strength: 1.0,
            reproduction_value: 0.0,
            time_of_birth: born,
            state: "Stand".to_string(),
            death_cause: None,
        }
    }

    #[test]
    fn test_population_stats() {
        let agents = vec![
            snapshot("Triceratops", Diet::Herbivore, 40.0, 0.0),
            snapshot("Triceratops", Diet::Herbivore, 60.0, 4.0),
            snapshot("Tyrannosaurus", Diet::Carnivore, 90.0, 2.0),
        ];

        let stats = PopulationStats::collect(10.0, &agents);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.predators, 1);
        assert_eq!(stats.prey, 2);
        assert_eq!(stats.predator_prey_ratio, Some(0.5));

        let tri = &stats.species["Triceratops"];
        assert_eq!(tri.count, 2);
        assert_eq!(tri.avg_nutrition, 50.0);
        assert_eq!(tri.avg_age, 8.0);
    }

    #[test]
    fn test_ratio_without_prey() {
        let agents = vec![snapshot("Tyrannosaurus", Diet::Carnivore, 90.0, 0.0)];
        let stats = PopulationStats::collect(1.0, &agents);
        assert_eq!(stats.predator_prey_ratio, None);
        assert_eq!(PopulationStats::collect(0.0, &[]).total, 0);
    }

    #[test]
    fn test_run_summary() {
        let mut summary = RunSummary::new();
        let mut a = snapshot("Triceratops", Diet::Herbivore, 0.0, 0.0);
        a.death_cause = Some(DeathCause::Hunger);
        let mut b = snapshot("Triceratops", Diet::Herbivore, 10.0, 2.0);
        b.death_cause = Some(DeathCause::Eaten);

        summary.record_removal(&a, 10.0);
        summary.record_removal(&b, 10.0);
        summary.record_birth();

        assert_eq!(summary.births, 1);
        assert_eq!(summary.total_deaths(), 2);
        assert_eq!(summary.deaths[&DeathCause::Hunger], 1);
        assert_eq!(summary.avg_survival["Triceratops"], 9.0);
    }
}
