//! Configuration types for the simulation.

use crate::{Diet, Error, Mobility, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// World grid configuration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Width of the world grid, in tiles
    pub width: i32,
    /// Height of the world grid, in tiles
    pub height: i32,
    /// Edge length of a tile, in pixels
    pub tile_size: f64,
    /// Water density (0.0 to 1.0)
    pub water_density: f32,
    /// Mountain density (0.0 to 1.0)
    pub mountain_density: f32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: 48,
            height: 32,
            tile_size: 16.0,
            water_density: 0.06,
            mountain_density: 0.04,
        }
    }
}

/// Tunables shared by every agent behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Fraction of max nutrition at or below which an agent looks for food
    pub hunger_threshold: f64,
    /// Fraction of max hydration at or below which an agent looks for water
    pub thirst_threshold: f64,
    /// Nutrition lost per second
    pub nutrition_decay: f64,
    /// Hydration lost per second
    pub hydration_decay: f64,
    /// Reproduction value gained per second (capped at 100)
    pub reproduction_rate: f64,
    /// Shortest idle time in Stand, seconds
    pub stand_min_wait: f64,
    /// Longest idle time in Stand, seconds
    pub stand_max_wait: f64,
    /// Time spent eating or drinking, seconds
    pub ingestion_duration: f64,
    /// Time spent mating, seconds
    pub mating_duration: f64,
    /// Attempts made when sampling a random movement target
    pub random_target_attempts: u32,
    /// Half-angle of the cone used when fleeing, radians
    pub escape_cone_half_angle: f64,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            hunger_threshold: 0.5,
            thirst_threshold: 0.5,
            nutrition_decay: 1.0,
            hydration_decay: 1.5,
            reproduction_rate: 2.0,
            stand_min_wait: 0.5,
            stand_max_wait: 2.0,
            ingestion_duration: 1.5,
            mating_duration: 1.0,
            random_target_attempts: 16,
            escape_cone_half_angle: std::f64::consts::FRAC_PI_4,
        }
    }
}

/// A parameter sampled uniformly within `mean ± variance`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamRange {
    pub mean: f64,
    #[serde(default)]
    pub variance: f64,
}

impl ParamRange {
    pub fn new(mean: f64, variance: f64) -> Self {
        Self { mean, variance }
    }

    pub fn fixed(value: f64) -> Self {
        Self::new(value, 0.0)
    }

    pub fn min(&self) -> f64 {
        self.mean - self.variance
    }

    pub fn max(&self) -> f64 {
        self.mean + self.variance
    }
}

/// One dinosaur species in a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesConfig {
    pub name: String,
    pub count: usize,
    pub diet: Diet,
    #[serde(default)]
    pub can_swim: bool,
    #[serde(default)]
    pub can_climb: bool,
    pub max_nutrition: ParamRange,
    pub max_hydration: ParamRange,
    pub strength: ParamRange,
    /// Pixels per second
    pub speed: ParamRange,
    pub view_range: ParamRange,
    pub interaction_range: ParamRange,
}

impl SpeciesConfig {
    pub fn mobility(&self) -> Mobility {
        Mobility::new(self.can_swim, self.can_climb)
    }
}

/// One plant species in a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlantConfig {
    pub name: String,
    pub count: usize,
    /// Growth units per second
    pub growth_rate: f64,
    pub interaction_range: f64,
    /// Growth at scenario start
    #[serde(default)]
    pub initial_growth: f64,
}

/// Everything needed to start a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Simulated seconds per tick
    pub tick_seconds: f64,
    /// Step budget; the run ends when it is exhausted
    pub max_ticks: u64,
    /// Ticks between statistics snapshots
    pub stats_every: u64,
    pub grid: GridConfig,
    pub behavior: BehaviorConfig,
    pub species: Vec<SpeciesConfig>,
    pub plants: Vec<PlantConfig>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            tick_seconds: 0.1,
            max_ticks: 3_000,
            stats_every: 100,
            grid: GridConfig::default(),
            behavior: BehaviorConfig::default(),
            species: vec![
                SpeciesConfig {
                    name: "Triceratops".to_string(),
                    count: 12,
                    diet: Diet::Herbivore,
                    can_swim: false,
                    can_climb: false,
                    max_nutrition: ParamRange::new(100.0, 10.0),
                    max_hydration: ParamRange::new(100.0, 10.0),
                    strength: ParamRange::new(4.0, 1.0),
                    speed: ParamRange::new(30.0, 5.0),
                    view_range: ParamRange::new(120.0, 20.0),
                    interaction_range: ParamRange::fixed(8.0),
                },
                SpeciesConfig {
                    name: "Pteranodon".to_string(),
                    count: 6,
                    diet: Diet::Omnivore,
                    can_swim: true,
                    can_climb: true,
                    max_nutrition: ParamRange::new(80.0, 10.0),
                    max_hydration: ParamRange::new(80.0, 10.0),
                    strength: ParamRange::new(3.0, 1.0),
                    speed: ParamRange::new(45.0, 5.0),
                    view_range: ParamRange::new(160.0, 20.0),
                    interaction_range: ParamRange::fixed(6.0),
                },
                SpeciesConfig {
                    name: "Tyrannosaurus".to_string(),
                    count: 3,
                    diet: Diet::Carnivore,
                    can_swim: false,
                    can_climb: false,
                    max_nutrition: ParamRange::new(150.0, 15.0),
                    max_hydration: ParamRange::new(120.0, 10.0),
                    strength: ParamRange::new(8.0, 1.0),
                    speed: ParamRange::new(38.0, 4.0),
                    view_range: ParamRange::new(150.0, 20.0),
                    interaction_range: ParamRange::fixed(10.0),
                },
            ],
            plants: vec![PlantConfig {
                name: "Fern".to_string(),
                count: 40,
                growth_rate: 8.0,
                interaction_range: 5.0,
                initial_growth: 100.0,
            }],
        }
    }
}

impl ScenarioConfig {
    /// Load a scenario from a JSON file and validate it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: ScenarioConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.grid.width <= 0 || self.grid.height <= 0 {
            return invalid(format!(
                "grid must have positive dimensions, got {}x{}",
                self.grid.width, self.grid.height
            ));
        }
        check_positive("grid.tile_size", self.grid.tile_size)?;
        check_fraction("grid.water_density", self.grid.water_density as f64)?;
        check_fraction("grid.mountain_density", self.grid.mountain_density as f64)?;
        if self.grid.water_density + self.grid.mountain_density > 1.0 {
            return invalid("water and mountain densities must sum to at most 1.0");
        }
        check_positive("tick_seconds", self.tick_seconds)?;
        if self.stats_every == 0 {
            return invalid("stats_every must be positive");
        }

        let b = &self.behavior;
        check_fraction("behavior.hunger_threshold", b.hunger_threshold)?;
        check_fraction("behavior.thirst_threshold", b.thirst_threshold)?;
        check_non_negative("behavior.nutrition_decay", b.nutrition_decay)?;
        check_non_negative("behavior.hydration_decay", b.hydration_decay)?;
        check_non_negative("behavior.reproduction_rate", b.reproduction_rate)?;
        check_non_negative("behavior.stand_min_wait", b.stand_min_wait)?;
        if b.stand_max_wait < b.stand_min_wait {
            return invalid("behavior.stand_max_wait must not be below stand_min_wait");
        }
        check_non_negative("behavior.ingestion_duration", b.ingestion_duration)?;
        check_non_negative("behavior.mating_duration", b.mating_duration)?;
        if b.random_target_attempts == 0 {
            return invalid("behavior.random_target_attempts must be positive");
        }
        check_positive("behavior.escape_cone_half_angle", b.escape_cone_half_angle)?;

        for species in &self.species {
            let name = &species.name;
            if name.is_empty() {
                return invalid("species name must not be empty");
            }
            check_range(name, "max_nutrition", species.max_nutrition)?;
            check_range(name, "max_hydration", species.max_hydration)?;
            check_range(name, "strength", species.strength)?;
            check_range(name, "speed", species.speed)?;
            check_range(name, "view_range", species.view_range)?;
            check_range(name, "interaction_range", species.interaction_range)?;
        }

        for plant in &self.plants {
            if plant.name.is_empty() {
                return invalid("plant name must not be empty");
            }
            check_non_negative(&format!("{}.growth_rate", plant.name), plant.growth_rate)?;
            check_positive(
                &format!("{}.interaction_range", plant.name),
                plant.interaction_range,
            )?;
            check_non_negative(&format!("{}.initial_growth", plant.name), plant.initial_growth)?;
        }

        let mut names: Vec<&str> = self
            .species
            .iter()
            .map(|s| s.name.as_str())
            .chain(self.plants.iter().map(|p| p.name.as_str()))
            .collect();
        names.sort_unstable();
        if let Some(pair) = names.windows(2).find(|pair| pair[0] == pair[1]) {
            return invalid(format!("duplicate species name {:?}", pair[0]));
        }

        Ok(())
    }

    pub fn species(&self, name: &str) -> Option<&SpeciesConfig> {
        self.species.iter().find(|s| s.name == name)
    }
}

fn invalid<T>(message: impl Into<String>) -> Result<T> {
    Err(Error::Validation(message.into()))
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if !(value.is_finite() && value > 0.0) {
        return invalid(format!("{name} must be positive, but is {value}"));
    }
    Ok(())
}

fn check_non_negative(name: &str, value: f64) -> Result<()> {
    if !(value.is_finite() && value >= 0.0) {
        return invalid(format!("{name} must be non-negative, but is {value}"));
    }
    Ok(())
}

fn check_fraction(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return invalid(format!("{name} must be in the range 0.0..=1.0, but is {value}"));
    }
    Ok(())
}

fn check_range(species: &str, param: &str, range: ParamRange) -> Result<()> {
    check_non_negative(&format!("{species}.{param}.variance"), range.variance)?;
    if !(range.min().is_finite() && range.min() > 0.0) {
        return invalid(format!(
            "{species}.{param} must stay positive, but mean {} - variance {} is {}",
            range.mean,
            range.variance,
            range.min()
        ));
    }
    Ok(())
}
