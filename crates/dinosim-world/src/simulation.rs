//! Simulation engine driving every entity's state machine.

use crate::entity::{Agent, AgentParams, Entity, EntityId, Resource};
use crate::fsm::{StateId, StateMachine};
use crate::grid::WorldGrid;
use crate::states::StateFactory;
use dinosim_core::{
    AgentSnapshot, BehaviorConfig, Error, Gender, Mobility, ParamRange, Result, ScenarioConfig,
    SimulationTime, SpeciesConfig, Vector2D,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use slotmap::{SecondaryMap, SlotMap};
use tracing::{debug, info, instrument, trace};

/// Attempts made to find a free spot when placing an entity
const PLACEMENT_ATTEMPTS: usize = 100;

/// Offspring to be created by the driver after a completed mating
#[derive(Debug, Clone)]
pub struct BirthRequest {
    pub mother: EntityId,
    pub father: Option<EntityId>,
    pub position: Vector2D,
    /// Inherited parameters; the child's gender is rolled at spawn
    pub params: AgentParams,
}

pub struct Simulation {
    grid: WorldGrid,
    entities: SlotMap<EntityId, Entity>,
    machines: SecondaryMap<EntityId, StateMachine>,
    /// Update order, which is insertion order
    order: Vec<EntityId>,
    /// Positions captured at the start of the current tick
    tick_positions: SecondaryMap<EntityId, Vector2D>,
    pending_removal: Vec<EntityId>,
    removed: Vec<AgentSnapshot>,
    birth_requests: Vec<BirthRequest>,
    config: BehaviorConfig,
    rng: ChaCha8Rng,
    time: SimulationTime,
    tick: u64,
}

impl Simulation {
    pub fn new(grid: WorldGrid, config: BehaviorConfig, rng: ChaCha8Rng) -> Self {
        Self {
            grid,
            entities: SlotMap::with_key(),
            machines: SecondaryMap::new(),
            order: Vec::new(),
            tick_positions: SecondaryMap::new(),
            pending_removal: Vec::new(),
            removed: Vec::new(),
            birth_requests: Vec::new(),
            config,
            rng,
            time: 0.0,
            tick: 0,
        }
    }

    pub fn with_seed(grid: WorldGrid, config: BehaviorConfig, seed: u64) -> Self {
        Self::new(grid, config, ChaCha8Rng::seed_from_u64(seed))
    }

    /// Generate the world for a scenario and populate it
    pub fn from_scenario(scenario: &ScenarioConfig) -> Result<Self> {
        scenario.validate()?;
        let mut rng = ChaCha8Rng::seed_from_u64(scenario.seed);
        let grid = WorldGrid::from_config(&scenario.grid, &mut rng);
        let mut sim = Self::new(grid, scenario.behavior.clone(), rng);
        sim.populate(scenario)?;
        Ok(sim)
    }

    /// Spawn every species and plant of the scenario at random passable spots
    #[instrument(
        skip_all,
        fields(species = scenario.species.len(), plants = scenario.plants.len())
    )]
    pub fn populate(&mut self, scenario: &ScenarioConfig) -> Result<()> {
        for species in &scenario.species {
            for _ in 0..species.count {
                let params = self.sample_params(species);
                let position = self.random_spawn_position(species.mobility(), &species.name)?;
                self.spawn_agent(params, position)?;
            }
        }

        for plant in &scenario.plants {
            for _ in 0..plant.count {
                let position = self.random_spawn_position(Mobility::default(), &plant.name)?;
                self.spawn_resource(Resource::new(
                    plant.name.as_str(),
                    position,
                    plant.interaction_range,
                    plant.growth_rate,
                    plant.initial_growth,
                ))?;
            }
        }

        info!(
            event = "world_populated",
            agents = self.agent_count(),
            entities = self.entities.len(),
            "World populated"
        );
        Ok(())
    }

    fn sample_params(&mut self, species: &SpeciesConfig) -> AgentParams {
        let gender = if self.rng.gen_bool(0.5) {
            Gender::Male
        } else {
            Gender::Female
        };
        AgentParams {
            species: species.name.clone(),
            diet: species.diet,
            gender,
            max_nutrition: self.sample(species.max_nutrition),
            max_hydration: self.sample(species.max_hydration),
            strength: self.sample(species.strength),
            speed: self.sample(species.speed),
            view_range: self.sample(species.view_range),
            interaction_range: self.sample(species.interaction_range),
            can_swim: species.can_swim,
            can_climb: species.can_climb,
        }
    }

    fn sample(&mut self, range: ParamRange) -> f64 {
        if range.variance > 0.0 {
            self.rng.gen_range(range.min()..=range.max())
        } else {
            range.mean
        }
    }

    fn random_spawn_position(&mut self, mobility: Mobility, name: &str) -> Result<Vector2D> {
        for _ in 0..PLACEMENT_ATTEMPTS {
            let position = Vector2D::new(
                self.rng.gen_range(0.0..self.grid.pixel_width()),
                self.rng.gen_range(0.0..self.grid.pixel_height()),
            );
            if self.grid.is_passable(position, mobility) {
                return Ok(position);
            }
        }

        Err(Error::Placement(format!(
            "no passable spot for {name} after {PLACEMENT_ATTEMPTS} attempts"
        )))
    }

    /// Add an agent in its initial Stand state
    pub fn spawn_agent(&mut self, params: AgentParams, position: Vector2D) -> Result<EntityId> {
        let agent = Agent::new(params, position, self.time);
        self.insert(Entity::Agent(agent), StateId::Stand)
    }

    /// Add a plant, starting as Grown when it already is
    pub fn spawn_resource(&mut self, resource: Resource) -> Result<EntityId> {
        let initial = if resource.is_grown() {
            StateId::Grown
        } else {
            StateId::Growing
        };
        self.insert(Entity::Resource(resource), initial)
    }

    /// Create the child described by a birth request, with a random gender
    pub fn spawn_offspring(&mut self, request: &BirthRequest) -> Result<EntityId> {
        let mut params = request.params.clone();
        params.gender = if self.rng.gen_bool(0.5) {
            Gender::Male
        } else {
            Gender::Female
        };

        let id = self.spawn_agent(params, request.position)?;
        debug!(
            event = "birth",
            child = id.as_u64(),
            mother = request.mother.as_u64(),
            father = request.father.map(|f| f.as_u64()),
            "Offspring born"
        );
        Ok(id)
    }

    fn insert(&mut self, entity: Entity, initial: StateId) -> Result<EntityId> {
        let state = StateFactory::create(initial, &entity)?;
        let id = self.entities.insert(entity);
        self.order.push(id);

        let mut machine = StateMachine::new(state);
        machine.start(self, id);
        self.machines.insert(id, machine);
        Ok(id)
    }

    /// Advance the world by `dt` seconds.
    ///
    /// Entities run in insertion order. Each one first follows at most one transition,
    /// then updates its current state, then pays its metabolism. Dead agents leave the
    /// world once every entity has had its turn.
    pub fn tick(&mut self, dt: f64) -> Result<()> {
        self.capture_positions();

        let order = self.order.clone();
        for id in order {
            self.process_entity(id, dt)?;
        }

        self.flush_removals();
        self.time += dt;
        self.tick += 1;
        Ok(())
    }

    fn capture_positions(&mut self) {
        self.tick_positions.clear();
        for (id, entity) in &self.entities {
            self.tick_positions.insert(id, entity.position());
        }
    }

    fn process_entity(&mut self, id: EntityId, dt: f64) -> Result<()> {
        if self.is_pending_removal(id) {
            return Ok(());
        }
        let Some(mut machine) = self.machines.remove(id) else {
            return Ok(());
        };

        let checked = machine.check_transitions(self, id);
        if checked.is_ok() {
            machine.update(self, id, dt);
        }
        let is_dead = machine.current_id() == StateId::Dead;
        self.machines.insert(id, machine);
        checked?;

        if !is_dead {
            self.metabolize(id, dt);
        }
        Ok(())
    }

    fn metabolize(&mut self, id: EntityId, dt: f64) {
        let (nutrition_decay, hydration_decay, reproduction_rate) = (
            self.config.nutrition_decay,
            self.config.hydration_decay,
            self.config.reproduction_rate,
        );
        if let Some(agent) = self.agent_mut(id) {
            agent.metabolize(dt, nutrition_decay, hydration_decay, reproduction_rate);
        }
    }

    fn flush_removals(&mut self) {
        for id in std::mem::take(&mut self.pending_removal) {
            let Some(entity) = self.entities.remove(id) else {
                continue;
            };
            self.machines.remove(id);
            self.tick_positions.remove(id);
            self.order.retain(|other| *other != id);
            self.clear_references_to(id);

            if let Entity::Agent(agent) = entity {
                let snapshot = agent.snapshot(id, &StateId::Dead.to_string());
                debug!(
                    event = "agent_removed",
                    entity = snapshot.id,
                    species = %snapshot.species,
                    cause = ?snapshot.death_cause,
                    age = snapshot.age(self.time),
                    "Agent died"
                );
                self.removed.push(snapshot);
            }
        }
    }

    fn clear_references_to(&mut self, id: EntityId) {
        for (_, entity) in self.entities.iter_mut() {
            let Entity::Agent(agent) = entity else {
                continue;
            };
            if agent.target == Some(id) {
                agent.target = None;
            }
            if agent.partner == Some(id) {
                agent.partner = None;
            }
            if agent.hunter == Some(id) {
                agent.hunter = None;
                agent.is_chased = false;
                agent.is_forced_no_op = false;
            }
        }
    }

    /// Force an entity into `target`, running the usual exit and entry hooks.
    ///
    /// Fails for the entity whose own turn is in progress, since its machine is
    /// detached while it runs.
    pub fn set_state(&mut self, id: EntityId, target: StateId) -> Result<()> {
        let entity = self
            .entities
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("entity {}", id.as_u64())))?;
        let next = StateFactory::create(target, entity)?;
        let mut machine = self
            .machines
            .remove(id)
            .ok_or_else(|| Error::NotFound(format!("state machine of entity {}", id.as_u64())))?;

        machine.set_state(next, self, id);
        self.machines.insert(id, machine);
        trace!(entity = id.as_u64(), %target, "state forced");
        Ok(())
    }

    pub(crate) fn mark_for_removal(&mut self, id: EntityId) {
        if !self.pending_removal.contains(&id) {
            self.pending_removal.push(id);
        }
    }

    pub(crate) fn request_birth(&mut self, request: BirthRequest) {
        self.birth_requests.push(request);
    }

    pub(crate) fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    pub fn is_pending_removal(&self, id: EntityId) -> bool {
        self.pending_removal.contains(&id)
    }

    /// Live entities in update order
    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> + '_ {
        self.order
            .iter()
            .filter_map(move |&id| self.entities.get(id).map(|entity| (id, entity)))
    }

    pub fn agents(&self) -> impl Iterator<Item = (EntityId, &Agent)> + '_ {
        self.entities()
            .filter_map(|(id, entity)| entity.as_agent().map(|agent| (id, agent)))
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    pub fn agent(&self, id: EntityId) -> Option<&Agent> {
        self.entities.get(id).and_then(Entity::as_agent)
    }

    pub fn agent_mut(&mut self, id: EntityId) -> Option<&mut Agent> {
        self.entities.get_mut(id).and_then(Entity::as_agent_mut)
    }

    pub fn resource(&self, id: EntityId) -> Option<&Resource> {
        self.entities.get(id).and_then(Entity::as_resource)
    }

    pub fn resource_mut(&mut self, id: EntityId) -> Option<&mut Resource> {
        self.entities.get_mut(id).and_then(Entity::as_resource_mut)
    }

    /// Where `id` stood when the tick began, or its live position outside a tick
    pub fn position_of(&self, id: EntityId) -> Option<Vector2D> {
        self.tick_positions
            .get(id)
            .copied()
            .or_else(|| self.entities.get(id).map(Entity::position))
    }

    pub fn machine(&self, id: EntityId) -> Option<&StateMachine> {
        self.machines.get(id)
    }

    pub fn state_of(&self, id: EntityId) -> Option<StateId> {
        self.machines.get(id).map(StateMachine::current_id)
    }

    pub fn agent_count(&self) -> usize {
        self.entities.values().filter(|e| e.as_agent().is_some()).count()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Copies of all live agents
    pub fn snapshot(&self) -> Vec<AgentSnapshot> {
        self.agents()
            .map(|(id, agent)| {
                let state = self.state_of(id).map(|s| s.to_string()).unwrap_or_default();
                agent.snapshot(id, &state)
            })
            .collect()
    }

    /// Agents removed since the last call
    pub fn drain_removed(&mut self) -> Vec<AgentSnapshot> {
        std::mem::take(&mut self.removed)
    }

    /// Births requested since the last call
    pub fn drain_birth_requests(&mut self) -> Vec<BirthRequest> {
        std::mem::take(&mut self.birth_requests)
    }

    /// Run over: no agents left or the tick budget is spent
    pub fn is_over(&self, max_ticks: u64) -> bool {
        self.agent_count() == 0 || self.tick >= max_ticks
    }

    pub fn time(&self) -> SimulationTime {
        self.time
    }

    pub fn ticks(&self) -> u64 {
        self.tick
    }

    pub fn grid(&self) -> &WorldGrid {
        &self.grid
    }

    pub fn config(&self) -> &BehaviorConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::tests::params;
    use dinosim_core::Diet;
    use proptest::prelude::*;

    fn small_scenario(seed: u64) -> ScenarioConfig {
        let mut scenario = ScenarioConfig {
            seed,
            ..Default::default()
        };
        scenario.grid.width = 24;
        scenario.grid.height = 16;
        for species in &mut scenario.species {
            species.count = species.count.min(4);
        }
        scenario.plants[0].count = 10;
        scenario
    }

    #[test]
    fn test_simulation_creation() {
        let scenario = small_scenario(42);
        let sim = Simulation::from_scenario(&scenario).unwrap();

        let expected: usize = scenario.species.iter().map(|s| s.count).sum();
        assert_eq!(sim.agent_count(), expected);
        assert_eq!(sim.entity_count(), expected + 10);
        assert_eq!(sim.time(), 0.0);

        for (id, agent) in sim.agents() {
            assert!(sim.grid().is_passable(agent.position(), agent.mobility()));
            assert_eq!(sim.state_of(id), Some(StateId::Stand));
            let species = scenario.species(&agent.body.species).unwrap();
            assert!(
                agent.strength >= species.strength.min()
                    && agent.strength <= species.strength.max()
            );
        }
    }

    #[test]
    fn test_same_seed_same_run() {
        let scenario = small_scenario(9);
        let mut a = Simulation::from_scenario(&scenario).unwrap();
        let mut b = Simulation::from_scenario(&scenario).unwrap();

        for _ in 0..50 {
            a.tick(scenario.tick_seconds).unwrap();
            b.tick(scenario.tick_seconds).unwrap();
        }

        let positions = |sim: &Simulation| {
            sim.snapshot()
                .into_iter()
                .map(|s| (s.position, s.state))
                .collect::<Vec<_>>()
        };
        assert_eq!(positions(&a), positions(&b));
    }

    #[test]
    fn test_placement_fails_without_room() {
        let mut scenario = small_scenario(1);
        scenario.grid.water_density = 1.0;
        scenario.grid.mountain_density = 0.0;
        let err = Simulation::from_scenario(&scenario).err().unwrap();
        assert!(matches!(err, Error::Placement(_)));
    }

    #[test]
    fn test_tick_advances_clock() {
        let mut sim =
            Simulation::with_seed(WorldGrid::new(5, 5, 10.0), BehaviorConfig::default(), 2);
        sim.tick(0.25).unwrap();
        sim.tick(0.25).unwrap();
        assert_eq!(sim.time(), 0.5);
        assert_eq!(sim.ticks(), 2);
        assert!(sim.is_over(100));
    }

    #[test]
    fn test_set_state_on_missing_entity() {
        let mut sim =
            Simulation::with_seed(WorldGrid::new(5, 5, 10.0), BehaviorConfig::default(), 2);
        let id = sim
            .spawn_agent(params("Raptor", Diet::Carnivore, Gender::Male), Vector2D::new(5.0, 5.0))
            .unwrap();
        sim.agent_mut(id).unwrap().set_hydration(0.0);
        sim.tick(0.1).unwrap();

        assert!(sim.entity(id).is_none());
        assert!(matches!(sim.set_state(id, StateId::Stand), Err(Error::NotFound(_))));
        assert!(sim.is_over(100));
    }

    #[test]
    fn test_plant_cannot_enter_agent_state() {
        let mut sim =
            Simulation::with_seed(WorldGrid::new(5, 5, 10.0), BehaviorConfig::default(), 2);
        let fern = sim
            .spawn_resource(Resource::new("Fern", Vector2D::new(5.0, 5.0), 2.0, 1.0, 0.0))
            .unwrap();
        assert!(matches!(
            sim.set_state(fern, StateId::Hunt),
            Err(Error::UnknownTransition { .. })
        ));
        assert_eq!(sim.state_of(fern), Some(StateId::Growing));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(12))]

        #[test]
        fn prop_vitals_stay_in_bounds(
            seed in any::<u64>(),
            ticks in 1usize..60,
            dt in 0.05..1.0f64,
        ) {
            let mut sim = Simulation::from_scenario(&small_scenario(seed)).unwrap();
            for _ in 0..ticks {
                sim.tick(dt).unwrap();
                for request in sim.drain_birth_requests() {
                    sim.spawn_offspring(&request).unwrap();
                }
            }

            for (_, agent) in sim.agents() {
                prop_assert!((0.0..=agent.max_nutrition).contains(&agent.nutrition()));
                prop_assert!((0.0..=agent.max_hydration).contains(&agent.hydration()));
                let drive = agent.reproduction_value();
                prop_assert!((0.0..=crate::entity::MAX_REPRODUCTION_VALUE).contains(&drive));
            }
            for (_, entity) in sim.entities() {
                if let Some(plant) = entity.as_resource() {
                    prop_assert!((0.0..=crate::entity::MAX_GROWTH).contains(&plant.growth()));
                }
            }
        }

        #[test]
        fn prop_removed_agents_leave_no_references(seed in any::<u64>()) {
            let mut scenario = small_scenario(seed);
            scenario.behavior.nutrition_decay = 20.0;
            let mut sim = Simulation::from_scenario(&scenario).unwrap();

            for _ in 0..40 {
                sim.tick(0.25).unwrap();
                let removed: Vec<u64> = sim.drain_removed().into_iter().map(|s| s.id).collect();
                for (_, agent) in sim.agents() {
                    for link in [agent.target, agent.partner, agent.hunter].into_iter().flatten() {
                        prop_assert!(sim.entity(link).is_some());
                        prop_assert!(!removed.contains(&link.as_u64()));
                    }
                }
            }
        }
    }
}
