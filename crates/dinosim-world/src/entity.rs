//! Simulated objects: dinosaurs (agents) and plants (resources).

use dinosim_core::{
    AgentSnapshot, DeathCause, Diet, Gender, Mobility, SimulationTime, Vector2D,
};
use slotmap::{new_key_type, Key};

new_key_type! {
    /// Stable handle into the live-entity arena. A handle outlives its entity, so
    /// lookups after removal simply miss.
    pub struct EntityId;
}

impl EntityId {
    /// Raw value used in snapshots and logs
    pub fn as_u64(&self) -> u64 {
        self.data().as_ffi()
    }
}

/// Growth at which a plant counts as grown
pub const MAX_GROWTH: f64 = 100.0;

/// Upper bound of an agent's reproduction value
pub const MAX_REPRODUCTION_VALUE: f64 = 100.0;

/// Fields every simulated object has
#[derive(Debug, Clone)]
pub struct Body {
    pub position: Vector2D,
    /// Radius of the "touch" circle
    pub interaction_range: f64,
    pub species: String,
}

/// Parameters of a single dinosaur, already sampled from its species
#[derive(Debug, Clone)]
pub struct AgentParams {
    pub species: String,
    pub diet: Diet,
    pub gender: Gender,
    pub max_nutrition: f64,
    pub max_hydration: f64,
    pub strength: f64,
    pub speed: f64,
    pub view_range: f64,
    pub interaction_range: f64,
    pub can_swim: bool,
    pub can_climb: bool,
}

/// A dinosaur
#[derive(Debug, Clone)]
pub struct Agent {
    pub body: Body,
    nutrition: f64,
    pub max_nutrition: f64,
    hydration: f64,
    pub max_hydration: f64,
    pub strength: f64,
    pub speed: f64,
    pub view_range: f64,
    pub can_swim: bool,
    pub can_climb: bool,
    pub gender: Gender,
    reproduction_value: f64,
    pub diet: Diet,
    /// Food being approached, hunted or eaten
    pub target: Option<EntityId>,
    /// Water point being approached or drunk from
    pub water_source: Option<Vector2D>,
    pub partner: Option<EntityId>,
    pub is_chased: bool,
    /// Agent currently hunting this one
    pub hunter: Option<EntityId>,
    /// Caught by a hunter and frozen until it finishes feeding
    pub is_forced_no_op: bool,
    pub time_of_birth: SimulationTime,
    pub(crate) death_cause: Option<DeathCause>,
}

impl Agent {
    /// A new agent with full vitals and zero reproduction value
    pub fn new(params: AgentParams, position: Vector2D, time_of_birth: SimulationTime) -> Self {
        Self {
            body: Body {
                position,
                interaction_range: params.interaction_range,
                species: params.species,
            },
            nutrition: params.max_nutrition,
            max_nutrition: params.max_nutrition,
            hydration: params.max_hydration,
            max_hydration: params.max_hydration,
            strength: params.strength,
            speed: params.speed,
            view_range: params.view_range,
            can_swim: params.can_swim,
            can_climb: params.can_climb,
            gender: params.gender,
            reproduction_value: 0.0,
            diet: params.diet,
            target: None,
            water_source: None,
            partner: None,
            is_chased: false,
            hunter: None,
            is_forced_no_op: false,
            time_of_birth,
            death_cause: None,
        }
    }

    /// Parameters an offspring inherits; gender is re-rolled by the caller
    pub fn params(&self) -> AgentParams {
        AgentParams {
            species: self.body.species.clone(),
            diet: self.diet,
            gender: self.gender,
            max_nutrition: self.max_nutrition,
            max_hydration: self.max_hydration,
            strength: self.strength,
            speed: self.speed,
            view_range: self.view_range,
            interaction_range: self.body.interaction_range,
            can_swim: self.can_swim,
            can_climb: self.can_climb,
        }
    }

    pub fn position(&self) -> Vector2D {
        self.body.position
    }

    pub fn mobility(&self) -> Mobility {
        Mobility::new(self.can_swim, self.can_climb)
    }

    pub fn nutrition(&self) -> f64 {
        self.nutrition
    }

    pub fn hydration(&self) -> f64 {
        self.hydration
    }

    pub fn reproduction_value(&self) -> f64 {
        self.reproduction_value
    }

    pub fn set_nutrition(&mut self, value: f64) {
        self.nutrition = value.clamp(0.0, self.max_nutrition);
    }

    pub fn set_hydration(&mut self, value: f64) {
        self.hydration = value.clamp(0.0, self.max_hydration);
    }

    pub fn set_reproduction_value(&mut self, value: f64) {
        self.reproduction_value = value.clamp(0.0, MAX_REPRODUCTION_VALUE);
    }

    pub fn died_of_hunger(&self) -> bool {
        self.nutrition == 0.0
    }

    pub fn died_of_thirst(&self) -> bool {
        self.hydration == 0.0
    }

    pub fn is_dead(&self) -> bool {
        self.died_of_hunger() || self.died_of_thirst()
    }

    pub fn is_hungry(&self, threshold: f64) -> bool {
        self.nutrition <= self.max_nutrition * threshold
    }

    pub fn is_thirsty(&self, threshold: f64) -> bool {
        self.hydration <= self.max_hydration * threshold
    }

    /// Ready to reproduce and not distracted by hunger or thirst
    pub fn is_willing_to_mate(&self, hunger_threshold: f64, thirst_threshold: f64) -> bool {
        self.reproduction_value >= MAX_REPRODUCTION_VALUE
            && !self.is_hungry(hunger_threshold)
            && !self.is_thirsty(thirst_threshold)
    }

    /// Whether a hunter can still catch this agent. Strength is compared by the query
    /// engine when selecting prey, not here.
    pub fn can_be_eaten(&self, _requester_strength: f64) -> bool {
        self.hydration > 0.0
    }

    /// Consumed by a hunter: both vitals drop to zero
    pub fn eat(&mut self) {
        self.nutrition = 0.0;
        self.hydration = 0.0;
        self.death_cause = Some(DeathCause::Eaten);
    }

    /// Vitals decay and reproduction drive for `dt` seconds
    pub fn metabolize(
        &mut self,
        dt: f64,
        nutrition_decay: f64,
        hydration_decay: f64,
        reproduction_rate: f64,
    ) {
        self.set_nutrition(self.nutrition - nutrition_decay * dt);
        self.set_hydration(self.hydration - hydration_decay * dt);
        self.set_reproduction_value(self.reproduction_value + reproduction_rate * dt);
    }

    pub fn death_cause(&self) -> Option<DeathCause> {
        self.death_cause.or(if self.died_of_thirst() {
            Some(DeathCause::Thirst)
        } else if self.died_of_hunger() {
            Some(DeathCause::Hunger)
        } else {
            None
        })
    }

    pub fn snapshot(&self, id: EntityId, state: &str) -> AgentSnapshot {
        AgentSnapshot {
            id: id.as_u64(),
            species: self.body.species.clone(),
            diet: self.diet,
            gender: self.gender,
            position: self.body.position,
            nutrition: self.nutrition,
            max_nutrition: self.max_nutrition,
            hydration: self.hydration,
            max_hydration: self.max_hydration,
            strength: self.strength,
            reproduction_value: self.reproduction_value,
            time_of_birth: self.time_of_birth,
            state: state.to_string(),
            death_cause: self.death_cause(),
        }
    }
}

/// A plant
#[derive(Debug, Clone)]
pub struct Resource {
    pub body: Body,
    growth: f64,
    /// Growth units per second
    pub growth_rate: f64,
}

impl Resource {
    pub fn new(
        species: impl Into<String>,
        position: Vector2D,
        interaction_range: f64,
        growth_rate: f64,
        growth: f64,
    ) -> Self {
        Self {
            body: Body {
                position,
                interaction_range,
                species: species.into(),
            },
            growth: growth.clamp(0.0, MAX_GROWTH),
            growth_rate,
        }
    }

    pub fn position(&self) -> Vector2D {
        self.body.position
    }

    pub fn growth(&self) -> f64 {
        self.growth
    }

    pub fn set_growth(&mut self, value: f64) {
        self.growth = value.clamp(0.0, MAX_GROWTH);
    }

    pub fn grow(&mut self, dt: f64) {
        self.set_growth(self.growth + self.growth_rate * dt);
    }

    pub fn is_grown(&self) -> bool {
        self.growth >= MAX_GROWTH
    }

    pub fn can_be_eaten(&self, _requester_strength: f64) -> bool {
        self.is_grown()
    }

    pub fn eat(&mut self) {
        self.growth = 0.0;
    }
}

/// Any member of the live-entity collection
#[derive(Debug, Clone)]
pub enum Entity {
    Agent(Agent),
    Resource(Resource),
}

/// Concrete kind of an entity, used by the state factory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Agent,
    Resource,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Agent => write!(f, "agent"),
            EntityKind::Resource => write!(f, "resource"),
        }
    }
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Agent(_) => EntityKind::Agent,
            Entity::Resource(_) => EntityKind::Resource,
        }
    }

    pub fn body(&self) -> &Body {
        match self {
            Entity::Agent(agent) => &agent.body,
            Entity::Resource(resource) => &resource.body,
        }
    }

    pub fn position(&self) -> Vector2D {
        self.body().position
    }

    pub fn interaction_range(&self) -> f64 {
        self.body().interaction_range
    }

    pub fn species(&self) -> &str {
        &self.body().species
    }

    pub fn as_agent(&self) -> Option<&Agent> {
        match self {
            Entity::Agent(agent) => Some(agent),
            Entity::Resource(_) => None,
        }
    }

    pub fn as_agent_mut(&mut self) -> Option<&mut Agent> {
        match self {
            Entity::Agent(agent) => Some(agent),
            Entity::Resource(_) => None,
        }
    }

    pub fn as_resource(&self) -> Option<&Resource> {
        match self {
            Entity::Resource(resource) => Some(resource),
            Entity::Agent(_) => None,
        }
    }

    pub fn as_resource_mut(&mut self) -> Option<&mut Resource> {
        match self {
            Entity::Resource(resource) => Some(resource),
            Entity::Agent(_) => None,
        }
    }

    pub fn can_be_eaten(&self, requester_strength: f64) -> bool {
        match self {
            Entity::Agent(agent) => agent.can_be_eaten(requester_strength),
            Entity::Resource(resource) => resource.can_be_eaten(requester_strength),
        }
    }

    pub fn eat(&mut self) {
        match self {
            Entity::Agent(agent) => agent.eat(),
            Entity::Resource(resource) => resource.eat(),
        }
    }
}
