//! Finite-state machine core shared by every entity.
//!
//! A state declares an ordered list of guarded transitions. Each tick the machine
//! takes the first transition whose guard holds, swaps states through the factory
//! and then runs the current state's update.

use crate::entity::{Agent, EntityId, Resource};
use crate::simulation::Simulation;
use crate::states::{BehaviorState, StateFactory};
use dinosim_core::{BehaviorConfig, Error, Result, Vector2D};
use std::fmt;
use tracing::trace;

/// Identifier of every concrete state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateId {
    Stand,
    Wander,
    MoveToFoodSource,
    Hunt,
    Escape,
    Ingestion,
    MoveToPartner,
    Mate,
    NoOp,
    Dead,
    Growing,
    Grown,
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Read-only view handed to transition guards
pub struct WorldView<'a> {
    pub sim: &'a Simulation,
    pub owner: EntityId,
}

impl<'a> WorldView<'a> {
    pub fn new(sim: &'a Simulation, owner: EntityId) -> Self {
        Self { sim, owner }
    }

    pub fn agent(&self) -> Option<&'a Agent> {
        self.sim.agent(self.owner)
    }

    pub fn resource(&self) -> Option<&'a Resource> {
        self.sim.resource(self.owner)
    }

    pub fn config(&self) -> &'a BehaviorConfig {
        self.sim.config()
    }

    /// Position of another entity as of the start of the tick
    pub fn position_of(&self, id: EntityId) -> Option<Vector2D> {
        self.sim.position_of(id)
    }
}

/// Guarded edge to another state
pub struct Transition<S> {
    pub target: StateId,
    pub guard: fn(&S, &WorldView<'_>) -> bool,
}

/// Target of the first transition whose guard holds, in declaration order
pub fn first_satisfied<S>(
    transitions: &[Transition<S>],
    state: &S,
    view: &WorldView<'_>,
) -> Option<StateId> {
    transitions
        .iter()
        .find(|transition| (transition.guard)(state, view))
        .map(|transition| transition.target)
}

/// Behavior of one concrete state.
///
/// Hooks receive the whole simulation so a state may touch other entities, e.g. a
/// hunter freezing its prey. The owner's own machine is detached while its hooks run.
pub trait State: Sized + 'static {
    const ID: StateId;

    /// Outgoing transitions, highest priority first
    const TRANSITIONS: &'static [Transition<Self>];

    fn on_enter(&mut self, _sim: &mut Simulation, _owner: EntityId) {}

    fn update(&mut self, _sim: &mut Simulation, _owner: EntityId, _dt: f64) {}

    /// `next` is the state about to replace this one
    fn on_exit(&mut self, _sim: &mut Simulation, _owner: EntityId, _next: StateId) {}

    fn next_state(&self, view: &WorldView<'_>) -> Option<StateId> {
        first_satisfied(Self::TRANSITIONS, self, view)
    }
}

/// Per-entity state machine
#[derive(Debug, Clone)]
pub struct StateMachine {
    current: BehaviorState,
}

impl StateMachine {
    /// Wrap an initial state. Its entry hook runs on [`StateMachine::start`].
    pub fn new(initial: BehaviorState) -> Self {
        Self { current: initial }
    }

    pub fn current(&self) -> &BehaviorState {
        &self.current
    }

    pub fn current_id(&self) -> StateId {
        self.current.id()
    }

    pub fn start(&mut self, sim: &mut Simulation, owner: EntityId) {
        self.current.on_enter(sim, owner);
    }

    /// Exit the current state, install `next` and enter it
    pub fn set_state(&mut self, next: BehaviorState, sim: &mut Simulation, owner: EntityId) {
        let from = self.current.id();
        let to = next.id();

        self.current.on_exit(sim, owner, to);
        self.current = next;
        self.current.on_enter(sim, owner);

        trace!(entity = owner.as_u64(), %from, %to, "state transition");
    }

    /// Follow at most one transition. Returns whether the state changed.
    pub fn check_transitions(&mut self, sim: &mut Simulation, owner: EntityId) -> Result<bool> {
        let target = self.current.next_state(&WorldView::new(sim, owner));
        let Some(target) = target else {
            return Ok(false);
        };

        let entity = sim
            .entity(owner)
            .ok_or_else(|| Error::NotFound(format!("entity {}", owner.as_u64())))?;
        let next = StateFactory::create(target, entity)?;
        self.set_state(next, sim, owner);
        Ok(true)
    }

    pub fn update(&mut self, sim: &mut Simulation, owner: EntityId, dt: f64) {
        self.current.update(sim, owner, dt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::tests::params;
    use crate::grid::WorldGrid;
    use dinosim_core::{Diet, Gender};

    struct Flagged {
        flag: bool,
    }

    fn never(_: &Flagged, _: &WorldView<'_>) -> bool {
        false
    }

    fn flagged(state: &Flagged, _: &WorldView<'_>) -> bool {
        state.flag
    }

    fn always(_: &Flagged, _: &WorldView<'_>) -> bool {
        true
    }

    const FLAG_TRANSITIONS: &[Transition<Flagged>] = &[
        Transition {
            target: StateId::Dead,
            guard: never,
        },
        Transition {
            target: StateId::Hunt,
            guard: flagged,
        },
        Transition {
            target: StateId::Wander,
            guard: always,
        },
    ];

    #[test]
    fn test_first_satisfied_respects_order() {
        let mut sim =
            Simulation::with_seed(WorldGrid::new(4, 4, 10.0), BehaviorConfig::default(), 1);
        let id = sim
            .spawn_agent(params("Raptor", Diet::Carnivore, Gender::Male), Vector2D::new(5.0, 5.0))
            .unwrap();
        let view = WorldView::new(&sim, id);

        let state = Flagged { flag: true };
        assert_eq!(first_satisfied(FLAG_TRANSITIONS, &state, &view), Some(StateId::Hunt));

        let state = Flagged { flag: false };
        assert_eq!(first_satisfied(FLAG_TRANSITIONS, &state, &view), Some(StateId::Wander));

        assert_eq!(first_satisfied(&FLAG_TRANSITIONS[..1], &state, &view), None);
    }

    #[test]
    fn test_machine_follows_one_transition_per_check() {
        let mut sim =
            Simulation::with_seed(WorldGrid::new(4, 4, 10.0), BehaviorConfig::default(), 1);
        let id = sim
            .spawn_agent(params("Raptor", Diet::Carnivore, Gender::Male), Vector2D::new(5.0, 5.0))
            .unwrap();
        sim.agent_mut(id).unwrap().set_nutrition(0.0);

        let entity = sim.entity(id).unwrap();
        let mut machine = StateMachine::new(StateFactory::create(StateId::NoOp, entity).unwrap());
        assert_eq!(machine.current_id(), StateId::NoOp);

        assert!(machine.check_transitions(&mut sim, id).unwrap());
        assert_eq!(machine.current_id(), StateId::Dead);

        // Dead has no way out
        assert!(!machine.check_transitions(&mut sim, id).unwrap());
        assert_eq!(machine.current_id(), StateId::Dead);
    }

    #[test]
    fn test_state_id_display() {
        assert_eq!(StateId::MoveToFoodSource.to_string(), "MoveToFoodSource");
        assert_eq!(StateId::NoOp.to_string(), "NoOp");
    }
}
