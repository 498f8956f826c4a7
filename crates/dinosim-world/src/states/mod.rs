//! Concrete behavior states and the factory that builds them.

pub mod agent;
pub mod plant;

pub use agent::{
    Dead, Escape, Hunt, Ingestion, Mate, MoveToFoodSource, MoveToPartner, NoOp, Stand, Wander,
};
pub use plant::{Grown, Growing};

use crate::entity::{Entity, EntityKind, EntityId};
use crate::fsm::{State, StateId, WorldView};
use crate::simulation::Simulation;
use dinosim_core::{Error, Result};

macro_rules! behavior_states {
    (
        agent: [$($agent:ident),* $(,)?],
        resource: [$($resource:ident),* $(,)?] $(,)?
    ) => {
        /// The current state of one entity
        #[derive(Debug, Clone)]
        pub enum BehaviorState {
            $($agent($agent),)*
            $($resource($resource),)*
        }

        impl BehaviorState {
            pub fn id(&self) -> StateId {
                match self {
                    $(BehaviorState::$agent(_) => <$agent as State>::ID,)*
                    $(BehaviorState::$resource(_) => <$resource as State>::ID,)*
                }
            }

            pub fn next_state(&self, view: &WorldView<'_>) -> Option<StateId> {
                match self {
                    $(BehaviorState::$agent(state) => state.next_state(view),)*
                    $(BehaviorState::$resource(state) => state.next_state(view),)*
                }
            }

            pub fn on_enter(&mut self, sim: &mut Simulation, owner: EntityId) {
                match self {
                    $(BehaviorState::$agent(state) => state.on_enter(sim, owner),)*
                    $(BehaviorState::$resource(state) => state.on_enter(sim, owner),)*
                }
            }

            pub fn update(&mut self, sim: &mut Simulation, owner: EntityId, dt: f64) {
                match self {
                    $(BehaviorState::$agent(state) => state.update(sim, owner, dt),)*
                    $(BehaviorState::$resource(state) => state.update(sim, owner, dt),)*
                }
            }

            pub fn on_exit(&mut self, sim: &mut Simulation, owner: EntityId, next: StateId) {
                match self {
                    $(BehaviorState::$agent(state) => state.on_exit(sim, owner, next),)*
                    $(BehaviorState::$resource(state) => state.on_exit(sim, owner, next),)*
                }
            }
        }

        /// Builds fresh state instances on demand
        pub struct StateFactory;

        impl StateFactory {
            /// A new instance of `target` for the given owner, or
            /// [`Error::UnknownTransition`] when the owner's kind has no such state.
            pub fn create(target: StateId, owner: &Entity) -> Result<BehaviorState> {
                match (owner.kind(), target) {
                    $((EntityKind::Agent, StateId::$agent) => {
                        Ok(BehaviorState::$agent($agent::default()))
                    })*
                    $((EntityKind::Resource, StateId::$resource) => {
                        Ok(BehaviorState::$resource($resource::default()))
                    })*
                    (kind, target) => Err(Error::UnknownTransition {
                        target: target.to_string(),
                        owner: kind.to_string(),
                    }),
                }
            }
        }
    };
}

behavior_states! {
    agent: [
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
    ],
    resource: [Growing, Grown],
}
