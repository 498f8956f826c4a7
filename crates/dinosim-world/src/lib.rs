//! World simulation engine.
//!
//! This crate holds the tile grid, the dinosaurs and plants living on it, the spatial
//! queries they use to find food, water and partners, and the state machines that
//! drive their behavior tick by tick.

pub mod entity;
pub mod fsm;
pub mod grid;
pub mod query;
pub mod run;
pub mod simulation;
pub mod states;

pub use entity::{Agent, AgentParams, Entity, EntityId, EntityKind, Resource, MAX_GROWTH};
pub use fsm::{StateId, StateMachine};
pub use grid::WorldGrid;
pub use query::{do_circles_intersect, PathQuery, Seeker};
pub use run::{Run, RunReport};
pub use simulation::{BirthRequest, Simulation};
pub use states::{BehaviorState, StateFactory};
