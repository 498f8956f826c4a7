//! Plant lifecycle: grow until fully grown, wait to be eaten, grow again.

use crate::entity::EntityId;
use crate::fsm::{State, StateId, Transition, WorldView};
use crate::simulation::Simulation;

fn is_grown<S>(_: &S, view: &WorldView<'_>) -> bool {
    view.resource().is_some_and(|plant| plant.is_grown())
}

fn was_eaten<S>(_: &S, view: &WorldView<'_>) -> bool {
    view.resource().is_some_and(|plant| !plant.is_grown())
}

#[derive(Debug, Clone, Default)]
pub struct Growing;

impl State for Growing {
    const ID: StateId = StateId::Growing;
    const TRANSITIONS: &'static [Transition<Self>] = &[Transition {
        target: StateId::Grown,
        guard: is_grown,
    }];

    fn update(&mut self, sim: &mut Simulation, owner: EntityId, dt: f64) {
        if let Some(plant) = sim.resource_mut(owner) {
            plant.grow(dt);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Grown;

impl State for Grown {
    const ID: StateId = StateId::Grown;
    const TRANSITIONS: &'static [Transition<Self>] = &[Transition {
        target: StateId::Growing,
        guard: was_eaten,
    }];
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Resource, MAX_GROWTH};
    use crate::grid::WorldGrid;
    use dinosim_core::{BehaviorConfig, Vector2D};

    #[test]
    fn test_plant_lifecycle() {
        let mut sim =
            Simulation::with_seed(WorldGrid::new(5, 5, 10.0), BehaviorConfig::default(), 3);
        let fern = sim
            .spawn_resource(Resource::new("Fern", Vector2D::new(25.0, 25.0), 2.0, 10.0, 0.0))
            .unwrap();
        assert_eq!(sim.state_of(fern), Some(StateId::Growing));

        let ticks = (MAX_GROWTH / 10.0) as usize;
        for _ in 0..ticks {
            sim.tick(1.0).unwrap();
        }
        assert!(sim.resource(fern).unwrap().is_grown());
        assert_eq!(sim.state_of(fern), Some(StateId::Growing));

        sim.tick(1.0).unwrap();
        assert_eq!(sim.state_of(fern), Some(StateId::Grown));
        assert_eq!(sim.resource(fern).unwrap().growth(), MAX_GROWTH);

        sim.resource_mut(fern).unwrap().eat();
        sim.tick(1.0).unwrap();
        assert_eq!(sim.state_of(fern), Some(StateId::Growing));
        assert_eq!(sim.resource(fern).unwrap().growth(), 10.0);
    }

    #[test]
    fn test_grown_plant_starts_grown() {
        let mut sim =
            Simulation::with_seed(WorldGrid::new(5, 5, 10.0), BehaviorConfig::default(), 3);
        let fern = sim
            .spawn_resource(Resource::new("Fern", Vector2D::new(25.0, 25.0), 2.0, 10.0, MAX_GROWTH))
            .unwrap();
        assert_eq!(sim.state_of(fern), Some(StateId::Grown));
    }
}
