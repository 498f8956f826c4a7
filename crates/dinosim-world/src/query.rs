//! Spatial queries over the grid and the live entities.
//!
//! Every reachability answer combines two tests: the terrain along the path must be
//! passable for the mover, and no other entity may sit across it.

use crate::entity::{Agent, Entity, EntityId};
use crate::simulation::Simulation;
use dinosim_core::{Diet, Gender, Mobility, Vector2D};
use rand::Rng;
use std::f64::consts::TAU;

/// Two circles touch when their centers are closer than the sum of their radii.
pub fn do_circles_intersect(a: Vector2D, radius_a: f64, b: Vector2D, radius_b: f64) -> bool {
    a.distance(&b) < radius_a + radius_b
}

/// A straight-line movement to test with [`Simulation::can_move_to`]
#[derive(Debug, Clone, Copy)]
pub struct PathQuery<'a> {
    pub from: Vector2D,
    pub to: Vector2D,
    /// Radius of the mover; other bodies must stay this far from the path
    pub clearance: f64,
    pub mobility: Mobility,
    /// Added to every terrain sample, e.g. to test a body's leading edge
    pub offset: Vector2D,
    pub ignore_terrain: bool,
    pub ignore_blockers: bool,
    /// Entities that never block this movement
    pub exempt: &'a [EntityId],
}

impl<'a> PathQuery<'a> {
    pub fn new(from: Vector2D, to: Vector2D, clearance: f64, mobility: Mobility) -> Self {
        Self {
            from,
            to,
            clearance,
            mobility,
            offset: Vector2D::ZERO,
            ignore_terrain: false,
            ignore_blockers: false,
            exempt: &[],
        }
    }

    pub fn with_offset(mut self, offset: Vector2D) -> Self {
        self.offset = offset;
        self
    }

    pub fn exempt(mut self, ids: &'a [EntityId]) -> Self {
        self.exempt = ids;
        self
    }

    pub fn ignore_terrain(mut self) -> Self {
        self.ignore_terrain = true;
        self
    }

    pub fn ignore_blockers(mut self) -> Self {
        self.ignore_blockers = true;
        self
    }
}

/// The agent on whose behalf a search runs
#[derive(Debug, Clone, Copy)]
pub struct Seeker<'a> {
    pub id: Option<EntityId>,
    pub origin: Vector2D,
    pub view_range: f64,
    pub interaction_range: f64,
    pub mobility: Mobility,
    pub species: &'a str,
    pub diet: Diet,
    pub strength: f64,
    pub gender: Gender,
}

impl<'a> Seeker<'a> {
    pub fn of(id: EntityId, agent: &'a Agent) -> Self {
        Self {
            id: Some(id),
            origin: agent.position(),
            view_range: agent.view_range,
            interaction_range: agent.body.interaction_range,
            mobility: agent.mobility(),
            species: &agent.body.species,
            diet: agent.diet,
            strength: agent.strength,
            gender: agent.gender,
        }
    }

    fn exempt_with(&self, other: EntityId) -> Vec<EntityId> {
        self.id.into_iter().chain(Some(other)).collect()
    }
}

impl Simulation {
    /// Whether a body can travel in a straight line from `query.from` to `query.to`.
    pub fn can_move_to(&self, query: &PathQuery<'_>) -> bool {
        if !query.ignore_terrain && !self.is_path_passable(query) {
            return false;
        }
        if !query.ignore_blockers && self.is_path_blocked(query) {
            return false;
        }
        true
    }

    fn is_path_passable(&self, query: &PathQuery<'_>) -> bool {
        let grid = self.grid();
        let length = query.from.distance(&query.to);
        let step = (grid.tile_size / 4.0).max(f64::EPSILON);
        let samples = (length / step).ceil().max(1.0) as usize;

        (0..=samples).all(|i| {
            let t = i as f64 / samples as f64;
            let point = query.from + (query.to - query.from) * t + query.offset;
            grid.is_passable(point, query.mobility)
        })
    }

    fn is_path_blocked(&self, query: &PathQuery<'_>) -> bool {
        self.entities().any(|(id, entity)| {
            if query.exempt.contains(&id) || self.is_pending_removal(id) {
                return false;
            }
            let position = self.position_of(id).unwrap_or_else(|| entity.position());
            let reach = entity.interaction_range() + query.clearance;
            // bodies already in contact at the start never block
            position.distance(&query.from) >= reach
                && position.distance_to_segment(&query.from, &query.to) < reach
        })
    }

    /// Closest point from which an agent at `origin` can drink.
    ///
    /// Swimmers head for the water tile itself; everyone else for the center of the
    /// adjacent passable tile nearest to them.
    pub fn closest_reachable_water_source(&self, seeker: &Seeker<'_>) -> Option<Vector2D> {
        let grid = self.grid();
        let (origin, mobility) = (seeker.origin, seeker.mobility);
        let exempt: Vec<EntityId> = seeker.id.into_iter().collect();
        let mut best: Option<(f64, Vector2D)> = None;

        for cell in grid.cells_in_radius(origin, seeker.view_range) {
            if !grid.get(cell).is_some_and(|tile| tile.is_water()) {
                continue;
            }

            let approach = if mobility.can_swim {
                Some(grid.tile_center(cell))
            } else {
                grid.neighbors(cell)
                    .filter(|(_, tile)| tile.is_passable(mobility))
                    .map(|(neighbor, _)| grid.tile_center(neighbor))
                    .min_by(|a, b| a.distance(&origin).total_cmp(&b.distance(&origin)))
            };
            let Some(approach) = approach else {
                continue;
            };

            let distance = origin.distance(&approach);
            if best.is_some_and(|(best_distance, _)| best_distance <= distance) {
                continue;
            }
            let query = PathQuery::new(origin, approach, seeker.interaction_range, mobility)
                .exempt(&exempt);
            if self.can_move_to(&query) {
                best = Some((distance, approach));
            }
        }

        best.map(|(_, point)| point)
    }

    /// Nearest edible entity in view. Ties keep the first entity in enumeration order.
    pub fn closest_reachable_food_source_in_range(&self, seeker: &Seeker<'_>) -> Option<EntityId> {
        let mut best: Option<(f64, EntityId)> = None;

        for (id, entity) in self.entities() {
            if Some(id) == seeker.id || self.is_pending_removal(id) {
                continue;
            }
            if !is_food_for(seeker, entity) {
                continue;
            }

            let position = self.position_of(id).unwrap_or_else(|| entity.position());
            let distance = seeker.origin.distance(&position);
            if distance > seeker.view_range {
                continue;
            }
            if best.is_some_and(|(best_distance, _)| best_distance <= distance) {
                continue;
            }

            let exempt = seeker.exempt_with(id);
            let query = PathQuery::new(
                seeker.origin,
                position,
                seeker.interaction_range,
                seeker.mobility,
            )
            .exempt(&exempt);
            if self.can_move_to(&query) {
                best = Some((distance, id));
            }
        }

        best.map(|(_, id)| id)
    }

    /// Nearest agent of the same species and opposite gender that is free and willing.
    pub fn closest_reachable_suitable_partner_in_range(
        &self,
        seeker: &Seeker<'_>,
    ) -> Option<EntityId> {
        let config = self.config();
        let mut best: Option<(f64, EntityId)> = None;

        for (id, entity) in self.entities() {
            if Some(id) == seeker.id || self.is_pending_removal(id) {
                continue;
            }
            let Some(candidate) = entity.as_agent() else {
                continue;
            };
            let free = candidate.partner.is_none() || candidate.partner == seeker.id;
            if candidate.body.species != seeker.species
                || candidate.gender != seeker.gender.opposite()
                || !free
                || !candidate.is_willing_to_mate(config.hunger_threshold, config.thirst_threshold)
            {
                continue;
            }

            let position = self.position_of(id).unwrap_or_else(|| candidate.position());
            let distance = seeker.origin.distance(&position);
            if distance > seeker.view_range
                || best.is_some_and(|(best_distance, _)| best_distance <= distance)
            {
                continue;
            }

            let exempt = seeker.exempt_with(id);
            let query = PathQuery::new(
                seeker.origin,
                position,
                seeker.interaction_range,
                seeker.mobility,
            )
            .exempt(&exempt);
            if self.can_move_to(&query) {
                best = Some((distance, id));
            }
        }

        best.map(|(_, id)| id)
    }

    /// Random reachable point between `interaction_range` and `view_range` away.
    pub fn random_movement_target_in_range(
        &mut self,
        origin: Vector2D,
        view_range: f64,
        interaction_range: f64,
        mobility: Mobility,
        offset: Vector2D,
    ) -> Option<Vector2D> {
        self.sample_movement_target(origin, view_range, interaction_range, mobility, offset, None)
    }

    /// Like [`Self::random_movement_target_in_range`], restricted to a cone around
    /// `direction`. A zero direction yields nothing.
    pub fn random_movement_target_in_range_in_direction(
        &mut self,
        origin: Vector2D,
        view_range: f64,
        interaction_range: f64,
        mobility: Mobility,
        offset: Vector2D,
        direction: Vector2D,
    ) -> Option<Vector2D> {
        if direction.is_zero() {
            return None;
        }
        let cone = (direction.angle(), self.config().escape_cone_half_angle);
        self.sample_movement_target(
            origin,
            view_range,
            interaction_range,
            mobility,
            offset,
            Some(cone),
        )
    }

    fn sample_movement_target(
        &mut self,
        origin: Vector2D,
        view_range: f64,
        interaction_range: f64,
        mobility: Mobility,
        offset: Vector2D,
        cone: Option<(f64, f64)>,
    ) -> Option<Vector2D> {
        let attempts = self.config().random_target_attempts;
        let min_distance = interaction_range.min(view_range);

        for _ in 0..attempts {
            let angle = match cone {
                Some((center, half_angle)) => {
                    center + self.rng().gen_range(-half_angle..=half_angle)
                }
                None => self.rng().gen_range(0.0..TAU),
            };
            let distance = self.rng().gen_range(min_distance..=view_range);
            let candidate = origin + Vector2D::from_angle(angle) * distance;

            if !self.grid().contains(candidate + offset) {
                continue;
            }
            let query = PathQuery::new(origin, candidate, interaction_range, mobility)
                .with_offset(offset);
            if self.can_move_to(&query) {
                return Some(candidate);
            }
        }

        None
    }
}

fn is_food_for(seeker: &Seeker<'_>, entity: &Entity) -> bool {
    match entity {
        Entity::Resource(plant) => seeker.diet.eats_plants() && plant.can_be_eaten(seeker.strength),
        Entity::Agent(prey) => {
            prey.body.species != seeker.species
                && seeker.diet.hunts(prey.diet)
                && prey.strength <= seeker.strength
                && prey.can_be_eaten(seeker.strength)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::tests::params;
    use crate::entity::Resource;
    use crate::grid::WorldGrid;
    use dinosim_core::BehaviorConfig;
    use proptest::prelude::*;

    fn sim(rows: &[&str]) -> Simulation {
        let grid = WorldGrid::from_ascii(rows, 10.0).unwrap();
        Simulation::with_seed(grid, BehaviorConfig::default(), 7)
    }

    fn open_field() -> Simulation {
        sim(&[
            "....................",
            "....................",
            "....................",
            "....................",
            "....................",
            "....................",
            "....................",
            "....................",
            "....................",
            "....................",
        ])
    }

    const WALKER: Mobility = Mobility {
        can_swim: false,
        can_climb: false,
    };

    #[test]
    fn test_circle_intersection() {
        let a = Vector2D::new(0.0, 0.0);
        assert!(do_circles_intersect(a, 5.0, Vector2D::new(9.0, 0.0), 5.0));
        assert!(!do_circles_intersect(a, 5.0, Vector2D::new(10.0, 0.0), 5.0));
    }

    proptest! {
        #[test]
        fn prop_circle_intersection_is_symmetric(
            ax in -100.0..100.0f64, ay in -100.0..100.0f64,
            bx in -100.0..100.0f64, by in -100.0..100.0f64,
            ra in 0.0..50.0f64, rb in 0.0..50.0f64,
        ) {
            let a = Vector2D::new(ax, ay);
            let b = Vector2D::new(bx, by);
            let touching = do_circles_intersect(a, ra, b, rb);
            prop_assert_eq!(touching, do_circles_intersect(b, rb, a, ra));
            prop_assert_eq!(touching, a.distance(&b) < ra + rb);
        }

        #[test]
        fn prop_coincident_circles_always_intersect(
            x in -100.0..100.0f64, y in -100.0..100.0f64,
            ra in 1e-6..50.0f64, rb in 1e-6..50.0f64,
        ) {
            let center = Vector2D::new(x, y);
            prop_assert!(do_circles_intersect(center, ra, center, rb));
        }
    }

    #[test]
    fn test_terrain_blocks_walkers() {
        let sim = sim(&["..~..", "..~..", "..~.."]);
        let from = Vector2D::new(5.0, 15.0);
        let to = Vector2D::new(45.0, 15.0);

        assert!(!sim.can_move_to(&PathQuery::new(from, to, 1.0, WALKER)));
        assert!(sim.can_move_to(&PathQuery::new(from, to, 1.0, Mobility::new(true, false))));
        assert!(sim.can_move_to(&PathQuery::new(from, to, 1.0, WALKER).ignore_terrain()));
        assert!(!sim.can_move_to(&PathQuery::new(from, Vector2D::new(-5.0, 15.0), 1.0, WALKER)));
    }

    #[test]
    fn test_offset_shifts_terrain_samples() {
        let sim = sim(&["....~"]);
        let from = Vector2D::new(5.0, 5.0);
        let to = Vector2D::new(25.0, 5.0);

        assert!(sim.can_move_to(&PathQuery::new(from, to, 1.0, WALKER)));
        let leading_edge =
            PathQuery::new(from, to, 1.0, WALKER).with_offset(Vector2D::new(20.0, 0.0));
        assert!(!sim.can_move_to(&leading_edge));
    }

    #[test]
    fn test_entities_block_paths() {
        let mut sim = open_field();
        let rock = sim
            .spawn_resource(Resource::new("Boulder", Vector2D::new(50.0, 50.0), 5.0, 0.0, 0.0))
            .unwrap();

        let from = Vector2D::new(10.0, 50.0);
        let to = Vector2D::new(90.0, 50.0);
        let query = PathQuery::new(from, to, 3.0, WALKER);
        assert!(!sim.can_move_to(&query));
        assert!(sim.can_move_to(&query.ignore_blockers()));
        assert!(sim.can_move_to(&query.exempt(&[rock])));

        // passing beside it is fine
        let beside =
            PathQuery::new(Vector2D::new(10.0, 70.0), Vector2D::new(90.0, 70.0), 3.0, WALKER);
        assert!(sim.can_move_to(&beside));

        // already touching at the start
        let away =
            PathQuery::new(Vector2D::new(52.0, 50.0), Vector2D::new(90.0, 50.0), 3.0, WALKER);
        assert!(sim.can_move_to(&away));
    }

    /// A Triceratops standing at `origin` with the given sight and terrain skills
    fn drinker(
        sim: &mut Simulation,
        origin: Vector2D,
        view_range: f64,
        mobility: Mobility,
    ) -> EntityId {
        let mut drinker = params("Triceratops", Diet::Herbivore, Gender::Female);
        drinker.view_range = view_range;
        drinker.can_swim = mobility.can_swim;
        drinker.can_climb = mobility.can_climb;
        sim.spawn_agent(drinker, origin).unwrap()
    }

    fn water_for(sim: &Simulation, id: EntityId) -> Option<Vector2D> {
        sim.closest_reachable_water_source(&Seeker::of(id, sim.agent(id).unwrap()))
    }

    #[test]
    fn test_water_source_for_walkers_and_swimmers() {
        let rows = [".....", ".....", "....~"];
        let origin = Vector2D::new(5.0, 5.0);

        let mut walkers = sim(&rows);
        let walker = drinker(&mut walkers, origin, 100.0, WALKER);
        assert_eq!(water_for(&walkers, walker), Some(Vector2D::new(35.0, 15.0)));

        let mut swimmers = sim(&rows);
        let swimmer = drinker(&mut swimmers, origin, 100.0, Mobility::new(true, false));
        assert_eq!(water_for(&swimmers, swimmer), Some(Vector2D::new(45.0, 25.0)));

        let mut short_sighted = sim(&rows);
        let walker = drinker(&mut short_sighted, origin, 20.0, WALKER);
        assert!(water_for(&short_sighted, walker).is_none());
    }

    #[test]
    fn test_water_behind_mountains_is_unreachable() {
        let rows = ["..^~", "..^~", "..^~"];
        let origin = Vector2D::new(5.0, 15.0);

        let mut walkers = sim(&rows);
        let walker = drinker(&mut walkers, origin, 100.0, WALKER);
        assert!(water_for(&walkers, walker).is_none());

        let mut climbers = sim(&rows);
        let climber = drinker(&mut climbers, origin, 100.0, Mobility::new(false, true));
        assert!(water_for(&climbers, climber).is_some());
    }

    #[test]
    fn test_water_path_needs_room_for_the_drinkers_body() {
        let rows = [".........~", ".........~", ".........~"];
        let origin = Vector2D::new(15.0, 15.0);

        // the bush's edge is 3px from the path, closer than the drinker's own 5px radius
        let mut crowded = sim(&rows);
        crowded
            .spawn_resource(Resource::new("Fern", Vector2D::new(50.0, 23.0), 5.0, 0.0, 0.0))
            .unwrap();
        let walker = drinker(&mut crowded, origin, 100.0, WALKER);
        assert!(water_for(&crowded, walker).is_none());

        let mut roomy = sim(&rows);
        roomy
            .spawn_resource(Resource::new("Fern", Vector2D::new(50.0, 27.0), 5.0, 0.0, 0.0))
            .unwrap();
        let walker = drinker(&mut roomy, origin, 100.0, WALKER);
        assert_eq!(water_for(&roomy, walker), Some(Vector2D::new(85.0, 15.0)));
    }

    #[test]
    fn test_food_selection_by_diet() {
        let mut sim = open_field();
        let fern = sim
            .spawn_resource(Resource::new("Fern", Vector2D::new(60.0, 20.0), 3.0, 1.0, 100.0))
            .unwrap();
        let sapling = sim
            .spawn_resource(Resource::new("Fern", Vector2D::new(30.0, 40.0), 3.0, 1.0, 10.0))
            .unwrap();
        let grazer = sim
            .spawn_agent(
                params("Triceratops", Diet::Herbivore, Gender::Female),
                Vector2D::new(20.0, 20.0),
            )
            .unwrap();
        let hunter = sim
            .spawn_agent(params("Raptor", Diet::Carnivore, Gender::Male), Vector2D::new(20.0, 80.0))
            .unwrap();

        let grazer_agent = sim.agent(grazer).unwrap();
        let food = sim.closest_reachable_food_source_in_range(&Seeker::of(grazer, grazer_agent));
        assert_eq!(food, Some(fern));
        assert_ne!(food, Some(sapling));

        let hunter_agent = sim.agent(hunter).unwrap();
        let prey = sim.closest_reachable_food_source_in_range(&Seeker::of(hunter, hunter_agent));
        assert_eq!(prey, Some(grazer));
    }

    #[test]
    fn test_prey_must_not_be_stronger() {
        let mut sim = open_field();
        let mut strong = params("Ankylosaurus", Diet::Herbivore, Gender::Male);
        strong.strength = 9.0;
        sim.spawn_agent(strong, Vector2D::new(40.0, 40.0)).unwrap();
        let hunter = sim
            .spawn_agent(params("Raptor", Diet::Carnivore, Gender::Male), Vector2D::new(20.0, 40.0))
            .unwrap();
        sim.spawn_agent(
            params("Raptor", Diet::Carnivore, Gender::Female),
            Vector2D::new(30.0, 60.0),
        )
        .unwrap();

        let agent = sim.agent(hunter).unwrap();
        assert!(sim.closest_reachable_food_source_in_range(&Seeker::of(hunter, agent)).is_none());
    }

    #[test]
    fn test_suitable_partner() {
        let mut sim = open_field();
        let male = sim
            .spawn_agent(params("Raptor", Diet::Carnivore, Gender::Male), Vector2D::new(20.0, 20.0))
            .unwrap();
        let female = sim
            .spawn_agent(
                params("Raptor", Diet::Carnivore, Gender::Female),
                Vector2D::new(60.0, 20.0),
            )
            .unwrap();
        let rival = sim
            .spawn_agent(params("Raptor", Diet::Carnivore, Gender::Male), Vector2D::new(40.0, 60.0))
            .unwrap();

        let seeker = Seeker::of(male, sim.agent(male).unwrap());
        assert!(sim.closest_reachable_suitable_partner_in_range(&seeker).is_none());

        sim.agent_mut(female).unwrap().set_reproduction_value(100.0);
        let seeker = Seeker::of(male, sim.agent(male).unwrap());
        assert_eq!(sim.closest_reachable_suitable_partner_in_range(&seeker), Some(female));

        sim.agent_mut(female).unwrap().partner = Some(rival);
        let seeker = Seeker::of(male, sim.agent(male).unwrap());
        assert!(sim.closest_reachable_suitable_partner_in_range(&seeker).is_none());
    }

    #[test]
    fn test_random_target_stays_in_range() {
        let mut sim = open_field();
        let origin = Vector2D::new(100.0, 50.0);

        for _ in 0..50 {
            let target =
                sim.random_movement_target_in_range(origin, 40.0, 5.0, WALKER, Vector2D::ZERO);
            if let Some(target) = target {
                let distance = origin.distance(&target);
                assert!((5.0 - 1e-9..=40.0 + 1e-9).contains(&distance));
                assert!(sim.grid().contains(target));
            }
        }
    }

    #[test]
    fn test_directional_target_stays_in_cone() {
        let mut sim = open_field();
        let origin = Vector2D::new(100.0, 50.0);
        let direction = Vector2D::new(1.0, 0.0);
        let half_angle = sim.config().escape_cone_half_angle;

        let mut toward = |direction| {
            sim.random_movement_target_in_range_in_direction(
                origin,
                40.0,
                5.0,
                WALKER,
                Vector2D::ZERO,
                direction,
            )
        };

        let target = toward(direction).unwrap();
        let angle = (target - origin).angle();
        assert!(angle.abs() <= half_angle + 1e-9);

        assert!(toward(Vector2D::ZERO).is_none());
    }

    #[test]
    fn test_no_target_when_boxed_in() {
        let mut sim = sim(&["^^^", "^.^", "^^^"]);
        let origin = Vector2D::new(15.0, 15.0);
        let target = sim.random_movement_target_in_range(origin, 30.0, 8.0, WALKER, Vector2D::ZERO);
        assert!(target.is_none());
    }
}
