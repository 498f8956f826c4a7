//! Dinosaur behaviors.
//!
//! Every non-terminal state checks death first. Movement always goes through
//! [`move_towards`], which refuses steps that cross terrain or bodies the mover
//! cannot pass.

use crate::entity::{Agent, EntityId};
use crate::fsm::{State, StateId, Transition, WorldView};
use crate::query::{do_circles_intersect, PathQuery, Seeker};
use crate::simulation::{BirthRequest, Simulation};
use dinosim_core::{Gender, Vector2D};
use rand::Rng;
use tracing::{debug, warn};

/// Outcome of a single movement step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Moved,
    Arrived,
    Blocked,
}

/// Advance the owner towards `destination` by one tick's worth of speed.
/// `ignore` never blocks the step, typically the entity being approached.
fn move_towards(
    sim: &mut Simulation,
    owner: EntityId,
    destination: Vector2D,
    ignore: Option<EntityId>,
    dt: f64,
) -> Step {
    let Some(agent) = sim.agent(owner) else {
        return Step::Blocked;
    };
    let from = agent.position();
    let next = from.step_towards(&destination, agent.speed * dt);
    let exempt: Vec<EntityId> = std::iter::once(owner).chain(ignore).collect();
    let query = PathQuery::new(from, next, agent.body.interaction_range, agent.mobility())
        .exempt(&exempt);

    if !sim.can_move_to(&query) {
        return Step::Blocked;
    }
    if let Some(agent) = sim.agent_mut(owner) {
        agent.body.position = next;
    }
    if next == destination {
        Step::Arrived
    } else {
        Step::Moved
    }
}

/// Something to eat or drink
#[derive(Debug, Clone, Copy)]
enum Forage {
    Food(EntityId),
    Water(Vector2D),
}

/// The source that satisfies the owner's more urgent need, falling back to the other
/// need when nothing is in reach. `None` when the owner is neither hungry nor thirsty.
fn find_forage(sim: &Simulation, owner: EntityId) -> Option<Forage> {
    let agent = sim.agent(owner)?;
    let config = sim.config();
    let hungry = agent.is_hungry(config.hunger_threshold);
    let thirsty = agent.is_thirsty(config.thirst_threshold);
    let seeker = Seeker::of(owner, agent);

    let food = || {
        if !hungry {
            return None;
        }
        sim.closest_reachable_food_source_in_range(&seeker).map(Forage::Food)
    };
    let water = || {
        if !thirsty {
            return None;
        }
        sim.closest_reachable_water_source(&seeker).map(Forage::Water)
    };

    if agent.hydration() / agent.max_hydration <= agent.nutrition() / agent.max_nutrition {
        water().or_else(food)
    } else {
        food().or_else(water)
    }
}

/// Partner whose link points back at `owner`
fn linked_partner(sim: &Simulation, owner: EntityId) -> Option<(EntityId, &Agent)> {
    let partner_id = sim.agent(owner)?.partner?;
    let partner = sim.agent(partner_id)?;
    (partner.partner == Some(owner)).then_some((partner_id, partner))
}

/// A free partner that is idle enough to be courted
fn find_partner(sim: &Simulation, owner: EntityId) -> Option<EntityId> {
    let agent = sim.agent(owner)?;
    sim.closest_reachable_suitable_partner_in_range(&Seeker::of(owner, agent))
        .filter(|&candidate| {
            matches!(
                sim.state_of(candidate),
                Some(StateId::Stand | StateId::Wander)
            )
        })
}

/// Break the partner link on both sides
fn unlink_partner(sim: &mut Simulation, owner: EntityId) {
    let Some(partner_id) = sim.agent_mut(owner).and_then(|agent| agent.partner.take()) else {
        return;
    };
    if let Some(partner) = sim.agent_mut(partner_id) {
        if partner.partner == Some(owner) {
            partner.partner = None;
        }
    }
}

/// Let go of the prey the owner is hunting or holding
fn release_prey(sim: &mut Simulation, hunter: EntityId) {
    let Some(prey_id) = sim.agent(hunter).and_then(|agent| agent.target) else {
        return;
    };
    if let Some(prey) = sim.agent_mut(prey_id) {
        if prey.hunter == Some(hunter) {
            prey.is_chased = false;
            prey.is_forced_no_op = false;
            prey.hunter = None;
        }
    }
}

fn is_dead<S>(_: &S, view: &WorldView<'_>) -> bool {
    view.agent().is_some_and(Agent::is_dead)
}

fn is_chased<S>(_: &S, view: &WorldView<'_>) -> bool {
    view.agent().is_some_and(|agent| agent.is_chased)
}

fn not_chased<S>(_: &S, view: &WorldView<'_>) -> bool {
    view.agent().is_some_and(|agent| !agent.is_chased)
}

fn is_forced<S>(_: &S, view: &WorldView<'_>) -> bool {
    view.agent().is_some_and(|agent| agent.is_forced_no_op)
}

fn not_forced<S>(_: &S, view: &WorldView<'_>) -> bool {
    view.agent().is_some_and(|agent| !agent.is_forced_no_op)
}

fn wants_forage<S>(_: &S, view: &WorldView<'_>) -> bool {
    find_forage(view.sim, view.owner).is_some()
}

fn wants_partner<S>(_: &S, view: &WorldView<'_>) -> bool {
    let Some(agent) = view.agent() else {
        return false;
    };
    let config = view.config();
    agent.is_willing_to_mate(config.hunger_threshold, config.thirst_threshold)
        && (linked_partner(view.sim, view.owner).is_some()
            || find_partner(view.sim, view.owner).is_some())
}

/// Idle for a random while
#[derive(Debug, Clone, Default)]
pub struct Stand {
    wait: f64,
    elapsed: f64,
}

impl Stand {
    fn rested(&self, _: &WorldView<'_>) -> bool {
        self.elapsed >= self.wait
    }
}

impl State for Stand {
    const ID: StateId = StateId::Stand;
    const TRANSITIONS: &'static [Transition<Self>] = &[
        Transition {
            target: StateId::Dead,
            guard: is_dead,
        },
        Transition {
            target: StateId::Escape,
            guard: is_chased,
        },
        Transition {
            target: StateId::MoveToFoodSource,
            guard: wants_forage,
        },
        Transition {
            target: StateId::MoveToPartner,
            guard: wants_partner,
        },
        Transition {
            target: StateId::Wander,
            guard: Stand::rested,
        },
    ];

    fn on_enter(&mut self, sim: &mut Simulation, _owner: EntityId) {
        let (min, max) = (sim.config().stand_min_wait, sim.config().stand_max_wait);
        self.elapsed = 0.0;
        self.wait = if max > min {
            sim.rng().gen_range(min..=max)
        } else {
            min
        };
    }

    fn update(&mut self, _sim: &mut Simulation, _owner: EntityId, dt: f64) {
        self.elapsed += dt;
    }
}

/// Stroll to a random reachable point
#[derive(Debug, Clone, Default)]
pub struct Wander {
    target: Option<Vector2D>,
}

impl Wander {
    fn has_no_target(&self, _: &WorldView<'_>) -> bool {
        self.target.is_none()
    }
}

impl State for Wander {
    const ID: StateId = StateId::Wander;
    const TRANSITIONS: &'static [Transition<Self>] = &[
        Transition {
            target: StateId::Dead,
            guard: is_dead,
        },
        Transition {
            target: StateId::Escape,
            guard: is_chased,
        },
        Transition {
            target: StateId::Stand,
            guard: Wander::has_no_target,
        },
    ];

    fn on_enter(&mut self, sim: &mut Simulation, owner: EntityId) {
        let Some(agent) = sim.agent(owner) else {
            return;
        };
        let (origin, view_range, reach, mobility) = (
            agent.position(),
            agent.view_range,
            agent.body.interaction_range,
            agent.mobility(),
        );
        self.target = sim.random_movement_target_in_range(
            origin,
            view_range,
            reach,
            mobility,
            Vector2D::ZERO,
        );
    }

    fn update(&mut self, sim: &mut Simulation, owner: EntityId, dt: f64) {
        let Some(target) = self.target else {
            return;
        };
        match move_towards(sim, owner, target, None, dt) {
            Step::Moved => {}
            Step::Arrived | Step::Blocked => self.target = None,
        }
    }
}

/// Walk to the chosen food or water
#[derive(Debug, Clone, Default)]
pub struct MoveToFoodSource;

impl MoveToFoodSource {
    fn select_source(sim: &mut Simulation, owner: EntityId) {
        let forage = find_forage(sim, owner);
        if let Some(agent) = sim.agent_mut(owner) {
            agent.target = None;
            agent.water_source = None;
            match forage {
                Some(Forage::Food(id)) => agent.target = Some(id),
                Some(Forage::Water(point)) => agent.water_source = Some(point),
                None => {}
            }
        }
    }

    fn targets_agent(&self, view: &WorldView<'_>) -> bool {
        view.agent()
            .and_then(|agent| agent.target)
            .is_some_and(|target| view.sim.agent(target).is_some())
    }

    fn reached_source(&self, view: &WorldView<'_>) -> bool {
        let Some(agent) = view.agent() else {
            return false;
        };
        let reach = agent.body.interaction_range;

        if let Some(target) = agent.target {
            let (Some(food), Some(position)) = (view.sim.entity(target), view.position_of(target))
            else {
                return false;
            };
            do_circles_intersect(agent.position(), reach, position, food.interaction_range())
                && food.can_be_eaten(agent.strength)
        } else if let Some(water) = agent.water_source {
            do_circles_intersect(agent.position(), reach, water, 0.0)
        } else {
            false
        }
    }

    fn has_no_source(&self, view: &WorldView<'_>) -> bool {
        view.agent().is_some_and(|agent| {
            let food_gone = agent
                .target
                .map_or(true, |target| view.sim.entity(target).is_none());
            food_gone && agent.water_source.is_none()
        })
    }
}

impl State for MoveToFoodSource {
    const ID: StateId = StateId::MoveToFoodSource;
    const TRANSITIONS: &'static [Transition<Self>] = &[
        Transition {
            target: StateId::Dead,
            guard: is_dead,
        },
        Transition {
            target: StateId::Escape,
            guard: is_chased,
        },
        Transition {
            target: StateId::Hunt,
            guard: MoveToFoodSource::targets_agent,
        },
        Transition {
            target: StateId::Ingestion,
            guard: MoveToFoodSource::reached_source,
        },
        Transition {
            target: StateId::Wander,
            guard: MoveToFoodSource::has_no_source,
        },
    ];

    fn on_enter(&mut self, sim: &mut Simulation, owner: EntityId) {
        Self::select_source(sim, owner);
    }

    fn update(&mut self, sim: &mut Simulation, owner: EntityId, dt: f64) {
        let Some(agent) = sim.agent(owner) else {
            return;
        };
        let (strength, target, water) = (agent.strength, agent.target, agent.water_source);

        let step = if let Some(target) = target {
            let edible = sim
                .entity(target)
                .is_some_and(|food| food.can_be_eaten(strength));
            match sim.position_of(target) {
                Some(position) if edible => move_towards(sim, owner, position, Some(target), dt),
                _ => Step::Blocked,
            }
        } else if let Some(water) = water {
            move_towards(sim, owner, water, None, dt)
        } else {
            return;
        };

        // the source went stale; pick another or give up
        if step == Step::Blocked {
            Self::select_source(sim, owner);
        }
    }
}

/// Chase another agent
#[derive(Debug, Clone, Default)]
pub struct Hunt {
    lost: bool,
}

impl Hunt {
    fn prey<'a>(view: &WorldView<'a>) -> Option<(&'a Agent, &'a Agent, Vector2D)> {
        let hunter = view.agent()?;
        let prey_id = hunter.target?;
        let prey = view.sim.agent(prey_id)?;
        Some((hunter, prey, view.position_of(prey_id)?))
    }

    fn caught_prey(&self, view: &WorldView<'_>) -> bool {
        Self::prey(view).is_some_and(|(hunter, prey, position)| {
            do_circles_intersect(
                hunter.position(),
                hunter.body.interaction_range,
                position,
                prey.body.interaction_range,
            ) && prey.can_be_eaten(hunter.strength)
        })
    }

    fn lost_prey(&self, view: &WorldView<'_>) -> bool {
        self.lost
            || Self::prey(view).map_or(true, |(hunter, prey, position)| {
                !prey.can_be_eaten(hunter.strength)
                    || hunter.position().distance(&position) > hunter.view_range
            })
    }
}

impl State for Hunt {
    const ID: StateId = StateId::Hunt;
    const TRANSITIONS: &'static [Transition<Self>] = &[
        Transition {
            target: StateId::Dead,
            guard: is_dead,
        },
        Transition {
            target: StateId::Escape,
            guard: is_chased,
        },
        Transition {
            target: StateId::Ingestion,
            guard: Hunt::caught_prey,
        },
        Transition {
            target: StateId::MoveToFoodSource,
            guard: Hunt::lost_prey,
        },
    ];

    fn update(&mut self, sim: &mut Simulation, owner: EntityId, dt: f64) {
        let Some(prey_id) = sim.agent(owner).and_then(|agent| agent.target) else {
            self.lost = true;
            return;
        };
        match sim.agent_mut(prey_id) {
            Some(prey) => {
                prey.is_chased = true;
                prey.hunter = Some(owner);
            }
            None => {
                self.lost = true;
                return;
            }
        }

        let Some(position) = sim.position_of(prey_id) else {
            self.lost = true;
            return;
        };
        if move_towards(sim, owner, position, Some(prey_id), dt) == Step::Blocked {
            self.lost = true;
        }
    }

    fn on_exit(&mut self, sim: &mut Simulation, owner: EntityId, next: StateId) {
        if next != StateId::Ingestion {
            release_prey(sim, owner);
        }
    }
}

/// Flee from a hunter
#[derive(Debug, Clone, Default)]
pub struct Escape {
    target: Option<Vector2D>,
    blocked: bool,
}

impl Escape {
    pub fn target(&self) -> Option<Vector2D> {
        self.target
    }

    fn is_blocked(&self, view: &WorldView<'_>) -> bool {
        if self.blocked {
            return true;
        }
        let (Some(target), Some(agent)) = (self.target, view.agent()) else {
            return false;
        };
        let exempt = [view.owner];
        let query = PathQuery::new(
            agent.position(),
            target,
            agent.body.interaction_range,
            agent.mobility(),
        )
        .exempt(&exempt);
        !view.sim.can_move_to(&query)
    }

    fn has_no_target(&self, _: &WorldView<'_>) -> bool {
        self.target.is_none()
    }
}

impl State for Escape {
    const ID: StateId = StateId::Escape;
    const TRANSITIONS: &'static [Transition<Self>] = &[
        Transition {
            target: StateId::Dead,
            guard: is_dead,
        },
        Transition {
            target: StateId::NoOp,
            guard: is_forced,
        },
        Transition {
            target: StateId::Escape,
            guard: Escape::is_blocked,
        },
        Transition {
            target: StateId::Stand,
            guard: Escape::has_no_target,
        },
        Transition {
            target: StateId::Wander,
            guard: not_chased,
        },
    ];

    fn on_enter(&mut self, sim: &mut Simulation, owner: EntityId) {
        let Some(agent) = sim.agent(owner) else {
            return;
        };
        let (origin, view_range, reach, mobility) = (
            agent.position(),
            agent.view_range,
            agent.body.interaction_range,
            agent.mobility(),
        );
        let away = agent
            .hunter
            .and_then(|hunter| sim.position_of(hunter))
            .map_or(Vector2D::ZERO, |hunter| hunter.direction_to(&origin));

        self.blocked = false;
        self.target = sim
            .random_movement_target_in_range_in_direction(
                origin,
                view_range,
                reach,
                mobility,
                Vector2D::ZERO,
                away,
            )
            .or_else(|| {
                sim.random_movement_target_in_range(
                    origin,
                    view_range,
                    reach,
                    mobility,
                    Vector2D::ZERO,
                )
            });
    }

    fn update(&mut self, sim: &mut Simulation, owner: EntityId, dt: f64) {
        let Some(target) = self.target else {
            return;
        };
        match move_towards(sim, owner, target, None, dt) {
            Step::Moved => {}
            Step::Arrived => self.target = None,
            Step::Blocked => self.blocked = true,
        }
    }
}

/// Eat the target or drink at the water source
#[derive(Debug, Clone, Default)]
pub struct Ingestion {
    elapsed: f64,
    done: bool,
}

impl Ingestion {
    fn is_done(&self, _: &WorldView<'_>) -> bool {
        self.done
    }

    fn done_and_still_needy(&self, view: &WorldView<'_>) -> bool {
        self.done && wants_forage(self, view)
    }

    fn finish(sim: &mut Simulation, owner: EntityId) {
        let Some(agent) = sim.agent(owner) else {
            return;
        };
        let (strength, target, water) = (agent.strength, agent.target, agent.water_source);

        if let Some(target) = target {
            let eaten = match sim.entity_mut(target) {
                Some(food) if food.can_be_eaten(strength) => {
                    food.eat();
                    true
                }
                _ => false,
            };
            if let Some(agent) = sim.agent_mut(owner) {
                if eaten {
                    agent.set_nutrition(agent.max_nutrition);
                }
                agent.target = None;
            }
            debug!(entity = owner.as_u64(), food = target.as_u64(), eaten, "meal finished");
        } else if water.is_some() {
            if let Some(agent) = sim.agent_mut(owner) {
                agent.set_hydration(agent.max_hydration);
                agent.water_source = None;
            }
        }
    }
}

impl State for Ingestion {
    const ID: StateId = StateId::Ingestion;
    const TRANSITIONS: &'static [Transition<Self>] = &[
        Transition {
            target: StateId::Dead,
            guard: is_dead,
        },
        Transition {
            target: StateId::MoveToFoodSource,
            guard: Ingestion::done_and_still_needy,
        },
        Transition {
            target: StateId::Wander,
            guard: Ingestion::is_done,
        },
    ];

    fn on_enter(&mut self, sim: &mut Simulation, owner: EntityId) {
        let Some(prey_id) = sim.agent(owner).and_then(|agent| agent.target) else {
            return;
        };
        let Some(prey) = sim.agent_mut(prey_id) else {
            return;
        };
        prey.is_forced_no_op = true;
        prey.is_chased = true;
        prey.hunter = Some(owner);

        if let Err(err) = sim.set_state(prey_id, StateId::NoOp) {
            warn!(entity = owner.as_u64(), prey = prey_id.as_u64(), %err, "could not hold prey");
        }
    }

    fn update(&mut self, sim: &mut Simulation, owner: EntityId, dt: f64) {
        if self.done {
            return;
        }
        self.elapsed += dt;
        if self.elapsed >= sim.config().ingestion_duration {
            self.done = true;
            Self::finish(sim, owner);
        }
    }

    fn on_exit(&mut self, sim: &mut Simulation, owner: EntityId, _next: StateId) {
        release_prey(sim, owner);
    }
}

/// Approach a linked partner. Only the male moves.
#[derive(Debug, Clone, Default)]
pub struct MoveToPartner {
    blocked: bool,
}

impl MoveToPartner {
    fn partner_reached(&self, view: &WorldView<'_>) -> bool {
        let (Some(agent), Some((partner_id, partner))) =
            (view.agent(), linked_partner(view.sim, view.owner))
        else {
            return false;
        };
        let Some(position) = view.position_of(partner_id) else {
            return false;
        };
        let partner_ready = matches!(
            view.sim.state_of(partner_id),
            Some(StateId::MoveToPartner | StateId::Mate)
        );
        partner_ready
            && do_circles_intersect(
                agent.position(),
                agent.body.interaction_range,
                position,
                partner.body.interaction_range,
            )
    }

    fn link_broken(&self, view: &WorldView<'_>) -> bool {
        self.blocked || linked_partner(view.sim, view.owner).is_none()
    }
}

impl State for MoveToPartner {
    const ID: StateId = StateId::MoveToPartner;
    const TRANSITIONS: &'static [Transition<Self>] = &[
        Transition {
            target: StateId::Dead,
            guard: is_dead,
        },
        Transition {
            target: StateId::Escape,
            guard: is_chased,
        },
        Transition {
            target: StateId::Mate,
            guard: MoveToPartner::partner_reached,
        },
        Transition {
            target: StateId::Wander,
            guard: MoveToPartner::link_broken,
        },
    ];

    fn on_enter(&mut self, sim: &mut Simulation, owner: EntityId) {
        self.blocked = false;
        if linked_partner(sim, owner).is_some() {
            return;
        }

        let found = find_partner(sim, owner);
        if let Some(agent) = sim.agent_mut(owner) {
            agent.partner = found;
        }
        let Some(partner_id) = found else {
            return;
        };
        if let Some(partner) = sim.agent_mut(partner_id) {
            partner.partner = Some(owner);
        }
        if let Err(err) = sim.set_state(partner_id, StateId::MoveToPartner) {
            warn!(
                entity = owner.as_u64(),
                partner = partner_id.as_u64(),
                %err,
                "could not court partner"
            );
        }
        debug!(entity = owner.as_u64(), partner = partner_id.as_u64(), "courtship started");
    }

    fn update(&mut self, sim: &mut Simulation, owner: EntityId, dt: f64) {
        if sim.agent(owner).map(|agent| agent.gender) != Some(Gender::Male) {
            return;
        }
        let Some((partner_id, _)) = linked_partner(sim, owner) else {
            return;
        };
        let Some(position) = sim.position_of(partner_id) else {
            return;
        };
        if move_towards(sim, owner, position, Some(partner_id), dt) == Step::Blocked {
            self.blocked = true;
        }
    }

    fn on_exit(&mut self, sim: &mut Simulation, owner: EntityId, next: StateId) {
        if next != StateId::Mate {
            unlink_partner(sim, owner);
        }
    }
}

/// Reproduce with the linked partner
#[derive(Debug, Clone, Default)]
pub struct Mate {
    elapsed: f64,
    done: bool,
}

impl Mate {
    fn is_done(&self, _: &WorldView<'_>) -> bool {
        self.done
    }

    fn finish(sim: &mut Simulation, owner: EntityId) {
        let Some(agent) = sim.agent_mut(owner) else {
            return;
        };
        agent.set_reproduction_value(0.0);
        let (partner, gender, position, params) =
            (agent.partner, agent.gender, agent.position(), agent.params());

        if let Some(partner_id) = partner {
            if let Some(partner) = sim.agent_mut(partner_id) {
                if partner.partner == Some(owner) {
                    partner.set_reproduction_value(0.0);
                }
            }
        }

        if gender == Gender::Female {
            sim.request_birth(BirthRequest {
                mother: owner,
                father: partner,
                position,
                params,
            });
        }
    }
}

impl State for Mate {
    const ID: StateId = StateId::Mate;
    const TRANSITIONS: &'static [Transition<Self>] = &[
        Transition {
            target: StateId::Dead,
            guard: is_dead,
        },
        Transition {
            target: StateId::Wander,
            guard: Mate::is_done,
        },
    ];

    fn update(&mut self, sim: &mut Simulation, owner: EntityId, dt: f64) {
        if self.done {
            return;
        }
        self.elapsed += dt;
        if self.elapsed >= sim.config().mating_duration {
            self.done = true;
            Self::finish(sim, owner);
        }
    }

    fn on_exit(&mut self, sim: &mut Simulation, owner: EntityId, _next: StateId) {
        unlink_partner(sim, owner);
    }
}

/// Frozen while a hunter feeds
#[derive(Debug, Clone, Default)]
pub struct NoOp;

impl State for NoOp {
    const ID: StateId = StateId::NoOp;
    const TRANSITIONS: &'static [Transition<Self>] = &[
        Transition {
            target: StateId::Dead,
            guard: is_dead,
        },
        Transition {
            target: StateId::Wander,
            guard: not_forced,
        },
    ];
}

/// Terminal. Removes the agent once.
#[derive(Debug, Clone, Default)]
pub struct Dead {
    removed: bool,
}

impl State for Dead {
    const ID: StateId = StateId::Dead;
    const TRANSITIONS: &'static [Transition<Self>] = &[];

    fn update(&mut self, sim: &mut Simulation, owner: EntityId, _dt: f64) {
        if self.removed {
            return;
        }
        self.removed = true;
        release_prey(sim, owner);
        unlink_partner(sim, owner);
        sim.mark_for_removal(owner);
    }
}
