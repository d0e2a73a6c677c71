//! Fixed-step simulation
//!
//! One tick, in order:
//! 1. advance every ship and re-home it, announcing turns on a cell change
//! 2. advance every rocket and retire the ones that left the world
//! 3. re-home surviving rockets, announcing first sightings on a cell change
//! 4. scan nearby ships for a hit; the first hit destroys the rocket

use crate::game::entity::{Motion, RocketFate, RocketId, ShipId};
use crate::game::world::World;
use crate::net::broadcast::Dispatch;

/// Counters for a single tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickStats {
    pub tick: u64,
    pub ships_rehomed: usize,
    pub rockets_rehomed: usize,
    pub rockets_retired: usize,
    pub hits: usize,
}

/// Everything a tick produced
#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    /// Messages to deliver, in causal order
    pub dispatches: Vec<Dispatch>,
    pub stats: TickStats,
}

/// Drives the world one fixed step at a time
#[derive(Debug, Clone)]
pub struct TickEngine {
    world: World,
    tick: u64,
}

impl TickEngine {
    pub fn new(world: World) -> Self {
        Self { world, tick: 0 }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Player actions are applied between ticks through the world
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Ticks completed so far
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Run one simulation step
    pub fn tick(&mut self) -> TickOutcome {
        self.tick += 1;
        let mut outcome = TickOutcome {
            dispatches: Vec::new(),
            stats: TickStats {
                tick: self.tick,
                ..TickStats::default()
            },
        };

        self.step_ships(&mut outcome);
        self.step_rockets(&mut outcome);

        tracing::trace!(
            tick = self.tick,
            ships = self.world.ship_count(),
            rockets = self.world.rocket_count(),
            dispatches = outcome.dispatches.len(),
            "Tick complete"
        );
        outcome
    }

    fn step_ships(&mut self, outcome: &mut TickOutcome) {
        let world = &mut self.world;
        let ids: Vec<ShipId> = world.ships.keys().copied().collect();

        for id in ids {
            let Some(ship) = world.ships.get_mut(&id) else {
                continue;
            };
            ship.advance(&world.config);
            let position = ship.position;

            match world.interest.update_ship_cell(id, position) {
                Ok(true) => {
                    outcome.stats.ships_rehomed += 1;
                    world.announce_ship(id, &mut outcome.dispatches);
                }
                Ok(false) => {}
                Err(e) => tracing::debug!("Ship {} not re-homed: {}", id, e),
            }
        }
    }

    fn step_rockets(&mut self, outcome: &mut TickOutcome) {
        let ids: Vec<RocketId> = self.world.rockets.keys().copied().collect();
        for id in ids {
            self.step_rocket(id, outcome);
        }
    }

    fn step_rocket(&mut self, id: RocketId, outcome: &mut TickOutcome) {
        let world = &mut self.world;
        let Some(rocket) = world.rockets.get_mut(&id) else {
            return;
        };
        rocket.advance(&world.config);
        let position = rocket.position;

        if !world.config.contains(position) {
            world.destroy_rocket(id, RocketFate::OutOfBounds);
            outcome.stats.rockets_retired += 1;
            return;
        }

        match world.interest.update_rocket_cell(id, position) {
            Ok(true) => {
                outcome.stats.rockets_rehomed += 1;
                world.announce_rocket(id, &mut outcome.dispatches);
            }
            Ok(false) => {}
            Err(e) => tracing::debug!("Rocket {} not re-homed: {}", id, e),
        }

        if let Some(victim) = self.find_victim(id) {
            self.world.register_hit(id, victim, &mut outcome.dispatches);
            outcome.stats.hits += 1;
        }
    }

    /// First ship (lowest id) among the nearby candidates that the rocket hits
    fn find_victim(&self, id: RocketId) -> Option<ShipId> {
        let world = &self.world;
        let rocket = world.rockets.get(&id)?;
        let radius = world.config.rocket_radius;

        world
            .interest
            .ships_near(rocket.position, radius)
            .into_iter()
            .filter(|candidate| *candidate != rocket.origin)
            .find(|candidate| {
                world
                    .ships
                    .get(candidate)
                    .map_or(false, |ship| rocket.hits(ship, radius))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;
    use crate::game::entity::Heading;
    use crate::interest::grid::CellCoord;
    use crate::net::broadcast::Delivery;
    use crate::net::protocol::ServerMessage;
    use crate::util::vec2::Vec2;

    fn still_ships() -> WorldConfig {
        WorldConfig {
            ship_speed: 0.0,
            ..WorldConfig::default()
        }
    }

    fn engine(config: WorldConfig) -> TickEngine {
        TickEngine::new(World::new(config))
    }

    fn hits(outcome: &TickOutcome) -> Vec<&Dispatch> {
        outcome
            .dispatches
            .iter()
            .filter(|d| matches!(d.message, ServerMessage::Hit { .. }))
            .collect()
    }

    fn rocket_cells(engine: &TickEngine, id: RocketId) -> Vec<CellCoord> {
        engine
            .world()
            .interest()
            .grid()
            .cells()
            .filter(|c| c.has_rocket(id))
            .map(|c| c.coord())
            .collect()
    }

    #[test]
    fn test_rocket_hits_stationary_ship() {
        let mut e = engine(still_ships());
        let mut out = Vec::new();
        let world = e.world_mut();
        world.join_at(1, Vec2::new(100.0, 400.0), Heading::Up, &mut out);
        world.join_at(2, Vec2::new(150.0, 100.0), Heading::Up, &mut out);
        let rocket = world.fire(1, Vec2::new(100.0, 100.0), Heading::Right, &mut out).unwrap();

        // Strictly inside radius 12 first at x=140 (distance 10)
        for tick in 1..=3 {
            let outcome = e.tick();
            assert!(hits(&outcome).is_empty(), "premature hit at tick {}", tick);
            assert_eq!(e.world().rocket(rocket).unwrap().position.x, 100.0 + 10.0 * tick as f32);
        }

        let outcome = e.tick();
        let hit = ServerMessage::Hit { rocket, ship: 2 };
        assert_eq!(
            hits(&outcome),
            vec![&Dispatch::unicast(1, hit.clone()), &Dispatch::unicast(2, hit)]
        );
        assert_eq!(outcome.stats.hits, 1);
        assert!(e.world().rocket(rocket).is_none());
        assert!(rocket_cells(&e, rocket).is_empty());
        assert_eq!(e.world().ship(2).unwrap().hits, 1);
        assert_eq!(e.world().ship(1).unwrap().kills, 1);
    }

    #[test]
    fn test_rocket_never_hits_shooter() {
        let mut e = engine(still_ships());
        let mut out = Vec::new();
        let world = e.world_mut();
        world.join_at(1, Vec2::new(150.0, 100.0), Heading::Up, &mut out);
        let rocket = world.fire(1, Vec2::new(100.0, 100.0), Heading::Right, &mut out).unwrap();

        for _ in 0..100 {
            let outcome = e.tick();
            assert!(hits(&outcome).is_empty());
        }
        assert!(e.world().rocket(rocket).is_none(), "rocket should retire off the right edge");
        assert_eq!(e.world().ship(1).unwrap().hits, 0);
    }

    #[test]
    fn test_lowest_id_victim_wins() {
        let mut e = engine(still_ships());
        let mut out = Vec::new();
        let world = e.world_mut();
        world.join_at(1, Vec2::new(500.0, 600.0), Heading::Up, &mut out);
        world.join_at(3, Vec2::new(120.0, 104.0), Heading::Up, &mut out);
        world.join_at(2, Vec2::new(120.0, 96.0), Heading::Up, &mut out);
        let rocket = world.fire(1, Vec2::new(110.0, 100.0), Heading::Right, &mut out).unwrap();

        let outcome = e.tick();
        let victims: Vec<_> = hits(&outcome)
            .iter()
            .map(|d| match d.message {
                ServerMessage::Hit { ship, .. } => ship,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(victims, vec![2, 2]);
        assert!(e.world().rocket(rocket).is_none());
        assert_eq!(e.world().ship(3).unwrap().hits, 0);
    }

    #[test]
    fn test_out_of_bounds_rocket_retired() {
        let mut e = engine(WorldConfig::default());
        let mut out = Vec::new();
        let world = e.world_mut();
        world.join_at(1, Vec2::new(500.0, 350.0), Heading::Up, &mut out);
        let rocket = world.fire(1, Vec2::new(995.0, 10.0), Heading::Right, &mut out).unwrap();

        let outcome = e.tick();
        assert_eq!(outcome.stats.rockets_retired, 1);
        assert!(e.world().rocket(rocket).is_none());
        assert!(rocket_cells(&e, rocket).is_empty());
        assert!(e.world().sightings().is_empty());
    }

    #[test]
    fn test_rocket_sighting_sent_once() {
        let mut e = engine(still_ships());
        let mut out = Vec::new();
        let world = e.world_mut();
        world.join_at(1, Vec2::new(25.0, 600.0), Heading::Up, &mut out);
        // Watcher whose horizontal arm spans columns 5..=15 on rows 6..=8
        world.join_at(2, Vec2::new(500.0, 350.0), Heading::Up, &mut out);
        let rocket = world.fire(1, Vec2::new(200.0, 375.0), Heading::Right, &mut out).unwrap();
        out.clear();

        let mut sightings = 0;
        for _ in 0..60 {
            let outcome = e.tick();
            for d in &outcome.dispatches {
                if let ServerMessage::Fire { rocket: r, .. } = d.message {
                    assert_eq!(r, rocket);
                    assert_eq!(d.delivery, Delivery::Selective(vec![2]));
                    sightings += 1;
                }
            }
            if e.world().rocket(rocket).is_none() {
                break;
            }
        }
        assert_eq!(sightings, 1, "watcher must be told about the rocket exactly once");
    }

    #[test]
    fn test_moving_ship_announced_on_cell_change() {
        let mut e = engine(WorldConfig::default());
        let mut out = Vec::new();
        let world = e.world_mut();
        world.join_at(1, Vec2::new(500.0, 350.0), Heading::Right, &mut out);
        world.join_at(2, Vec2::new(520.0, 380.0), Heading::Left, &mut out);

        let mut announced = Vec::new();
        for _ in 0..10 {
            let outcome = e.tick();
            for d in outcome.dispatches {
                if let ServerMessage::Turn { id, .. } = d.message {
                    announced.push((e.current_tick(), id, d.delivery));
                }
            }
        }

        // Ship 1 crosses x=550 at tick 10; ship 2 crosses x=500 at tick 5
        assert_eq!(
            announced,
            vec![
                (5, 2, Delivery::Selective(vec![1])),
                (10, 1, Delivery::Selective(vec![2])),
            ]
        );
    }

    #[test]
    fn test_rocket_single_home_every_tick() {
        let mut e = engine(WorldConfig::default());
        let mut out = Vec::new();
        let world = e.world_mut();
        world.join_at(1, Vec2::new(500.0, 350.0), Heading::Up, &mut out);
        let a = world.fire(1, Vec2::new(10.0, 10.0), Heading::Down, &mut out).unwrap();
        let b = world.fire(1, Vec2::new(990.0, 690.0), Heading::Left, &mut out).unwrap();

        for _ in 0..120 {
            e.tick();
            for id in [a, b] {
                let cells = rocket_cells(&e, id);
                match e.world().interest().rocket_home(id) {
                    Some(home) => assert_eq!(cells, vec![home]),
                    None => assert!(cells.is_empty()),
                }
            }
        }
    }

    #[test]
    fn test_tick_counter() {
        let mut e = engine(WorldConfig::default());
        assert_eq!(e.tick().stats.tick, 1);
        assert_eq!(e.tick().stats.tick, 2);
        assert_eq!(e.current_tick(), 2);
    }
}
