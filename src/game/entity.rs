//! Ships and rockets
//!
//! Every entity moves a fixed distance per tick along one of four headings.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::WorldConfig;
use crate::util::vec2::Vec2;

/// Connection-scoped player identifier, assigned monotonically
pub type PlayerId = u64;

/// A ship is keyed by its player's id
pub type ShipId = PlayerId;

/// Rocket identifier, unique for the lifetime of the world
pub type RocketId = u64;

/// One of the four movement directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Heading {
    Up,
    Down,
    Left,
    Right,
}

impl Heading {
    pub const ALL: [Heading; 4] = [Heading::Up, Heading::Down, Heading::Left, Heading::Right];

    /// Unit step for this heading (screen coordinates, y grows downward)
    pub fn unit(self) -> Vec2 {
        match self {
            Heading::Up => Vec2::UP,
            Heading::Down => Vec2::DOWN,
            Heading::Left => Vec2::LEFT,
            Heading::Right => Vec2::RIGHT,
        }
    }

    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }
}

/// Per-tick movement
pub trait Motion {
    fn advance(&mut self, world: &WorldConfig);
}

/// A player's ship
#[derive(Debug, Clone, PartialEq)]
pub struct Ship {
    pub id: ShipId,
    pub position: Vec2,
    pub heading: Heading,
    /// Times this ship has been hit
    pub hits: u32,
    /// Rockets from this ship that hit another ship
    pub kills: u32,
}

impl Ship {
    pub fn new(id: ShipId, position: Vec2, heading: Heading) -> Self {
        Self {
            id,
            position,
            heading,
            hits: 0,
            kills: 0,
        }
    }

    pub fn jump_to(&mut self, position: Vec2) {
        self.position = position;
    }

    pub fn turn(&mut self, heading: Heading) {
        self.heading = heading;
    }
}

impl Motion for Ship {
    /// Move one step and wrap around the world edges
    fn advance(&mut self, world: &WorldConfig) {
        self.position = world.wrap(self.position + self.heading.unit() * world.ship_speed);
    }
}

/// A rocket in flight
#[derive(Debug, Clone, PartialEq)]
pub struct Rocket {
    pub id: RocketId,
    pub position: Vec2,
    pub heading: Heading,
    /// Ship that fired it
    pub origin: ShipId,
}

impl Rocket {
    pub fn new(id: RocketId, position: Vec2, heading: Heading, origin: ShipId) -> Self {
        Self {
            id,
            position,
            heading,
            origin,
        }
    }

    /// Strictly within `radius` of the ship's position. Never true for the
    /// rocket's own shooter.
    pub fn hits(&self, ship: &Ship, radius: f32) -> bool {
        ship.id != self.origin && self.position.distance_sq_to(ship.position) < radius * radius
    }
}

impl Motion for Rocket {
    /// Move one step. Rockets do not wrap; leaving the world retires them.
    fn advance(&mut self, world: &WorldConfig) {
        self.position += self.heading.unit() * world.rocket_speed;
    }
}

/// How a rocket left play
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RocketFate {
    OutOfBounds,
    Hit { victim: ShipId },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_heading_serde() {
        assert_eq!(serde_json::to_string(&Heading::Left).unwrap(), "\"left\"");
        let parsed: Heading = serde_json::from_str("\"up\"").unwrap();
        assert_eq!(parsed, Heading::Up);
        assert!(serde_json::from_str::<Heading>("\"north\"").is_err());
    }

    #[test]
    fn test_heading_unit() {
        assert_eq!(Heading::Up.unit(), Vec2::new(0.0, -1.0));
        assert_eq!(Heading::Right.unit(), Vec2::new(1.0, 0.0));
    }

    #[test]
    fn test_random_heading_covers_all() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = [false; 4];
        for _ in 0..200 {
            let h = Heading::random(&mut rng);
            seen[Heading::ALL.iter().position(|x| *x == h).unwrap()] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_ship_advance_wraps() {
        let world = WorldConfig::default();
        let mut ship = Ship::new(1, Vec2::new(998.0, 10.0), Heading::Right);
        ship.advance(&world);
        assert_eq!(ship.position, Vec2::new(3.0, 10.0));

        let mut ship = Ship::new(2, Vec2::new(10.0, 2.0), Heading::Up);
        ship.advance(&world);
        assert_eq!(ship.position, Vec2::new(10.0, 697.0));
        assert!(world.contains(ship.position));
    }

    #[test]
    fn test_ship_far_outside_returns_in_one_step() {
        let world = WorldConfig::default();
        let mut ship = Ship::new(1, Vec2::new(2500.0, 10.0), Heading::Right);
        ship.advance(&world);
        assert_eq!(ship.position, Vec2::new(505.0, 10.0));
    }

    #[test]
    fn test_ship_jump_and_turn() {
        let mut ship = Ship::new(1, Vec2::new(0.0, 0.0), Heading::Up);
        ship.jump_to(Vec2::new(40.0, 60.0));
        ship.turn(Heading::Left);
        assert_eq!(ship.position, Vec2::new(40.0, 60.0));
        assert_eq!(ship.heading, Heading::Left);
    }

    #[test]
    fn test_rocket_advance_leaves_world() {
        let world = WorldConfig::default();
        let mut rocket = Rocket::new(1, Vec2::new(995.0, 10.0), Heading::Right, 1);
        rocket.advance(&world);
        assert_eq!(rocket.position, Vec2::new(1005.0, 10.0));
        assert!(!world.contains(rocket.position));
    }

    #[test]
    fn test_rocket_hits_is_strict_and_ignores_shooter() {
        let victim = Ship::new(2, Vec2::new(150.0, 100.0), Heading::Up);
        let shooter = Ship::new(1, Vec2::new(140.0, 100.0), Heading::Up);

        let rocket = Rocket::new(1, Vec2::new(140.0, 100.0), Heading::Right, 1);
        assert!(rocket.hits(&victim, 12.0));
        assert!(!rocket.hits(&shooter, 12.0));

        let edge = Rocket::new(2, Vec2::new(138.0, 100.0), Heading::Right, 1);
        assert!(!edge.hits(&victim, 12.0));
    }
}
