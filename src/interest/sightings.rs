//! Fire-sighting deduplication
//!
//! Remembers which rockets have already been announced to which ships so a
//! rocket drifting through several overlapping AOI cells is announced once.
//! Entries are dropped when the rocket is destroyed or the ship leaves.

use hashbrown::{HashMap, HashSet};

use crate::game::entity::{RocketId, ShipId};

#[derive(Debug, Clone, Default)]
pub struct SightingLog {
    seen_by_ship: HashMap<ShipId, HashSet<RocketId>>,
    /// Reverse index so a destroyed rocket can be purged without a full scan
    seen_by_rocket: HashMap<RocketId, HashSet<ShipId>>,
    pairs: usize,
}

impl SightingLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `ship` has been told about `rocket`.
    ///
    /// Returns true only the first time a pair is seen.
    pub fn mark_seen_if_new(&mut self, ship: ShipId, rocket: RocketId) -> bool {
        let inserted = self.seen_by_ship.entry(ship).or_default().insert(rocket);
        if inserted {
            self.seen_by_rocket.entry(rocket).or_default().insert(ship);
            self.pairs += 1;
        }
        inserted
    }

    pub fn has_seen(&self, ship: ShipId, rocket: RocketId) -> bool {
        self.seen_by_ship
            .get(&ship)
            .map_or(false, |rockets| rockets.contains(&rocket))
    }

    /// Drop every sighting of a destroyed rocket
    pub fn forget_rocket(&mut self, rocket: RocketId) {
        let Some(ships) = self.seen_by_rocket.remove(&rocket) else {
            return;
        };
        for ship in ships {
            if let Some(rockets) = self.seen_by_ship.get_mut(&ship) {
                if rockets.remove(&rocket) {
                    self.pairs -= 1;
                }
                if rockets.is_empty() {
                    self.seen_by_ship.remove(&ship);
                }
            }
        }
    }

    /// Drop every sighting recorded for a departed ship
    pub fn forget_ship(&mut self, ship: ShipId) {
        let Some(rockets) = self.seen_by_ship.remove(&ship) else {
            return;
        };
        self.pairs -= rockets.len();
        for rocket in rockets {
            if let Some(ships) = self.seen_by_rocket.get_mut(&rocket) {
                ships.remove(&ship);
                if ships.is_empty() {
                    self.seen_by_rocket.remove(&rocket);
                }
            }
        }
    }

    /// Number of recorded (ship, rocket) pairs
    pub fn len(&self) -> usize {
        self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs == 0
    }
}
