//! World aggregate
//!
//! Owns every ship and rocket together with the interest-management state
//! that scopes their events. Player actions and the tick engine both mutate
//! the world through the methods here; each appends the resulting
//! [`Dispatch`]es to a caller-supplied buffer instead of writing to sockets.

use std::collections::BTreeMap;

use rand::Rng;

use crate::config::WorldConfig;
use crate::game::entity::{Heading, PlayerId, Rocket, RocketFate, RocketId, Ship, ShipId};
use crate::interest::sightings::SightingLog;
use crate::interest::subscriptions::SubscriptionTracker;
use crate::interest::{EntityRef, InterestError};
use crate::net::broadcast::Dispatch;
use crate::net::protocol::ServerMessage;
use crate::util::vec2::Vec2;

#[derive(Debug, Clone)]
pub struct World {
    pub(crate) config: WorldConfig,
    pub(crate) ships: BTreeMap<ShipId, Ship>,
    pub(crate) rockets: BTreeMap<RocketId, Rocket>,
    pub(crate) interest: SubscriptionTracker,
    pub(crate) sightings: SightingLog,
    next_player_id: PlayerId,
    next_rocket_id: RocketId,
}

impl World {
    pub fn new(config: WorldConfig) -> Self {
        Self {
            interest: SubscriptionTracker::from_config(&config),
            config,
            ships: BTreeMap::new(),
            rockets: BTreeMap::new(),
            sightings: SightingLog::new(),
            next_player_id: 1,
            next_rocket_id: 1,
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn interest(&self) -> &SubscriptionTracker {
        &self.interest
    }

    pub fn sightings(&self) -> &SightingLog {
        &self.sightings
    }

    pub fn ship(&self, id: ShipId) -> Option<&Ship> {
        self.ships.get(&id)
    }

    pub fn rocket(&self, id: RocketId) -> Option<&Rocket> {
        self.rockets.get(&id)
    }

    pub fn ships(&self) -> impl Iterator<Item = &Ship> {
        self.ships.values()
    }

    pub fn rockets(&self) -> impl Iterator<Item = &Rocket> {
        self.rockets.values()
    }

    pub fn ship_count(&self) -> usize {
        self.ships.len()
    }

    pub fn rocket_count(&self) -> usize {
        self.rockets.len()
    }

    /// Next player id. Ids are never reused.
    pub fn allocate_player_id(&mut self) -> PlayerId {
        let id = self.next_player_id;
        self.next_player_id += 1;
        id
    }

    fn allocate_rocket_id(&mut self) -> RocketId {
        let id = self.next_rocket_id;
        self.next_rocket_id += 1;
        id
    }

    // ========================================================================
    // Player actions
    // ========================================================================

    /// Spawn a ship for `id` at a random integer position with a random
    /// heading. Returns false if the player already has a ship.
    pub fn join<R: Rng>(&mut self, id: ShipId, rng: &mut R, out: &mut Vec<Dispatch>) -> bool {
        let position = Vec2::new(
            rng.gen_range(0.0..self.config.width).floor(),
            rng.gen_range(0.0..self.config.height).floor(),
        );
        let heading = Heading::random(rng);
        self.join_at(id, position, heading, out)
    }

    /// Spawn a ship at a fixed position.
    ///
    /// Announces the ship to everyone else, confirms the join to the player
    /// and introduces every ship already in play.
    pub fn join_at(&mut self, id: ShipId, position: Vec2, heading: Heading, out: &mut Vec<Dispatch>) -> bool {
        if self.ships.contains_key(&id) {
            tracing::warn!("Player {} already has a ship, ignoring join", id);
            return false;
        }

        if let Err(e) = self.interest.subscribe_ship(id, position) {
            tracing::warn!("Cannot place ship {}: {}", id, e);
            return false;
        }

        let ship = Ship::new(id, position, heading);
        out.push(Dispatch::all_except(id, ServerMessage::new_ship(&ship)));
        out.push(Dispatch::unicast(id, ServerMessage::join(&ship)));
        for other in self.ships.values() {
            out.push(Dispatch::unicast(id, ServerMessage::new_ship(other)));
        }
        self.ships.insert(id, ship);

        tracing::debug!("Ship {} joined at ({}, {}) heading {:?}", id, position.x, position.y, heading);
        true
    }

    /// Move a ship to its reported position and heading, then tell the
    /// ships watching its home cell.
    ///
    /// Positions outside the world wrap around the edges the same way ship
    /// movement does, so the ship always ends up with a home cell.
    pub fn turn(&mut self, id: ShipId, position: Vec2, heading: Heading, out: &mut Vec<Dispatch>) {
        if !position.is_finite() {
            tracing::warn!("Ignoring turn for ship {} to non-finite position", id);
            return;
        }
        let position = self.config.wrap(position);

        let Some(ship) = self.ships.get_mut(&id) else {
            tracing::debug!("Turn from player {} without a ship", id);
            return;
        };
        ship.jump_to(position);
        ship.turn(heading);

        if let Err(e) = self.interest.update_ship_cell(id, position) {
            tracing::warn!("Turn for ship {} not re-homed: {}", id, e);
        }
        self.announce_ship(id, out);
    }

    /// Launch a rocket from `position` and announce it to the ships watching
    /// its home cell. The shooter always learns the rocket id.
    pub fn fire(
        &mut self,
        shooter: ShipId,
        position: Vec2,
        heading: Heading,
        out: &mut Vec<Dispatch>,
    ) -> Result<RocketId, InterestError> {
        if !self.ships.contains_key(&shooter) {
            return Err(InterestError::MissingEntity(EntityRef::Ship(shooter)));
        }

        let id = self.allocate_rocket_id();
        self.interest.subscribe_rocket(id, position)?;
        let rocket = Rocket::new(id, position, heading, shooter);
        let message = ServerMessage::fire(&rocket);
        self.rockets.insert(id, rocket);

        if self.sightings.mark_seen_if_new(shooter, id) {
            out.push(Dispatch::unicast(shooter, message));
        }
        self.announce_rocket(id, out);

        tracing::trace!("Ship {} fired rocket {}", shooter, id);
        Ok(id)
    }

    /// Remove a disconnected player's ship and tell everyone else.
    ///
    /// Returns false if the player never joined. Rockets it fired stay in
    /// flight.
    pub fn remove_ship(&mut self, id: ShipId, out: &mut Vec<Dispatch>) -> bool {
        if self.ships.remove(&id).is_none() {
            return false;
        }
        if let Err(e) = self.interest.unsubscribe_ship(id) {
            tracing::debug!("Removing ship {}: {}", id, e);
        }
        self.sightings.forget_ship(id);
        out.push(Dispatch::all_except(id, ServerMessage::Delete { id }));

        tracing::debug!("Ship {} removed", id);
        true
    }

    // ========================================================================
    // Selective broadcasts
    // ========================================================================

    /// Send a ship's state to the subscribers of its home cell, minus itself
    pub fn announce_ship(&self, id: ShipId, out: &mut Vec<Dispatch>) {
        let (Some(ship), Some(home)) = (self.ships.get(&id), self.interest.ship_home(id)) else {
            return;
        };
        let Ok(mut watchers) = self.interest.ship_subscribers(home) else {
            return;
        };
        watchers.retain(|w| *w != id);
        if !watchers.is_empty() {
            out.push(Dispatch::selective(watchers, ServerMessage::turn(ship)));
        }
    }

    /// Send a rocket sighting to the subscribers of its home cell that have
    /// not been told about it yet
    pub fn announce_rocket(&mut self, id: RocketId, out: &mut Vec<Dispatch>) {
        let (Some(rocket), Some(home)) = (self.rockets.get(&id), self.interest.rocket_home(id)) else {
            return;
        };
        let Ok(mut watchers) = self.interest.ship_subscribers(home) else {
            return;
        };
        watchers.retain(|w| self.sightings.mark_seen_if_new(*w, id));
        if !watchers.is_empty() {
            out.push(Dispatch::selective(watchers, ServerMessage::fire(rocket)));
        }
    }

    // ========================================================================
    // Rocket lifecycle
    // ========================================================================

    /// Drop a rocket and every trace of it. Stale ids are ignored.
    pub fn destroy_rocket(&mut self, id: RocketId, fate: RocketFate) -> Option<Rocket> {
        let rocket = self.rockets.remove(&id)?;
        if let Err(e) = self.interest.unsubscribe_rocket(id) {
            tracing::debug!("Destroying rocket {}: {}", id, e);
        }
        self.sightings.forget_rocket(id);
        tracing::trace!("Rocket {} destroyed: {:?}", id, fate);
        Some(rocket)
    }

    /// Score a hit, notify shooter and victim, and destroy the rocket
    pub fn register_hit(&mut self, rocket: RocketId, victim: ShipId, out: &mut Vec<Dispatch>) {
        let Some(destroyed) = self.destroy_rocket(rocket, RocketFate::Hit { victim }) else {
            return;
        };
        if let Some(ship) = self.ships.get_mut(&victim) {
            ship.hits += 1;
        }
        if let Some(shooter) = self.ships.get_mut(&destroyed.origin) {
            shooter.kills += 1;
        }

        let message = ServerMessage::Hit { rocket, ship: victim };
        out.push(Dispatch::unicast(destroyed.origin, message.clone()));
        out.push(Dispatch::unicast(victim, message));
        tracing::debug!("Rocket {} from ship {} hit ship {}", rocket, destroyed.origin, victim);
    }
}
