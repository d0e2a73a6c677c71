//! Subscription bookkeeping
//!
//! Keeps per-entity records (home cell, and for ships the full AOI cell set)
//! in lockstep with the membership sets held by the grid's cells. Every
//! mutation goes through this type so the two views never disagree.

use std::collections::BTreeSet;

use hashbrown::{HashMap, HashSet};

use crate::config::WorldConfig;
use crate::game::entity::{RocketId, ShipId};
use crate::interest::aoi::{circle_region, cross_region, CrossShape};
use crate::interest::grid::{CellCoord, Grid, GridStats};
use crate::interest::{EntityRef, InterestError};
use crate::util::vec2::Vec2;

/// Ship subscription record
#[derive(Debug, Clone)]
pub struct ShipSubscription {
    /// Cell containing the ship's position
    pub home: CellCoord,
    /// Every cell the ship's cross AOI overlaps
    pub cells: HashSet<CellCoord>,
}

/// Owns the grid and every subscription record
#[derive(Debug, Clone)]
pub struct SubscriptionTracker {
    grid: Grid,
    shape: CrossShape,
    ships: HashMap<ShipId, ShipSubscription>,
    rockets: HashMap<RocketId, CellCoord>,
}

impl SubscriptionTracker {
    pub fn new(grid: Grid, shape: CrossShape) -> Self {
        Self {
            grid,
            shape,
            ships: HashMap::new(),
            rockets: HashMap::new(),
        }
    }

    pub fn from_config(config: &WorldConfig) -> Self {
        Self::new(Grid::from_config(config), CrossShape::from_config(config))
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn shape(&self) -> CrossShape {
        self.shape
    }

    // ------------------------------------------------------------------
    // Ships
    // ------------------------------------------------------------------

    /// Subscribe a ship to every cell of its cross AOI around `position`.
    ///
    /// Any previous subscription of the same ship is dropped first, so the
    /// recorded set is always exactly the new region.
    pub fn subscribe_ship(&mut self, id: ShipId, position: Vec2) -> Result<(), InterestError> {
        let home = self.grid.cell_coordinates_of(position)?;

        if self.ships.contains_key(&id) {
            self.unsubscribe_ship(id)?;
        }

        let region = cross_region(&self.grid, position, self.shape);
        let mut cells = HashSet::with_capacity(region.len());
        for coord in region {
            self.grid.cell_at_mut(coord)?.subscribe_ship(id);
            cells.insert(coord);
        }

        self.ships.insert(id, ShipSubscription { home, cells });
        Ok(())
    }

    /// Remove a ship from every cell it is subscribed to and drop its record
    pub fn unsubscribe_ship(&mut self, id: ShipId) -> Result<(), InterestError> {
        let record = self
            .ships
            .remove(&id)
            .ok_or(InterestError::MissingEntity(EntityRef::Ship(id)))?;

        for coord in record.cells {
            self.grid.cell_at_mut(coord)?.unsubscribe_ship(id);
        }
        Ok(())
    }

    /// Re-derive a ship's subscriptions if its home cell changed.
    ///
    /// Returns `Ok(true)` when the ship moved into a new home cell. An
    /// out-of-bounds position leaves the current subscription untouched.
    pub fn update_ship_cell(&mut self, id: ShipId, position: Vec2) -> Result<bool, InterestError> {
        let current = self
            .ships
            .get(&id)
            .map(|record| record.home)
            .ok_or(InterestError::MissingEntity(EntityRef::Ship(id)))?;

        let home = self.grid.cell_coordinates_of(position)?;
        if home == current {
            return Ok(false);
        }

        self.unsubscribe_ship(id)?;
        self.subscribe_ship(id, position)?;
        Ok(true)
    }

    pub fn ship_home(&self, id: ShipId) -> Option<CellCoord> {
        self.ships.get(&id).map(|record| record.home)
    }

    pub fn subscribed_cells(&self, id: ShipId) -> Option<&HashSet<CellCoord>> {
        self.ships.get(&id).map(|record| &record.cells)
    }

    pub fn ship_count(&self) -> usize {
        self.ships.len()
    }

    /// Ships subscribed to `coord`, in ascending id order
    pub fn ship_subscribers(&self, coord: CellCoord) -> Result<Vec<ShipId>, InterestError> {
        let mut ids: Vec<ShipId> = self.grid.cell_at(coord)?.ships().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    /// Union of the ship subscribers of every cell in the sampled circle
    /// around `center`. Candidates only; callers apply an exact distance test.
    pub fn ships_near(&self, center: Vec2, radius: f32) -> BTreeSet<ShipId> {
        let mut candidates = BTreeSet::new();
        for coord in circle_region(&self.grid, center, radius) {
            if let Ok(cell) = self.grid.cell_at(coord) {
                candidates.extend(cell.ships());
            }
        }
        candidates
    }

    // ------------------------------------------------------------------
    // Rockets
    // ------------------------------------------------------------------

    /// Register a rocket in the single cell containing `position`
    pub fn subscribe_rocket(
        &mut self,
        id: RocketId,
        position: Vec2,
    ) -> Result<CellCoord, InterestError> {
        if self.rockets.contains_key(&id) {
            return Err(InterestError::DuplicateId(EntityRef::Rocket(id)));
        }

        let home = self.grid.cell_coordinates_of(position)?;
        self.grid.cell_at_mut(home)?.subscribe_rocket(id);
        self.rockets.insert(id, home);
        Ok(home)
    }

    pub fn unsubscribe_rocket(&mut self, id: RocketId) -> Result<(), InterestError> {
        let home = self
            .rockets
            .remove(&id)
            .ok_or(InterestError::MissingEntity(EntityRef::Rocket(id)))?;
        self.grid.cell_at_mut(home)?.unsubscribe_rocket(id);
        Ok(())
    }

    /// Move a rocket to the cell containing `position`.
    ///
    /// Returns `Ok(true)` when the home cell changed.
    pub fn update_rocket_cell(
        &mut self,
        id: RocketId,
        position: Vec2,
    ) -> Result<bool, InterestError> {
        let current = *self
            .rockets
            .get(&id)
            .ok_or(InterestError::MissingEntity(EntityRef::Rocket(id)))?;

        let home = self.grid.cell_coordinates_of(position)?;
        if home == current {
            return Ok(false);
        }

        self.grid.cell_at_mut(current)?.unsubscribe_rocket(id);
        self.grid.cell_at_mut(home)?.subscribe_rocket(id);
        self.rockets.insert(id, home);
        Ok(true)
    }

    pub fn rocket_home(&self, id: RocketId) -> Option<CellCoord> {
        self.rockets.get(&id).copied()
    }

    pub fn rocket_count(&self) -> usize {
        self.rockets.len()
    }

    pub fn stats(&self) -> GridStats {
        self.grid.stats()
    }
}
