//! Interest management
//!
//! Partitions the world into a uniform grid of cells and tracks which ships
//! and rockets are subscribed to which cells, so that events can be delivered
//! only to the players who can see them and collision checks only look at
//! nearby ships.

pub mod aoi;
pub mod grid;
pub mod sightings;
pub mod subscriptions;

use std::fmt;

use crate::game::entity::{RocketId, ShipId};

/// Entity referenced by an interest operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Ship(ShipId),
    Rocket(RocketId),
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Ship(id) => write!(f, "ship {}", id),
            EntityRef::Rocket(id) => write!(f, "rocket {}", id),
        }
    }
}

/// Errors raised by grid lookups and subscription bookkeeping
///
/// None of these are ever reported to clients. Region computations clamp
/// instead of failing, so `OutOfBounds` only comes from single-point lookups.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InterestError {
    #[error("position ({x}, {y}) is outside the grid")]
    OutOfBounds { x: f32, y: f32 },
    #[error("cell ({row}, {col}) does not exist")]
    InvalidCell { row: i64, col: i64 },
    #[error("no subscription record for {0}")]
    MissingEntity(EntityRef),
    #[error("{0} is already registered")]
    DuplicateId(EntityRef),
}

impl InterestError {
    /// Stale reference to an entity that is already gone
    pub fn is_missing(&self) -> bool {
        matches!(self, InterestError::MissingEntity(_))
    }
}
