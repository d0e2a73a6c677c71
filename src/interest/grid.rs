//! Uniform cell grid over the world rectangle
//!
//! Every point of the world maps to exactly one cell: cells are half-open
//! squares, closed on the left/top edge and open on the right/bottom edge.
//! The grid carries one extra row and column so that points lying exactly on
//! the far world edge still resolve.

use std::ops::RangeInclusive;

use hashbrown::HashSet;

use crate::config::WorldConfig;
use crate::game::constants::{column_count, row_count};
use crate::game::entity::{RocketId, ShipId};
use crate::interest::InterestError;
use crate::util::vec2::Vec2;

/// Initial capacity for a cell's ship subscriber set. Ship AOIs overlap
/// heavily, so busy cells hold several ships.
const CELL_SHIP_CAPACITY: usize = 8;

/// Grid cell coordinate, `(row, column)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    pub row: usize,
    pub col: usize,
}

impl CellCoord {
    #[inline]
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// A single grid region and the entities subscribed to it
#[derive(Debug, Clone)]
pub struct Cell {
    coord: CellCoord,
    center: Vec2,
    half_extent: f32,
    ships: HashSet<ShipId>,
    rockets: HashSet<RocketId>,
}

impl Cell {
    fn new(coord: CellCoord, cell_size: f32) -> Self {
        let half_extent = cell_size / 2.0;
        Self {
            coord,
            center: Vec2::new(
                coord.col as f32 * cell_size + half_extent,
                coord.row as f32 * cell_size + half_extent,
            ),
            half_extent,
            ships: HashSet::with_capacity(CELL_SHIP_CAPACITY),
            rockets: HashSet::new(),
        }
    }

    pub fn coord(&self) -> CellCoord {
        self.coord
    }

    pub fn center(&self) -> Vec2 {
        self.center
    }

    pub fn half_extent(&self) -> f32 {
        self.half_extent
    }

    /// Half-open containment: left/top edges inside, right/bottom outside
    pub fn contains_point(&self, point: Vec2) -> bool {
        point.x >= self.center.x - self.half_extent
            && point.x < self.center.x + self.half_extent
            && point.y >= self.center.y - self.half_extent
            && point.y < self.center.y + self.half_extent
    }

    /// Returns true if the ship was not already subscribed
    pub fn subscribe_ship(&mut self, id: ShipId) -> bool {
        self.ships.insert(id)
    }

    /// Returns true if the ship was subscribed
    pub fn unsubscribe_ship(&mut self, id: ShipId) -> bool {
        self.ships.remove(&id)
    }

    pub fn subscribe_rocket(&mut self, id: RocketId) -> bool {
        self.rockets.insert(id)
    }

    pub fn unsubscribe_rocket(&mut self, id: RocketId) -> bool {
        self.rockets.remove(&id)
    }

    pub fn has_ship(&self, id: ShipId) -> bool {
        self.ships.contains(&id)
    }

    pub fn has_rocket(&self, id: RocketId) -> bool {
        self.rockets.contains(&id)
    }

    pub fn ships(&self) -> impl Iterator<Item = ShipId> + '_ {
        self.ships.iter().copied()
    }

    pub fn rockets(&self) -> impl Iterator<Item = RocketId> + '_ {
        self.rockets.iter().copied()
    }

    pub fn ship_count(&self) -> usize {
        self.ships.len()
    }

    pub fn rocket_count(&self) -> usize {
        self.rockets.len()
    }
}

/// Fixed grid of `rows × cols` square cells, stored row-major
#[derive(Debug, Clone)]
pub struct Grid {
    cell_size: f32,
    rows: usize,
    cols: usize,
    cells: Vec<Cell>,
}

impl Grid {
    /// Build the grid covering a `width × height` world
    pub fn new(width: f32, height: f32, cell_size: f32) -> Self {
        let rows = row_count(height, cell_size);
        let cols = column_count(width, cell_size);

        let mut cells = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                cells.push(Cell::new(CellCoord::new(row, col), cell_size));
            }
        }

        Self {
            cell_size,
            rows,
            cols,
            cells,
        }
    }

    pub fn from_config(config: &WorldConfig) -> Self {
        Self::new(config.width, config.height, config.cell_size)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Raw (unclamped) row index of a y coordinate
    #[inline]
    pub fn row_index(&self, y: f32) -> i64 {
        (y / self.cell_size).floor() as i64
    }

    /// Raw (unclamped) column index of an x coordinate
    #[inline]
    pub fn col_index(&self, x: f32) -> i64 {
        (x / self.cell_size).floor() as i64
    }

    #[inline]
    pub fn in_range(&self, row: i64, col: i64) -> bool {
        row >= 0 && col >= 0 && (row as usize) < self.rows && (col as usize) < self.cols
    }

    /// Cell containing `position`
    pub fn cell_coordinates_of(&self, position: Vec2) -> Result<CellCoord, InterestError> {
        let out_of_bounds = InterestError::OutOfBounds {
            x: position.x,
            y: position.y,
        };
        if !position.is_finite() {
            return Err(out_of_bounds);
        }

        let row = self.row_index(position.y);
        let col = self.col_index(position.x);
        if !self.in_range(row, col) {
            return Err(out_of_bounds);
        }
        Ok(CellCoord::new(row as usize, col as usize))
    }

    pub fn cell_at(&self, coord: CellCoord) -> Result<&Cell, InterestError> {
        let index = self.index_of(coord)?;
        Ok(&self.cells[index])
    }

    pub fn cell_at_mut(&mut self, coord: CellCoord) -> Result<&mut Cell, InterestError> {
        let index = self.index_of(coord)?;
        Ok(&mut self.cells[index])
    }

    fn index_of(&self, coord: CellCoord) -> Result<usize, InterestError> {
        if coord.row >= self.rows || coord.col >= self.cols {
            return Err(InterestError::InvalidCell {
                row: coord.row as i64,
                col: coord.col as i64,
            });
        }
        Ok(coord.row * self.cols + coord.col)
    }

    /// Rows touched by the raw index range `lo..=hi`, clamped to the grid.
    /// `None` when the range lies entirely outside.
    pub fn clamp_rows(&self, lo: i64, hi: i64) -> Option<RangeInclusive<usize>> {
        clamp_span(lo, hi, self.rows)
    }

    /// Columns touched by `lo..=hi`; see [`Grid::clamp_rows`].
    pub fn clamp_cols(&self, lo: i64, hi: i64) -> Option<RangeInclusive<usize>> {
        clamp_span(lo, hi, self.cols)
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    /// Get statistics about the grid
    pub fn stats(&self) -> GridStats {
        let occupied_cells = self
            .cells
            .iter()
            .filter(|c| c.ship_count() > 0 || c.rocket_count() > 0)
            .count();
        let ship_memberships = self.cells.iter().map(Cell::ship_count).sum();
        let rocket_memberships = self.cells.iter().map(Cell::rocket_count).sum();
        let max_ships_per_cell = self.cells.iter().map(Cell::ship_count).max().unwrap_or(0);

        GridStats {
            occupied_cells,
            ship_memberships,
            rocket_memberships,
            max_ships_per_cell,
        }
    }
}

fn clamp_span(lo: i64, hi: i64, count: usize) -> Option<RangeInclusive<usize>> {
    if count == 0 {
        return None;
    }
    let lo = lo.max(0);
    let hi = hi.min(count as i64 - 1);
    if lo > hi {
        return None;
    }
    Some(lo as usize..=hi as usize)
}

/// Statistics about grid occupancy
#[derive(Debug, Clone, Default)]
pub struct GridStats {
    pub occupied_cells: usize,
    /// Total (ship, cell) subscription pairs
    pub ship_memberships: usize,
    pub rocket_memberships: usize,
    pub max_ships_per_cell: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_grid() -> Grid {
        Grid::new(1000.0, 700.0, 50.0)
    }

    #[test]
    fn test_dimensions() {
        let grid = default_grid();
        assert_eq!(grid.rows(), 15);
        assert_eq!(grid.cols(), 21);
        assert_eq!(grid.cells().count(), 15 * 21);
    }

    #[test]
    fn test_cell_geometry() {
        let grid = default_grid();
        let cell = grid.cell_at(CellCoord::new(2, 3)).unwrap();
        assert_eq!(cell.center(), Vec2::new(175.0, 125.0));
        assert_eq!(cell.half_extent(), 25.0);
    }

    #[test]
    fn test_tiling_examples() {
        let grid = default_grid();
        assert_eq!(grid.cell_coordinates_of(Vec2::new(49.0, 49.0)), Ok(CellCoord::new(0, 0)));
        assert_eq!(grid.cell_coordinates_of(Vec2::new(50.0, 0.0)), Ok(CellCoord::new(0, 1)));
        assert_eq!(grid.cell_coordinates_of(Vec2::new(0.0, 50.0)), Ok(CellCoord::new(1, 0)));
    }

    #[test]
    fn test_far_edge_resolves() {
        let grid = default_grid();
        assert_eq!(
            grid.cell_coordinates_of(Vec2::new(1000.0, 700.0)),
            Ok(CellCoord::new(14, 20))
        );
    }

    #[test]
    fn test_every_sample_point_in_exactly_one_cell() {
        let grid = default_grid();
        let mut y = 0.0;
        while y <= 700.0 {
            let mut x = 0.0;
            while x <= 1000.0 {
                let point = Vec2::new(x, y);
                let owners: Vec<_> = grid.cells().filter(|c| c.contains_point(point)).collect();
                assert_eq!(owners.len(), 1, "point {:?} owned by {} cells", point, owners.len());
                assert_eq!(Ok(owners[0].coord()), grid.cell_coordinates_of(point));
                x += 12.5;
            }
            y += 12.5;
        }
    }

    #[test]
    fn test_adjacent_cells_share_edge_without_overlap() {
        let grid = default_grid();
        let left = grid.cell_at(CellCoord::new(0, 0)).unwrap();
        let right = grid.cell_at(CellCoord::new(0, 1)).unwrap();
        let edge = Vec2::new(50.0, 10.0);
        assert!(!left.contains_point(edge));
        assert!(right.contains_point(edge));
        assert!(left.contains_point(Vec2::new(49.999, 10.0)));
    }

    #[test]
    fn test_out_of_bounds() {
        let grid = default_grid();
        assert!(matches!(
            grid.cell_coordinates_of(Vec2::new(-0.5, 10.0)),
            Err(InterestError::OutOfBounds { .. })
        ));
        assert!(matches!(
            grid.cell_coordinates_of(Vec2::new(10.0, 751.0)),
            Err(InterestError::OutOfBounds { .. })
        ));
        assert!(matches!(
            grid.cell_coordinates_of(Vec2::new(f32::NAN, 10.0)),
            Err(InterestError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_invalid_cell() {
        let grid = default_grid();
        assert_eq!(
            grid.cell_at(CellCoord::new(15, 0)).unwrap_err(),
            InterestError::InvalidCell { row: 15, col: 0 }
        );
        assert!(grid.cell_at(CellCoord::new(0, 21)).is_err());
    }

    #[test]
    fn test_clamp_spans() {
        let grid = default_grid();
        assert_eq!(grid.clamp_rows(-3, 2), Some(0..=2));
        assert_eq!(grid.clamp_rows(12, 40), Some(12..=14));
        assert_eq!(grid.clamp_rows(-5, -1), None);
        assert_eq!(grid.clamp_cols(21, 25), None);
        assert_eq!(grid.clamp_cols(4, 3), None);
    }

    #[test]
    fn test_cell_subscriptions_are_idempotent() {
        let mut grid = default_grid();
        let cell = grid.cell_at_mut(CellCoord::new(1, 1)).unwrap();
        assert!(cell.subscribe_ship(7));
        assert!(!cell.subscribe_ship(7));
        assert_eq!(cell.ship_count(), 1);
        assert!(cell.unsubscribe_ship(7));
        assert!(!cell.unsubscribe_ship(7));

        assert!(cell.subscribe_rocket(3));
        assert!(cell.has_rocket(3));
        assert!(cell.unsubscribe_rocket(3));
        assert_eq!(cell.rocket_count(), 0);
    }

    #[test]
    fn test_stats() {
        let mut grid = default_grid();
        for col in 0..3 {
            grid.cell_at_mut(CellCoord::new(0, col)).unwrap().subscribe_ship(1);
        }
        grid.cell_at_mut(CellCoord::new(0, 0)).unwrap().subscribe_ship(2);
        grid.cell_at_mut(CellCoord::new(5, 5)).unwrap().subscribe_rocket(9);

        let stats = grid.stats();
        assert_eq!(stats.occupied_cells, 4);
        assert_eq!(stats.ship_memberships, 4);
        assert_eq!(stats.rocket_memberships, 1);
        assert_eq!(stats.max_ships_per_cell, 2);
    }
}
