//! Area of Interest (AOI) geometry
//!
//! Maps an entity's interest region onto grid cells:
//! - Ships see a "+" shaped cross: a horizontal and a vertical bar, each of
//!   thickness `width` and end-to-end `length`, centered on the ship.
//! - Rockets scan a small circle for collision candidates, approximated by the
//!   bounding block of a handful of rim samples.
//!
//! Both computations are pure. Any part of a region outside the world is
//! clipped, never wrapped.

use std::f32::consts::TAU;
use std::ops::RangeInclusive;

use smallvec::SmallVec;

use crate::config::WorldConfig;
use crate::interest::grid::{CellCoord, Grid};
use crate::util::vec2::Vec2;

// ============================================================================
// Constants
// ============================================================================

/// Number of equally spaced rim samples used to approximate a circle
pub const CIRCLE_SAMPLES: usize = 8;

/// Inline capacity for circle footprints. A rocket radius well below the
/// cell size touches at most a 2×2 block; larger radii spill to the heap.
pub type CircleCells = SmallVec<[CellCoord; 16]>;

// ============================================================================
// Cross Region
// ============================================================================

/// Cross-shaped AOI dimensions, shared by every ship
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossShape {
    /// Thickness of both bars
    pub width: f32,
    /// End-to-end length of both bars
    pub length: f32,
}

impl CrossShape {
    pub fn new(width: f32, length: f32) -> Self {
        Self { width, length }
    }

    pub fn from_config(config: &WorldConfig) -> Self {
        Self::new(config.ship_aoi_width, config.ship_aoi_length)
    }
}

/// Cells covered by a cross centered at `center`.
///
/// Built from three disjoint blocks:
/// 1. the central band of rows, across the full horizontal arm
/// 2. the vertical arm above the band
/// 3. the vertical arm below the band
///
/// Spans are computed on raw floor indices and clamped per block, so a
/// partially visible arm still contributes its in-world cells.
pub fn cross_region(grid: &Grid, center: Vec2, shape: CrossShape) -> Vec<CellCoord> {
    if !center.is_finite() {
        return Vec::new();
    }

    let half_width = shape.width / 2.0;
    let half_length = shape.length / 2.0;

    let band_top = grid.row_index(center.y - half_width);
    let band_bottom = grid.row_index(center.y + half_width);
    let arm_left = grid.col_index(center.x - half_length);
    let arm_right = grid.col_index(center.x + half_length);

    let column_left = grid.col_index(center.x - half_width);
    let column_right = grid.col_index(center.x + half_width);
    let arm_top = grid.row_index(center.y - half_length);
    let arm_bottom = grid.row_index(center.y + half_length);

    let blocks = [
        (grid.clamp_rows(band_top, band_bottom), grid.clamp_cols(arm_left, arm_right)),
        (grid.clamp_rows(arm_top, band_top - 1), grid.clamp_cols(column_left, column_right)),
        (grid.clamp_rows(band_bottom + 1, arm_bottom), grid.clamp_cols(column_left, column_right)),
    ];

    let mut cells = Vec::with_capacity(block_area(&blocks));
    for (rows, cols) in blocks {
        if let (Some(rows), Some(cols)) = (rows, cols) {
            push_block(&mut cells, rows, cols);
        }
    }
    cells
}

fn block_area(blocks: &[(Option<RangeInclusive<usize>>, Option<RangeInclusive<usize>>)]) -> usize {
    blocks
        .iter()
        .map(|(rows, cols)| match (rows, cols) {
            (Some(r), Some(c)) => r.clone().count() * c.clone().count(),
            _ => 0,
        })
        .sum()
}

fn push_block<E: Extend<CellCoord>>(
    out: &mut E,
    rows: RangeInclusive<usize>,
    cols: RangeInclusive<usize>,
) {
    for row in rows {
        out.extend(cols.clone().map(|col| CellCoord::new(row, col)));
    }
}

// ============================================================================
// Circle Region
// ============================================================================

/// Cells covered by the bounding block of a sampled circle.
///
/// Takes the center plus [`CIRCLE_SAMPLES`] points on the rim, keeps the
/// in-world ones and returns every cell between their min/max row and
/// column. Empty when no sample lies inside the grid.
pub fn circle_region(grid: &Grid, center: Vec2, radius: f32) -> CircleCells {
    let mut cells = CircleCells::new();
    if !center.is_finite() || !radius.is_finite() {
        return cells;
    }

    let mut bounds: Option<(usize, usize, usize, usize)> = None;
    let samples = std::iter::once(center).chain(
        (0..CIRCLE_SAMPLES)
            .map(|i| center + Vec2::from_angle(TAU * i as f32 / CIRCLE_SAMPLES as f32) * radius),
    );

    for point in samples {
        let Ok(coord) = grid.cell_coordinates_of(point) else {
            continue;
        };
        bounds = Some(match bounds {
            None => (coord.row, coord.row, coord.col, coord.col),
            Some((r0, r1, c0, c1)) => (
                r0.min(coord.row),
                r1.max(coord.row),
                c0.min(coord.col),
                c1.max(coord.col),
            ),
        });
    }

    if let Some((r0, r1, c0, c1)) = bounds {
        push_block(&mut cells, r0..=r1, c0..=c1);
    }
    cells
}
