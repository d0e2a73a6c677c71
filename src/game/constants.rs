/// World geometry and simulation rate
pub mod world {
    /// World width in world units
    pub const WIDTH: f32 = 1000.0;
    /// World height in world units
    pub const HEIGHT: f32 = 700.0;
    /// Simulation ticks per second
    pub const FRAME_RATE: u32 = 40;
}

/// Area-of-interest shapes
pub mod aoi {
    /// Thickness of each arm of a ship's cross-shaped AOI
    pub const SHIP_WIDTH: f32 = 100.0;
    /// End-to-end length of each arm of a ship's cross-shaped AOI
    pub const SHIP_LENGTH: f32 = 500.0;
    /// Radius of the circle scanned around a rocket for hits
    pub const ROCKET_RADIUS: f32 = 12.0;
    /// Grid cell side. Half the AOI width, so the cross's thin arms span
    /// two to three cells.
    pub const CELL_SIZE: f32 = SHIP_WIDTH / 2.0;
}

/// Per-tick displacement
pub mod motion {
    /// Ship travel per tick
    pub const SHIP_SPEED: f32 = 5.0;
    /// Rocket travel per tick
    pub const ROCKET_SPEED: f32 = 10.0;
}

/// Network constants
pub mod net {
    /// Default game port
    pub const PORT: u16 = 4344;
    /// Default port of the metrics endpoint
    pub const METRICS_PORT: u16 = 9090;
    /// Maximum framed message size in bytes
    pub const MAX_MESSAGE_SIZE: usize = 16 * 1024;
}

/// Number of grid rows needed to cover `height` with cells of side `cell_size`.
///
/// One extra row so positions lying exactly on the far edge still resolve.
#[inline]
pub fn row_count(height: f32, cell_size: f32) -> usize {
    (height / cell_size).ceil() as usize + 1
}

/// Number of grid columns needed to cover `width`; see [`row_count`].
#[inline]
pub fn column_count(width: f32, cell_size: f32) -> usize {
    (width / cell_size).ceil() as usize + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cell_size_is_half_aoi_width() {
        assert_eq!(aoi::CELL_SIZE, 50.0);
    }

    #[test]
    fn test_default_grid_dimensions() {
        // 700 / 50 = 14 rows + 1, 1000 / 50 = 20 columns + 1
        assert_eq!(row_count(world::HEIGHT, aoi::CELL_SIZE), 15);
        assert_eq!(column_count(world::WIDTH, aoi::CELL_SIZE), 21);
    }

    #[test]
    fn test_dimensions_round_up_partial_cells() {
        assert_eq!(row_count(710.0, 50.0), 16);
        assert_eq!(column_count(1.0, 50.0), 2);
    }

    #[test]
    fn test_aoi_length_covers_width() {
        assert!(aoi::SHIP_LENGTH >= aoi::SHIP_WIDTH);
    }
}
