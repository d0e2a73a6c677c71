use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use crate::game::constants::{aoi, motion, net, world};
use crate::util::vec2::Vec2;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the game and metrics listeners to
    pub bind_address: IpAddr,
    /// Game port
    pub port: u16,
    /// Metrics endpoint port
    pub metrics_port: u16,
    /// Simulation parameters, fixed for the lifetime of the process
    pub world: WorldConfig,
}

/// World geometry, tick rate and AOI shapes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldConfig {
    pub width: f32,
    pub height: f32,
    /// Ticks per second
    pub frame_rate: u32,
    /// Side of a square grid cell
    pub cell_size: f32,
    /// Arm thickness of the ship cross AOI
    pub ship_aoi_width: f32,
    /// End-to-end arm length of the ship cross AOI
    pub ship_aoi_length: f32,
    /// Collision radius around a rocket
    pub rocket_radius: f32,
    /// Ship travel per tick
    pub ship_speed: f32,
    /// Rocket travel per tick
    pub rocket_speed: f32,
}

/// Rejected configuration
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Port cannot be 0")]
    ZeroPort,
    #[error("{0} must be a positive finite number")]
    NotPositive(&'static str),
    #[error("{0} cannot be negative")]
    Negative(&'static str),
    #[error("Frame rate must be 1-1000, got {0}")]
    FrameRate(u32),
    #[error("Ship AOI length ({length}) must be at least its width ({width})")]
    AoiShape { width: f32, length: f32 },
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: net::PORT,
            metrics_port: net::METRICS_PORT,
            world: WorldConfig::default(),
        }
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: world::WIDTH,
            height: world::HEIGHT,
            frame_rate: world::FRAME_RATE,
            cell_size: aoi::CELL_SIZE,
            ship_aoi_width: aoi::SHIP_WIDTH,
            ship_aoi_length: aoi::SHIP_LENGTH,
            rocket_radius: aoi::ROCKET_RADIUS,
            ship_speed: motion::SHIP_SPEED,
            rocket_speed: motion::ROCKET_SPEED,
        }
    }
}

/// Read and parse an environment variable, keeping `current` when it is
/// unset, unparsable or rejected by `accept`.
fn env_override<T>(name: &str, current: T, accept: impl Fn(&T) -> bool) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    let Ok(raw) = std::env::var(name) else {
        return current;
    };
    match raw.trim().parse::<T>() {
        Ok(parsed) if accept(&parsed) => parsed,
        Ok(parsed) => {
            tracing::warn!("{} value {} out of range, using {}", name, parsed, current);
            current
        }
        Err(_) => {
            tracing::warn!("Invalid {} '{}', using {}", name, raw, current);
            current
        }
    }
}

fn positive(v: &f32) -> bool {
    v.is_finite() && *v > 0.0
}

fn non_negative(v: &f32) -> bool {
    v.is_finite() && *v >= 0.0
}

fn wrap_axis(value: f32, extent: f32) -> f32 {
    if (0.0..=extent).contains(&value) {
        value
    } else {
        value.rem_euclid(extent)
    }
}

impl ServerConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("BIND_ADDRESS") {
            if let Ok(parsed) = addr.parse() {
                config.bind_address = parsed;
            } else {
                tracing::warn!("Invalid BIND_ADDRESS '{}', using default", addr);
            }
        }

        config.port = env_override("PORT", config.port, |p| *p > 0);
        config.metrics_port = env_override("METRICS_PORT", config.metrics_port, |p| *p > 0);
        config.world = WorldConfig::load_or_default();

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        self.world.validate()
    }
}

impl WorldConfig {
    /// Load world parameters from environment or use defaults.
    ///
    /// `CELL_SIZE` defaults to half of the (possibly overridden) AOI width.
    pub fn load_or_default() -> Self {
        let defaults = Self::default();

        let ship_aoi_width = env_override("SHIP_AOI_WIDTH", defaults.ship_aoi_width, positive);
        let cell_size = env_override("CELL_SIZE", ship_aoi_width / 2.0, positive);

        Self {
            width: env_override("WORLD_WIDTH", defaults.width, positive),
            height: env_override("WORLD_HEIGHT", defaults.height, positive),
            frame_rate: env_override("FRAME_RATE", defaults.frame_rate, |r| (1..=1000).contains(r)),
            cell_size,
            ship_aoi_width,
            ship_aoi_length: env_override("SHIP_AOI_LENGTH", defaults.ship_aoi_length, positive),
            rocket_radius: env_override("ROCKET_RADIUS", defaults.rocket_radius, non_negative),
            ship_speed: env_override("SHIP_SPEED", defaults.ship_speed, non_negative),
            rocket_speed: env_override("ROCKET_SPEED", defaults.rocket_speed, non_negative),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positives = [
            ("width", self.width),
            ("height", self.height),
            ("cell_size", self.cell_size),
            ("ship_aoi_width", self.ship_aoi_width),
            ("ship_aoi_length", self.ship_aoi_length),
        ];
        for (name, value) in positives {
            if !positive(&value) {
                return Err(ConfigError::NotPositive(name));
            }
        }

        let non_negatives = [
            ("rocket_radius", self.rocket_radius),
            ("ship_speed", self.ship_speed),
            ("rocket_speed", self.rocket_speed),
        ];
        for (name, value) in non_negatives {
            if !non_negative(&value) {
                return Err(ConfigError::Negative(name));
            }
        }

        if !(1..=1000).contains(&self.frame_rate) {
            return Err(ConfigError::FrameRate(self.frame_rate));
        }
        if self.ship_aoi_length < self.ship_aoi_width {
            return Err(ConfigError::AoiShape {
                width: self.ship_aoi_width,
                length: self.ship_aoi_length,
            });
        }
        Ok(())
    }

    /// Whether `position` lies inside the closed world rectangle
    #[inline]
    pub fn contains(&self, position: Vec2) -> bool {
        position.x >= 0.0
            && position.x <= self.width
            && position.y >= 0.0
            && position.y <= self.height
    }

    /// Fold `position` back into the world rectangle, torus style. Points
    /// already inside are returned unchanged.
    pub fn wrap(&self, position: Vec2) -> Vec2 {
        Vec2::new(wrap_axis(position.x, self.width), wrap_axis(position.y, self.height))
    }

    /// Tick period in seconds
    pub fn tick_period_secs(&self) -> f64 {
        1.0 / self.frame_rate as f64
    }
}
