//! Game session - glues connections to the world and runs the tick loop

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::RwLock;
use tokio::time::{interval, Instant};
use tracing::{debug, info, warn};

use crate::config::WorldConfig;
use crate::game::entity::PlayerId;
use crate::game::tick::{TickEngine, TickStats};
use crate::game::world::World;
use crate::metrics::Metrics;
use crate::net::broadcast::{route_all, Dispatch};
use crate::net::connection::{Connection, ConnectionRegistry};
use crate::net::protocol::{ClientMessage, ServerMessage};
use crate::util::vec2::Vec2;

/// Seconds between status log lines
const STATUS_LOG_INTERVAL_SECS: u64 = 30;

/// Shared game session: the simulation plus every live connection.
///
/// Held behind a single lock so message handling and ticks never interleave.
pub struct GameSession {
    engine: TickEngine,
    connections: ConnectionRegistry,
    metrics: Arc<Metrics>,
    rng: StdRng,
}

impl GameSession {
    pub fn new(config: WorldConfig, metrics: Arc<Metrics>) -> Self {
        Self::with_rng(config, metrics, StdRng::from_entropy())
    }

    /// Session with a caller-supplied spawn RNG
    pub fn with_rng(config: WorldConfig, metrics: Arc<Metrics>, rng: StdRng) -> Self {
        Self {
            engine: TickEngine::new(World::new(config)),
            connections: ConnectionRegistry::new(),
            metrics,
            rng,
        }
    }

    pub fn world(&self) -> &World {
        self.engine.world()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.count()
    }

    pub fn current_tick(&self) -> u64 {
        self.engine.current_tick()
    }

    /// Register a new connection and assign its player id
    pub fn connect(&mut self, remote_addr: SocketAddr, sender: UnboundedSender<ServerMessage>) -> PlayerId {
        let player_id = self.engine.world_mut().allocate_player_id();
        self.connections.insert(Connection::new(player_id, remote_addr, sender));
        self.metrics
            .connections_active
            .store(self.connections.count() as u64, Ordering::Relaxed);

        info!("Player {} connected from {}", player_id, remote_addr);
        player_id
    }

    /// Apply one client message and deliver its consequences
    pub fn handle_message(&mut self, player_id: PlayerId, message: ClientMessage) {
        self.metrics.messages_received.fetch_add(1, Ordering::Relaxed);

        if !self.connections.contains(player_id) {
            debug!("Ignoring {} from unknown player {}", message.kind(), player_id);
            return;
        }

        let mut out = Vec::new();
        let world = self.engine.world_mut();
        match message {
            ClientMessage::Join => {
                if world.join(player_id, &mut self.rng, &mut out) {
                    info!("Player {} joined ({} ships)", player_id, world.ship_count());
                }
            }
            ClientMessage::Turn { x, y, dir } => {
                world.turn(player_id, Vec2::new(x, y), dir, &mut out);
            }
            ClientMessage::Fire { x, y, dir } => {
                if let Err(e) = world.fire(player_id, Vec2::new(x, y), dir, &mut out) {
                    if e.is_missing() {
                        debug!("Fire from player {} dropped: {}", player_id, e);
                    } else {
                        warn!("Fire from player {} rejected: {}", player_id, e);
                    }
                }
            }
        }
        self.deliver(&out);
    }

    /// Drop a closed connection and its ship
    pub fn disconnect(&mut self, player_id: PlayerId) {
        if self.connections.remove(player_id).is_none() {
            return;
        }
        self.metrics
            .connections_active
            .store(self.connections.count() as u64, Ordering::Relaxed);

        let mut out = Vec::new();
        self.engine.world_mut().remove_ship(player_id, &mut out);
        self.deliver(&out);

        info!("Player {} disconnected", player_id);
    }

    /// Run one simulation step and deliver everything it produced
    pub fn tick(&mut self) -> TickStats {
        let outcome = self.engine.tick();
        self.deliver(&outcome.dispatches);

        let world = self.engine.world();
        self.metrics.record_tick_stats(&outcome.stats);
        self.metrics.record_world(
            world.ship_count(),
            world.rocket_count(),
            world.sightings().len(),
            &world.interest().stats(),
        );
        outcome.stats
    }

    fn deliver(&self, dispatches: &[Dispatch]) {
        let sent = route_all(&self.connections, dispatches);
        self.metrics.messages_sent.fetch_add(sent as u64, Ordering::Relaxed);
    }
}

/// Start the game loop background task
pub fn start_game_loop(session: Arc<RwLock<GameSession>>, metrics: Arc<Metrics>, frame_rate: u32) {
    tokio::spawn(async move {
        let tick_duration = Duration::from_secs_f64(1.0 / frame_rate as f64);
        let mut ticker = interval(tick_duration);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!("Game loop started at {} Hz", frame_rate);
        let start = Instant::now();
        let status_every = frame_rate as u64 * STATUS_LOG_INTERVAL_SECS;

        loop {
            ticker.tick().await;

            let tick_start = Instant::now();
            let (stats, ships, rockets, connections) = {
                let mut session_guard = session.write().await;
                let stats = session_guard.tick();
                let world = session_guard.world();
                (
                    stats,
                    world.ship_count(),
                    world.rocket_count(),
                    session_guard.connection_count(),
                )
            };
            metrics.record_tick_time(tick_start.elapsed());

            if stats.hits > 0 {
                debug!("Tick {}: {} hit(s)", stats.tick, stats.hits);
            }

            if stats.tick % status_every == 0 {
                info!(
                    "Game: {}s, tick {}, {} connections, {} ships, {} rockets | p99 {}us",
                    start.elapsed().as_secs(),
                    stats.tick,
                    connections,
                    ships,
                    rockets,
                    metrics.tick_time_p99_us.load(Ordering::Relaxed),
                );
            }
        }
    });
}
