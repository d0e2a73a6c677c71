//! Prometheus-compatible metrics endpoint
//!
//! Exposes server metrics in Prometheus text format, plus a JSON view and a
//! health check. Default endpoint: http://localhost:9090/metrics

use std::collections::VecDeque;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::game::tick::TickStats;
use crate::interest::grid::GridStats;

/// Rolling window size for tick percentiles
const TICK_HISTORY: usize = 1000;

/// Metrics registry for the game server
#[derive(Debug)]
pub struct Metrics {
    // World
    pub ships: AtomicU64,
    pub rockets: AtomicU64,
    pub ship_cell_memberships: AtomicU64,
    pub occupied_cells: AtomicU64,
    pub max_ships_per_cell: AtomicU64,
    pub sightings: AtomicU64,

    // Events
    pub hits_total: AtomicU64,
    pub rockets_retired_total: AtomicU64,
    pub rehomes_total: AtomicU64,

    // Tick timing (microseconds)
    pub tick_time_us: AtomicU64,
    pub tick_time_p95_us: AtomicU64,
    pub tick_time_p99_us: AtomicU64,
    pub tick_time_max_us: AtomicU64,
    pub tick_count: AtomicU64,

    // Network
    pub connections_active: AtomicU64,
    pub messages_sent: AtomicU64,
    pub messages_received: AtomicU64,
    pub messages_dropped: AtomicU64,

    start_time: Instant,
    tick_history: RwLock<VecDeque<u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            ships: AtomicU64::new(0),
            rockets: AtomicU64::new(0),
            ship_cell_memberships: AtomicU64::new(0),
            occupied_cells: AtomicU64::new(0),
            max_ships_per_cell: AtomicU64::new(0),
            sightings: AtomicU64::new(0),
            hits_total: AtomicU64::new(0),
            rockets_retired_total: AtomicU64::new(0),
            rehomes_total: AtomicU64::new(0),
            tick_time_us: AtomicU64::new(0),
            tick_time_p95_us: AtomicU64::new(0),
            tick_time_p99_us: AtomicU64::new(0),
            tick_time_max_us: AtomicU64::new(0),
            tick_count: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
            start_time: Instant::now(),
            tick_history: RwLock::new(VecDeque::with_capacity(TICK_HISTORY)),
        }
    }

    /// Record a tick time and update percentiles
    pub fn record_tick_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.tick_time_us.store(us, Ordering::Relaxed);
        self.tick_count.fetch_add(1, Ordering::Relaxed);

        let mut history = self.tick_history.write();
        history.push_back(us);
        while history.len() > TICK_HISTORY {
            history.pop_front();
        }

        if history.len() >= 10 {
            let mut sorted: Vec<u64> = history.iter().copied().collect();
            sorted.sort_unstable();

            let p95_idx = (sorted.len() as f32 * 0.95) as usize;
            let p99_idx = (sorted.len() as f32 * 0.99) as usize;

            self.tick_time_p95_us.store(sorted[p95_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_p99_us.store(sorted[p99_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_max_us.store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
        }
    }

    /// Fold one tick's counters into the running totals
    pub fn record_tick_stats(&self, stats: &TickStats) {
        self.hits_total.fetch_add(stats.hits as u64, Ordering::Relaxed);
        self.rockets_retired_total.fetch_add(stats.rockets_retired as u64, Ordering::Relaxed);
        self.rehomes_total.fetch_add(
            (stats.ships_rehomed + stats.rockets_rehomed) as u64,
            Ordering::Relaxed,
        );
    }

    /// Snapshot of world size and grid occupancy
    pub fn record_world(&self, ships: usize, rockets: usize, sightings: usize, grid: &GridStats) {
        self.ships.store(ships as u64, Ordering::Relaxed);
        self.rockets.store(rockets as u64, Ordering::Relaxed);
        self.sightings.store(sightings as u64, Ordering::Relaxed);
        self.ship_cell_memberships.store(grid.ship_memberships as u64, Ordering::Relaxed);
        self.occupied_cells.store(grid.occupied_cells as u64, Ordering::Relaxed);
        self.max_ships_per_cell.store(grid.max_ships_per_cell as u64, Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("space_battle_ships", "Ships in play", "gauge",
            self.ships.load(Ordering::Relaxed));
        metric!("space_battle_rockets", "Rockets in flight", "gauge",
            self.rockets.load(Ordering::Relaxed));
        metric!("space_battle_ship_cell_memberships", "Ship subscriptions across all cells", "gauge",
            self.ship_cell_memberships.load(Ordering::Relaxed));
        metric!("space_battle_occupied_cells", "Cells with at least one subscriber", "gauge",
            self.occupied_cells.load(Ordering::Relaxed));
        metric!("space_battle_max_ships_per_cell", "Largest ship subscriber set of any cell", "gauge",
            self.max_ships_per_cell.load(Ordering::Relaxed));
        metric!("space_battle_sightings", "Recorded rocket sightings", "gauge",
            self.sightings.load(Ordering::Relaxed));

        metric!("space_battle_hits_total", "Rocket hits", "counter",
            self.hits_total.load(Ordering::Relaxed));
        metric!("space_battle_rockets_retired_total", "Rockets that left the world", "counter",
            self.rockets_retired_total.load(Ordering::Relaxed));
        metric!("space_battle_rehomes_total", "Home cell changes", "counter",
            self.rehomes_total.load(Ordering::Relaxed));

        metric!("space_battle_tick_time_microseconds", "Current tick time in microseconds", "gauge",
            self.tick_time_us.load(Ordering::Relaxed));
        metric!("space_battle_tick_time_p95_microseconds", "95th percentile tick time", "gauge",
            self.tick_time_p95_us.load(Ordering::Relaxed));
        metric!("space_battle_tick_time_p99_microseconds", "99th percentile tick time", "gauge",
            self.tick_time_p99_us.load(Ordering::Relaxed));
        metric!("space_battle_tick_time_max_microseconds", "Maximum tick time", "gauge",
            self.tick_time_max_us.load(Ordering::Relaxed));
        metric!("space_battle_tick_count", "Total ticks processed", "counter",
            self.tick_count.load(Ordering::Relaxed));

        metric!("space_battle_connections_active", "Open client connections", "gauge",
            self.connections_active.load(Ordering::Relaxed));
        metric!("space_battle_messages_sent_total", "Messages queued to clients", "counter",
            self.messages_sent.load(Ordering::Relaxed));
        metric!("space_battle_messages_received_total", "Messages received from clients", "counter",
            self.messages_received.load(Ordering::Relaxed));
        metric!("space_battle_messages_dropped_total", "Malformed or unusable client messages", "counter",
            self.messages_dropped.load(Ordering::Relaxed));
        metric!("space_battle_uptime_seconds", "Server uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }

    /// JSON view of the same metrics
    pub fn to_json(&self) -> String {
        serde_json::json!({
            "world": {
                "ships": self.ships.load(Ordering::Relaxed),
                "rockets": self.rockets.load(Ordering::Relaxed),
                "ship_cell_memberships": self.ship_cell_memberships.load(Ordering::Relaxed),
                "occupied_cells": self.occupied_cells.load(Ordering::Relaxed),
                "max_ships_per_cell": self.max_ships_per_cell.load(Ordering::Relaxed),
                "sightings": self.sightings.load(Ordering::Relaxed),
            },
            "events": {
                "hits": self.hits_total.load(Ordering::Relaxed),
                "rockets_retired": self.rockets_retired_total.load(Ordering::Relaxed),
                "rehomes": self.rehomes_total.load(Ordering::Relaxed),
            },
            "performance": {
                "tick_time_us": self.tick_time_us.load(Ordering::Relaxed),
                "tick_time_p95_us": self.tick_time_p95_us.load(Ordering::Relaxed),
                "tick_time_p99_us": self.tick_time_p99_us.load(Ordering::Relaxed),
                "tick_time_max_us": self.tick_time_max_us.load(Ordering::Relaxed),
                "tick_count": self.tick_count.load(Ordering::Relaxed),
            },
            "network": {
                "connections": self.connections_active.load(Ordering::Relaxed),
                "messages_sent": self.messages_sent.load(Ordering::Relaxed),
                "messages_received": self.messages_received.load(Ordering::Relaxed),
                "messages_dropped": self.messages_dropped.load(Ordering::Relaxed),
            },
            "uptime_seconds": self.uptime_seconds(),
        })
        .to_string()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the HTTP response for a raw request
fn respond(metrics: &Metrics, request: &str) -> String {
    let ok = |content_type: &str, body: &str| {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            content_type,
            body.len(),
            body
        )
    };

    let path = request
        .strip_prefix("GET ")
        .and_then(|rest| rest.split_whitespace().next())
        .unwrap_or("");

    match path {
        "/metrics/json" | "/json" => ok("application/json", &metrics.to_json()),
        "/metrics" => ok("text/plain; version=0.0.4", &metrics.to_prometheus()),
        "/health" | "/" => ok("text/plain", "OK"),
        _ => "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string(),
    }
}

/// Start the metrics HTTP server
pub async fn start_metrics_server(metrics: Arc<Metrics>, bind_address: IpAddr, port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::new(bind_address, port);
    let listener = TcpListener::bind(addr).await?;

    info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];

            match socket.read(&mut buffer).await {
                Ok(n) if n > 0 => {
                    let request = String::from_utf8_lossy(&buffer[..n]);
                    let response = respond(&metrics, &request);
                    if let Err(e) = socket.write_all(response.as_bytes()).await {
                        debug!("Failed to write metrics response to {}: {}", peer, e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Failed to read from metrics socket {}: {}", peer, e);
                }
            }
        });
    }
}
