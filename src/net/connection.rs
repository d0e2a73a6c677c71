use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use hashbrown::HashMap;
use tokio::sync::mpsc::UnboundedSender;

use crate::game::entity::PlayerId;
use crate::net::broadcast::Transport;
use crate::net::protocol::ServerMessage;

/// A live client connection
///
/// Outbound messages go through an unbounded channel drained by the
/// connection's writer task, so queuing never blocks the simulation.
#[derive(Debug)]
pub struct Connection {
    pub player_id: PlayerId,
    pub remote_addr: SocketAddr,
    pub created_at: Instant,
    sender: UnboundedSender<ServerMessage>,
    messages_sent: AtomicU64,
}

impl Connection {
    pub fn new(player_id: PlayerId, remote_addr: SocketAddr, sender: UnboundedSender<ServerMessage>) -> Self {
        Self {
            player_id,
            remote_addr,
            created_at: Instant::now(),
            sender,
            messages_sent: AtomicU64::new(0),
        }
    }

    /// Queue a message. Returns false if the writer task has gone away.
    pub fn send(&self, message: ServerMessage) -> bool {
        if self.sender.send(message).is_err() {
            return false;
        }
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        true
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    /// Time since the connection was accepted
    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }
}

/// Connections keyed by player id
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<PlayerId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. Replaces (and returns) any previous one for
    /// the same player.
    pub fn insert(&mut self, connection: Connection) -> Option<Connection> {
        self.connections.insert(connection.player_id, connection)
    }

    pub fn get(&self, player_id: PlayerId) -> Option<&Connection> {
        self.connections.get(&player_id)
    }

    pub fn remove(&mut self, player_id: PlayerId) -> Option<Connection> {
        self.connections.remove(&player_id)
    }

    pub fn contains(&self, player_id: PlayerId) -> bool {
        self.connections.contains_key(&player_id)
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }

    /// Connected player ids in ascending order
    pub fn ids(&self) -> Vec<PlayerId> {
        let mut ids: Vec<PlayerId> = self.connections.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl Transport for ConnectionRegistry {
    fn write(&self, player: PlayerId, message: &ServerMessage) -> bool {
        self.connections
            .get(&player)
            .map_or(false, |conn| conn.send(message.clone()))
    }

    fn connected(&self) -> Vec<PlayerId> {
        self.ids()
    }
}
