//! TCP server
//!
//! Accepts client connections and bridges them to the shared
//! [`GameSession`]. Each connection gets a reader loop (this task) and a
//! writer task fed by an unbounded channel.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::RwLock;

use crate::config::ServerConfig;
use crate::metrics::Metrics;
use crate::net::framing::{read_client_message, write_server_message, FramingError};
use crate::net::game_session::{start_game_loop, GameSession};
use crate::net::protocol::ServerMessage;

/// Process or system descriptor table full (EMFILE / ENFILE)
const DESCRIPTOR_EXHAUSTED: [i32; 2] = [24, 23];

/// Pause before accepting again once descriptors run out
const DESCRIPTOR_BACKOFF: Duration = Duration::from_millis(100);

/// Game server bound to its listening socket
pub struct GameServer {
    listener: TcpListener,
    game_session: Arc<RwLock<GameSession>>,
    metrics: Arc<Metrics>,
    frame_rate: u32,
}

impl GameServer {
    /// Bind the game port. Failure here is fatal to startup.
    pub async fn bind(config: &ServerConfig, metrics: Arc<Metrics>) -> anyhow::Result<Self> {
        let addr = SocketAddr::new(config.bind_address, config.port);
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind game server on {}", addr))?;

        let game_session = Arc::new(RwLock::new(GameSession::new(config.world, metrics.clone())));

        Ok(Self {
            listener,
            game_session,
            metrics,
            frame_rate: config.world.frame_rate,
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn session(&self) -> Arc<RwLock<GameSession>> {
        self.game_session.clone()
    }

    /// Start the game loop and accept connections forever
    pub async fn run(self) -> anyhow::Result<()> {
        tracing::info!("Game server listening on {}", self.listener.local_addr()?);

        start_game_loop(self.game_session.clone(), self.metrics.clone(), self.frame_rate);

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                    if let Some(delay) = accept_backoff(&e) {
                        tokio::time::sleep(delay).await;
                    }
                    continue;
                }
            };
            let game_session = self.game_session.clone();
            let metrics = self.metrics.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer, game_session, metrics).await {
                    tracing::warn!("Connection error from {}: {}", peer, e);
                }
            });
        }
    }
}

/// Delay before the next accept after a failed one. No accept error stops
/// the server.
fn accept_backoff(error: &io::Error) -> Option<Duration> {
    match error.raw_os_error() {
        Some(code) if DESCRIPTOR_EXHAUSTED.contains(&code) => Some(DESCRIPTOR_BACKOFF),
        _ => None,
    }
}

/// Serve one client until its stream closes
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    game_session: Arc<RwLock<GameSession>>,
    metrics: Arc<Metrics>,
) -> anyhow::Result<()> {
    stream.set_nodelay(true)?;
    let (mut reader, writer) = stream.into_split();

    let (tx, rx) = mpsc::unbounded_channel();
    let player_id = game_session.write().await.connect(peer, tx);
    let writer_task = tokio::spawn(write_loop(writer, rx));

    let result = loop {
        match read_client_message(&mut reader).await {
            Ok(message) => {
                tracing::trace!("Player {} sent {}", player_id, message.kind());
                game_session.write().await.handle_message(player_id, message);
            }
            Err(FramingError::ConnectionClosed) => break Ok(()),
            Err(e) if !e.is_fatal() => {
                metrics.messages_dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Dropping malformed message from player {}: {}", player_id, e);
            }
            Err(e) => break Err(e),
        }
    };

    // Removing the connection drops its sender, which ends the writer task
    game_session.write().await.disconnect(player_id);
    if let Err(e) = writer_task.await {
        tracing::debug!("Writer task for player {} ended abnormally: {}", player_id, e);
    }

    result.map_err(|e| anyhow::anyhow!("player {}: {}", player_id, e))
}

/// Drain queued messages onto the socket
async fn write_loop(mut writer: OwnedWriteHalf, mut rx: UnboundedReceiver<ServerMessage>) {
    while let Some(message) = rx.recv().await {
        if let Err(e) = write_server_message(&mut writer, &message).await {
            tracing::debug!("Write failed, closing writer: {}", e);
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;
    use crate::game::entity::Heading;
    use crate::net::framing::{read_frame, write_frame};
    use crate::net::protocol::{decode, ClientMessage};
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;
    use tokio::time::timeout;

    fn test_config() -> ServerConfig {
        ServerConfig {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            metrics_port: 0,
            world: WorldConfig::default(),
        }
    }

    async fn recv(stream: &mut TcpStream) -> ServerMessage {
        let payload = timeout(Duration::from_secs(2), read_frame(stream))
            .await
            .expect("timed out waiting for server message")
            .unwrap();
        decode(&payload).unwrap()
    }

    async fn send(stream: &mut TcpStream, message: &ClientMessage) {
        let payload = serde_json::to_vec(message).unwrap();
        write_frame(stream, &payload).await.unwrap();
    }

    /// Join and skip deletes from earlier clients until the reply arrives
    async fn join_and_wait(stream: &mut TcpStream) {
        send(stream, &ClientMessage::Join).await;
        while !matches!(recv(stream).await, ServerMessage::Join { .. }) {}
    }

    #[tokio::test]
    async fn test_join_and_disconnect_over_tcp() {
        let server = GameServer::bind(&test_config(), Arc::new(Metrics::new())).await.unwrap();
        let addr = server.local_addr().unwrap();
        let session = server.session();
        tokio::spawn(server.run());

        let mut alice = TcpStream::connect(addr).await.unwrap();
        send(&mut alice, &ClientMessage::Join).await;
        let alice_id = match recv(&mut alice).await {
            ServerMessage::Join { id, .. } => id,
            other => panic!("expected join, got {:?}", other),
        };

        let mut bob = TcpStream::connect(addr).await.unwrap();
        send(&mut bob, &ClientMessage::Join).await;
        let bob_id = match recv(&mut bob).await {
            ServerMessage::Join { id, .. } => id,
            other => panic!("expected join, got {:?}", other),
        };
        assert!(matches!(recv(&mut bob).await, ServerMessage::New { id, .. } if id == alice_id));
        assert!(matches!(recv(&mut alice).await, ServerMessage::New { id, .. } if id == bob_id));

        // Garbage is dropped without closing the connection
        write_frame(&mut bob, b"{not json").await.unwrap();
        send(&mut bob, &ClientMessage::Turn { x: 10.0, y: 10.0, dir: Heading::Up }).await;

        drop(bob);
        loop {
            if let ServerMessage::Delete { id } = recv(&mut alice).await {
                assert_eq!(id, bob_id);
                break;
            }
        }
        assert_eq!(session.read().await.connection_count(), 1);
    }

    #[test]
    fn test_accept_backoff() {
        assert_eq!(accept_backoff(&io::Error::from_raw_os_error(24)), Some(DESCRIPTOR_BACKOFF));
        assert_eq!(accept_backoff(&io::Error::from_raw_os_error(23)), Some(DESCRIPTOR_BACKOFF));
        assert_eq!(accept_backoff(&io::Error::from(io::ErrorKind::ConnectionAborted)), None);
    }

    #[tokio::test]
    async fn test_server_keeps_accepting_after_clients_leave() {
        let server = GameServer::bind(&test_config(), Arc::new(Metrics::new())).await.unwrap();
        let addr = server.local_addr().unwrap();
        let run = tokio::spawn(server.run());

        for _ in 0..20 {
            let mut client = TcpStream::connect(addr).await.unwrap();
            join_and_wait(&mut client).await;
        }
        assert!(!run.is_finished());

        let mut late = TcpStream::connect(addr).await.unwrap();
        join_and_wait(&mut late).await;
        run.abort();
    }

    #[tokio::test]
    async fn test_bind_conflict_is_an_error() {
        let first = GameServer::bind(&test_config(), Arc::new(Metrics::new())).await.unwrap();
        let config = ServerConfig {
            port: first.local_addr().unwrap().port(),
            ..test_config()
        };
        assert!(GameServer::bind(&config, Arc::new(Metrics::new())).await.is_err());
    }
}
