//! Broadcast routing
//!
//! Game logic describes *who* should receive an event as a [`Delivery`];
//! [`route`] resolves it against the live connections of a [`Transport`] and
//! writes the message. The router keeps no state of its own.

use smallvec::SmallVec;

use crate::game::entity::PlayerId;
use crate::net::protocol::ServerMessage;

/// Write side of the connection layer
pub trait Transport {
    /// Queue `message` for `player`. Returns false if the player has no live
    /// connection. Never blocks.
    fn write(&self, player: PlayerId, message: &ServerMessage) -> bool;

    /// Players with a live connection
    fn connected(&self) -> Vec<PlayerId>;
}

/// Recipient selection for one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Every connected player
    All,
    /// Every connected player except one (usually the actor)
    AllExcept(PlayerId),
    /// Exactly these subscribers
    Selective(Vec<PlayerId>),
    /// A single player
    Unicast(PlayerId),
}

/// A message paired with its delivery scope
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub delivery: Delivery,
    pub message: ServerMessage,
}

impl Dispatch {
    pub fn all(message: ServerMessage) -> Self {
        Self {
            delivery: Delivery::All,
            message,
        }
    }

    pub fn all_except(player: PlayerId, message: ServerMessage) -> Self {
        Self {
            delivery: Delivery::AllExcept(player),
            message,
        }
    }

    pub fn selective(players: Vec<PlayerId>, message: ServerMessage) -> Self {
        Self {
            delivery: Delivery::Selective(players),
            message,
        }
    }

    pub fn unicast(player: PlayerId, message: ServerMessage) -> Self {
        Self {
            delivery: Delivery::Unicast(player),
            message,
        }
    }

    /// Resolve the delivery scope against the currently connected players
    pub fn recipients(&self, connected: &[PlayerId]) -> SmallVec<[PlayerId; 8]> {
        match &self.delivery {
            Delivery::All => connected.iter().copied().collect(),
            Delivery::AllExcept(skip) => connected.iter().copied().filter(|p| p != skip).collect(),
            Delivery::Selective(players) => players.iter().copied().collect(),
            Delivery::Unicast(player) => SmallVec::from_elem(*player, 1),
        }
    }
}

/// Deliver one dispatch. Returns the number of successful writes.
///
/// Recipients without a live connection are skipped silently; they are
/// usually players who disconnected earlier in the same tick.
pub fn route<T: Transport + ?Sized>(transport: &T, dispatch: &Dispatch) -> usize {
    let recipients = match dispatch.delivery {
        Delivery::All | Delivery::AllExcept(_) => dispatch.recipients(&transport.connected()),
        Delivery::Selective(_) | Delivery::Unicast(_) => dispatch.recipients(&[]),
    };

    let mut delivered = 0;
    for player in recipients {
        if transport.write(player, &dispatch.message) {
            delivered += 1;
        } else {
            tracing::trace!("Skipping {} for player {}: not connected", dispatch.message.kind(), player);
        }
    }
    delivered
}

/// Deliver a batch of dispatches in order. Returns the total write count.
pub fn route_all<T: Transport + ?Sized>(transport: &T, dispatches: &[Dispatch]) -> usize {
    dispatches.iter().map(|d| route(transport, d)).sum()
}
