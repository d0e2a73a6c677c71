use serde::{Deserialize, Serialize};

use crate::game::entity::{Heading, PlayerId, Rocket, RocketId, Ship, ShipId};

/// Messages from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Request a ship
    Join,
    /// Ship changed direction at the reported position
    Turn { x: f32, y: f32, dir: Heading },
    /// Fire a rocket from the reported position
    Fire { x: f32, y: f32, dir: Heading },
}

/// Messages from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// The recipient's own ship was created
    Join { id: PlayerId, x: f32, y: f32, dir: Heading },
    /// Another ship is in play
    New { id: ShipId, x: f32, y: f32, dir: Heading },
    /// A nearby ship turned
    Turn { id: ShipId, x: f32, y: f32, dir: Heading },
    /// A rocket entered the recipient's area of interest
    Fire {
        ship: ShipId,
        rocket: RocketId,
        x: f32,
        y: f32,
        dir: Heading,
    },
    /// `rocket` hit `ship`
    Hit { rocket: RocketId, ship: ShipId },
    /// A ship left the game
    Delete { id: ShipId },
}

impl ClientMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Join => "join",
            ClientMessage::Turn { .. } => "turn",
            ClientMessage::Fire { .. } => "fire",
        }
    }
}

impl ServerMessage {
    pub fn join(ship: &Ship) -> Self {
        ServerMessage::Join {
            id: ship.id,
            x: ship.position.x,
            y: ship.position.y,
            dir: ship.heading,
        }
    }

    pub fn new_ship(ship: &Ship) -> Self {
        ServerMessage::New {
            id: ship.id,
            x: ship.position.x,
            y: ship.position.y,
            dir: ship.heading,
        }
    }

    pub fn turn(ship: &Ship) -> Self {
        ServerMessage::Turn {
            id: ship.id,
            x: ship.position.x,
            y: ship.position.y,
            dir: ship.heading,
        }
    }

    pub fn fire(rocket: &Rocket) -> Self {
        ServerMessage::Fire {
            ship: rocket.origin,
            rocket: rocket.id,
            x: rocket.position.x,
            y: rocket.position.y,
            dir: rocket.heading,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Join { .. } => "join",
            ServerMessage::New { .. } => "new",
            ServerMessage::Turn { .. } => "turn",
            ServerMessage::Fire { .. } => "fire",
            ServerMessage::Hit { .. } => "hit",
            ServerMessage::Delete { .. } => "delete",
        }
    }
}

/// Encode a message as JSON
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, EncodeError> {
    serde_json::to_vec(message).map_err(|e| EncodeError(e.to_string()))
}

/// Decode a JSON message
pub fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, DecodeError> {
    serde_json::from_slice(data).map_err(|e| DecodeError(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
#[error("Encode error: {0}")]
pub struct EncodeError(String);

#[derive(Debug, thiserror::Error)]
#[error("Decode error: {0}")]
pub struct DecodeError(String);
