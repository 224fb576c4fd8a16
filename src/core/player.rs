//! Player entity
//! Identity is supplied by the transport layer; the engine only tracks
//! seat order and connection liveness.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::connection::EventSender;

/// Stable player identity supplied by the transport layer
pub type PlayerId = String;

/// A seated player inside a room
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// False while the transport has dropped and the grace timer is running
    pub connected: bool,
    /// Outbound event channel for this player's current connection
    pub sender: EventSender,
    /// Bumped on every reconnect so stale grace-timer expiries can be ignored
    pub connection_generation: u64,
    pub joined_at: DateTime<Utc>,
}

impl Player {
    pub fn new(id: PlayerId, name: String, sender: EventSender) -> Self {
        Self {
            id,
            name,
            connected: true,
            sender,
            connection_generation: 0,
            joined_at: Utc::now(),
        }
    }

    /// Reattach a fresh connection after a transport drop
    pub fn reattach(&mut self, sender: EventSender) {
        self.sender = sender;
        self.connected = true;
        self.connection_generation += 1;
    }

    pub fn mark_disconnected(&mut self) -> u64 {
        self.connected = false;
        self.connection_generation += 1;
        self.connection_generation
    }
}

/// Public projection of a player for roster listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub name: String,
    pub connected: bool,
}

impl From<&Player> for PlayerInfo {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            connected: p.connected,
        }
    }
}
