//! Command and event types for room-based game sessions

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::player::{PlayerId, PlayerInfo};
use crate::games::{GameEvent, GameMove, GameType, Outcome};

/// Client-to-engine command types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientCommand {
    /// Create a new room
    #[serde(rename = "create_room")]
    CreateRoom {
        game: GameType,
        max_players: Option<usize>,
        password: Option<String>,
        /// Best-of round count, Rock-Paper-Scissors only
        rounds: Option<u32>,
    },

    /// Join a room by its code
    #[serde(rename = "join_room")]
    JoinRoom {
        room_code: String,
        name: String,
        password: Option<String>,
    },

    /// Leave a room
    #[serde(rename = "leave_room")]
    LeaveRoom { room_code: String },

    /// List joinable rooms
    #[serde(rename = "list_rooms")]
    ListRooms,

    /// Submit a game move
    #[serde(rename = "game_move")]
    GameMove {
        room_code: String,
        #[serde(rename = "move")]
        mv: GameMove,
    },

    /// Transport lost the player's connection (injected by the transport
    /// layer, not parsed from the wire)
    #[serde(rename = "disconnected")]
    Disconnected { room_code: String },

    /// Transport re-established the player's connection
    #[serde(rename = "reconnected")]
    Reconnected { room_code: String },
}

/// Engine-to-client event types
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Room created; the creator has not joined yet
    #[serde(rename = "room_created")]
    RoomCreated {
        room_code: String,
        game: GameType,
        max_players: usize,
    },

    /// You joined a room
    #[serde(rename = "room_joined")]
    RoomJoined {
        room_code: String,
        game: GameType,
        players: Vec<PlayerInfo>,
        max_players: usize,
    },

    /// Another player joined your room
    #[serde(rename = "player_joined")]
    PlayerJoined {
        room_code: String,
        player: PlayerInfo,
        count: usize,
        max_players: usize,
    },

    /// A player left your room
    #[serde(rename = "player_left")]
    PlayerLeft {
        room_code: String,
        player_id: PlayerId,
    },

    /// Roster is full; the match begins
    #[serde(rename = "game_start")]
    GameStart {
        room_code: String,
        game: GameType,
        state: Value,
        turn_owner: Option<PlayerId>,
    },

    /// Broadcast after every accepted move
    #[serde(rename = "turn_update")]
    TurnUpdate {
        room_code: String,
        state: Value,
        events: Vec<GameEvent>,
        turn_owner: Option<PlayerId>,
    },

    /// Targeted private slice (hands, ship layout); never broadcast
    #[serde(rename = "private_state")]
    PrivateState { room_code: String, state: Value },

    /// Targeted rejection of the sender's own move
    #[serde(rename = "move_rejected")]
    MoveRejected {
        room_code: String,
        code: String,
        reason: String,
    },

    /// A player's transport dropped; a grace timer is running
    #[serde(rename = "player_disconnected")]
    PlayerDisconnected {
        room_code: String,
        player_id: PlayerId,
        grace_secs: u64,
    },

    /// A player reattached within the grace period
    #[serde(rename = "player_reconnected")]
    PlayerReconnected {
        room_code: String,
        player_id: PlayerId,
    },

    /// Full state replay for a reconnecting player, targeted
    #[serde(rename = "resync")]
    Resync {
        room_code: String,
        status: String,
        state: Value,
        private_state: Option<Value>,
        turn_owner: Option<PlayerId>,
        outcome: Option<Outcome>,
    },

    /// The match ended
    #[serde(rename = "game_over")]
    GameOver {
        room_code: String,
        outcome: Outcome,
        state: Value,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Room list response
    #[serde(rename = "room_list")]
    RoomList { rooms: Vec<RoomInfo> },

    /// Error response
    #[serde(rename = "error")]
    Error { code: String, message: String },
}

/// Public room information for listings
#[derive(Debug, Clone, Serialize)]
pub struct RoomInfo {
    pub code: String,
    pub game: GameType,
    pub status: String,
    pub player_count: usize,
    pub max_players: usize,
    pub has_password: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_command_deserializes_from_tagged_json() {
        let json = r#"{
            "type": "join_room",
            "room_code": "ABC234",
            "name": "alice",
            "password": null
        }"#;
        let cmd: ClientCommand = serde_json::from_str(json).unwrap();
        match cmd {
            ClientCommand::JoinRoom {
                room_code, name, ..
            } => {
                assert_eq!(room_code, "ABC234");
                assert_eq!(name, "alice");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_game_move_payload_nested_under_move_key() {
        let json = r#"{
            "type": "game_move",
            "room_code": "ABC234",
            "move": { "kind": "place", "cell": 4 }
        }"#;
        let cmd: ClientCommand = serde_json::from_str(json).unwrap();
        match cmd {
            ClientCommand::GameMove { mv, .. } => {
                assert_eq!(mv, GameMove::Place { cell: 4 });
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_server_event_serializes_with_type_tag() {
        let event = ServerEvent::MoveRejected {
            room_code: "ABC234".to_string(),
            code: "not_your_turn".to_string(),
            reason: "it is not your turn".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "move_rejected");
        assert_eq!(value["code"], "not_your_turn");
    }
}
