//! Session engine facade
//!
//! Owns the room registry and translates commands into room-task messages.
//! The transport layer (whatever owns the sockets) holds one of these and
//! calls it with player ids and event senders; everything past the registry
//! lookup happens inside the room's own task.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use log::{debug, info};
use tokio::sync::{oneshot, RwLock};

use crate::config::EngineConfig;
use crate::core::connection::{send_event, EventSender};
use crate::core::events::{ClientCommand, RoomInfo, ServerEvent};
use crate::core::player::PlayerId;
use crate::core::room::{generate_room_code, Room, RoomConfig};
use crate::core::scheduler::{RoomCommand, RoomMap, RoomTask};
use crate::error::{ParlorError, Result};
use crate::games::GameMove;

pub struct SessionEngine {
    config: EngineConfig,
    rooms: RoomMap,
}

impl SessionEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            rooms: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn create_room(&self, config: RoomConfig) -> Result<RoomInfo> {
        let mut room = Room::new(config, &self.config)?;
        let mut rooms = self.rooms.write().await;
        if rooms.len() >= self.config.max_rooms {
            return Err(ParlorError::RegistryFull);
        }
        while rooms.contains_key(&room.code) {
            room.code = generate_room_code();
        }
        let info = room.info();
        info!("Created room {} ({})", room.code, room.game.as_str());
        let handle = RoomTask::spawn(room, self.config.clone(), self.rooms.clone());
        rooms.insert(info.code.clone(), handle);
        Ok(info)
    }

    pub async fn join_room(
        &self,
        room_code: &str,
        player_id: PlayerId,
        name: String,
        password: Option<String>,
        sender: EventSender,
    ) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send_command(
            room_code,
            RoomCommand::Join {
                player_id,
                name,
                password,
                sender,
                reply,
            },
        )
        .await?;
        response.await.map_err(|_| ParlorError::RoomClosed)?
    }

    pub async fn leave_room(&self, room_code: &str, player_id: PlayerId) -> Result<()> {
        self.send_command(room_code, RoomCommand::Leave { player_id })
            .await
    }

    /// Queue a move for the room. Acceptance is broadcast as `turn_update`;
    /// a rejection comes back as a targeted `move_rejected` on `sender`.
    pub async fn submit_move(
        &self,
        room_code: &str,
        player_id: PlayerId,
        mv: GameMove,
        sender: EventSender,
    ) -> Result<()> {
        self.send_command(room_code, RoomCommand::Move { player_id, mv, sender })
            .await
    }

    /// Transport lost this player's socket; a grace timer starts in-room
    pub async fn player_disconnected(&self, room_code: &str, player_id: PlayerId) -> Result<()> {
        self.send_command(room_code, RoomCommand::Disconnect { player_id })
            .await
    }

    /// Transport reattached this player; the room replies with a resync
    pub async fn player_reconnected(
        &self,
        room_code: &str,
        player_id: PlayerId,
        sender: EventSender,
    ) -> Result<()> {
        self.send_command(room_code, RoomCommand::Reconnect { player_id, sender })
            .await
    }

    pub async fn list_rooms(&self) -> Vec<RoomInfo> {
        let handles: Vec<_> = self.rooms.read().await.values().cloned().collect();
        let reads = handles.iter().map(|h| h.snapshot.read());
        // Bind before returning so the read guards drop ahead of `handles`
        let infos: Vec<RoomInfo> = join_all(reads).await.iter().map(|s| (**s).clone()).collect();
        infos
    }

    async fn send_command(&self, room_code: &str, cmd: RoomCommand) -> Result<()> {
        let sender = {
            let rooms = self.rooms.read().await;
            rooms
                .get(room_code)
                .map(|h| h.sender.clone())
                .ok_or(ParlorError::RoomNotFound)?
        };
        sender.send(cmd).map_err(|_| ParlorError::RoomClosed)
    }

    /// One-stop entry point for transports that speak `ClientCommand`.
    /// Failures are reported back through the player's own event channel.
    pub async fn handle_command(
        &self,
        player_id: &PlayerId,
        command: ClientCommand,
        sender: &EventSender,
    ) {
        debug!("Player {} command: {:?}", player_id, command);
        let result = match command {
            ClientCommand::CreateRoom {
                game,
                max_players,
                password,
                rounds,
            } => {
                let mut config = RoomConfig::new(game, max_players);
                config.password = password;
                config.rps_rounds = rounds;
                match self.create_room(config).await {
                    Ok(info) => {
                        send_event(
                            sender,
                            player_id,
                            ServerEvent::RoomCreated {
                                room_code: info.code,
                                game: info.game,
                                max_players: info.max_players,
                            },
                        );
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
            ClientCommand::JoinRoom {
                room_code,
                name,
                password,
            } => {
                self.join_room(&room_code, player_id.clone(), name, password, sender.clone())
                    .await
            }
            ClientCommand::LeaveRoom { room_code } => {
                self.leave_room(&room_code, player_id.clone()).await
            }
            ClientCommand::ListRooms => {
                let rooms = self.list_rooms().await;
                send_event(sender, player_id, ServerEvent::RoomList { rooms });
                Ok(())
            }
            ClientCommand::GameMove { room_code, mv } => {
                self.submit_move(&room_code, player_id.clone(), mv, sender.clone())
                    .await
            }
            ClientCommand::Disconnected { room_code } => {
                self.player_disconnected(&room_code, player_id.clone()).await
            }
            ClientCommand::Reconnected { room_code } => {
                self.player_reconnected(&room_code, player_id.clone(), sender.clone())
                    .await
            }
        };

        if let Err(err) = result {
            send_event(
                sender,
                player_id,
                ServerEvent::Error {
                    code: err.code().to_string(),
                    message: err.to_string(),
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::connection::event_channel;
    use crate::games::GameType;

    fn engine() -> SessionEngine {
        SessionEngine::new(EngineConfig::for_testing())
    }

    fn config(game: GameType) -> RoomConfig {
        let mut config = RoomConfig::new(game, None);
        config.seed = Some(42);
        config
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let engine = engine();
        let info = engine.create_room(config(GameType::TicTacToe)).await.unwrap();
        assert_eq!(info.player_count, 0);
        assert_eq!(info.status, "waiting");

        let listed = engine.list_rooms().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].code, info.code);
    }

    #[tokio::test]
    async fn test_list_rooms_snapshots_every_room() {
        let engine = engine();
        for _ in 0..3 {
            engine.create_room(config(GameType::Durak)).await.unwrap();
        }
        let listed = engine.list_rooms().await;
        assert_eq!(listed.len(), 3);
        assert!(listed.iter().all(|r| r.status == "waiting"));
    }

    #[tokio::test]
    async fn test_registry_capacity() {
        let engine = engine();
        for _ in 0..16 {
            engine.create_room(config(GameType::Rps)).await.unwrap();
        }
        let result = engine.create_room(config(GameType::Rps)).await;
        assert_eq!(result.unwrap_err(), ParlorError::RegistryFull);
    }

    #[tokio::test]
    async fn test_join_unknown_room() {
        let engine = engine();
        let (tx, _rx) = event_channel();
        let result = engine
            .join_room("NOSUCH", "p1".to_string(), "p1".to_string(), None, tx)
            .await;
        assert_eq!(result.unwrap_err(), ParlorError::RoomNotFound);
    }

    #[tokio::test]
    async fn test_wrong_password_rejected() {
        let engine = engine();
        let mut cfg = config(GameType::TicTacToe);
        cfg.password = Some("secret".to_string());
        let info = engine.create_room(cfg).await.unwrap();

        let (tx, _rx) = event_channel();
        let result = engine
            .join_room(&info.code, "p1".to_string(), "p1".to_string(), None, tx)
            .await;
        assert_eq!(result.unwrap_err(), ParlorError::WrongPassword);
    }
}
