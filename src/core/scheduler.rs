//! Per-room scheduler task
//!
//! Every room is one spawned task draining one unbounded command queue, so
//! moves within a room are processed strictly one at a time while rooms
//! stay independent of each other. Grace timers and reaping are sleep tasks
//! that message the queue instead of touching state directly.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::{mpsc, oneshot, RwLock};

use crate::config::EngineConfig;
use crate::core::connection::{send_event, EventSender};
use crate::core::events::{RoomInfo, ServerEvent};
use crate::core::player::{Player, PlayerId};
use crate::core::room::{Room, RoomStatus};
use crate::error::{ParlorError, Result};
use crate::games::{GameEvent, GameMove, GameType, Outcome};

/// Commands a room task accepts on its queue
#[derive(Debug)]
pub enum RoomCommand {
    Join {
        player_id: PlayerId,
        name: String,
        password: Option<String>,
        sender: EventSender,
        reply: oneshot::Sender<Result<()>>,
    },
    Leave {
        player_id: PlayerId,
    },
    Move {
        player_id: PlayerId,
        mv: GameMove,
        /// Caller's channel; rejections go here even when the player holds
        /// no seat in the room
        sender: EventSender,
    },
    Disconnect {
        player_id: PlayerId,
    },
    Reconnect {
        player_id: PlayerId,
        sender: EventSender,
    },
    /// Internal: a grace timer fired. Stale if the generation moved on.
    GraceExpired {
        player_id: PlayerId,
        generation: u64,
    },
    /// Internal: the reap timer fired
    Reap,
}

pub type RoomSender = mpsc::UnboundedSender<RoomCommand>;

/// Registry entry for one live room
#[derive(Clone)]
pub struct RoomHandle {
    pub sender: RoomSender,
    /// Listing snapshot, refreshed by the room task on every roster or
    /// status change
    pub snapshot: Arc<RwLock<RoomInfo>>,
}

pub type RoomMap = Arc<RwLock<HashMap<String, RoomHandle>>>;

enum Flow {
    Continue,
    Shutdown,
}

pub struct RoomTask {
    room: Room,
    config: EngineConfig,
    rx: mpsc::UnboundedReceiver<RoomCommand>,
    self_tx: RoomSender,
    registry: RoomMap,
    snapshot: Arc<RwLock<RoomInfo>>,
    /// Decisive rounds seen so far (Rock-Paper-Scissors best-of tracking)
    rounds_resolved: u32,
}

impl RoomTask {
    pub fn spawn(room: Room, config: EngineConfig, registry: RoomMap) -> RoomHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let snapshot = Arc::new(RwLock::new(room.info()));
        let handle = RoomHandle {
            sender: tx.clone(),
            snapshot: snapshot.clone(),
        };
        let task = RoomTask {
            room,
            config,
            rx,
            self_tx: tx,
            registry,
            snapshot,
            rounds_resolved: 0,
        };
        tokio::spawn(task.run());
        handle
    }

    async fn run(mut self) {
        let code = self.room.code.clone();
        info!("Room {} task started ({})", code, self.room.game.as_str());
        // Covers rooms nobody ever joins
        self.schedule_reap();
        while let Some(cmd) = self.rx.recv().await {
            if let Flow::Shutdown = self.handle(cmd).await {
                break;
            }
        }
        self.registry.write().await.remove(&code);
        info!("Room {} torn down", code);
    }

    async fn handle(&mut self, cmd: RoomCommand) -> Flow {
        match cmd {
            RoomCommand::Join {
                player_id,
                name,
                password,
                sender,
                reply,
            } => {
                let result = self.handle_join(player_id, name, password, sender).await;
                let _ = reply.send(result);
                Flow::Continue
            }
            RoomCommand::Leave { player_id } => self.handle_leave(&player_id).await,
            RoomCommand::Move { player_id, mv, sender } => {
                self.handle_move(&player_id, mv, &sender).await;
                Flow::Continue
            }
            RoomCommand::Disconnect { player_id } => {
                self.handle_disconnect(&player_id).await;
                Flow::Continue
            }
            RoomCommand::Reconnect { player_id, sender } => {
                self.handle_reconnect(&player_id, sender).await;
                Flow::Continue
            }
            RoomCommand::GraceExpired {
                player_id,
                generation,
            } => self.handle_grace_expired(&player_id, generation).await,
            RoomCommand::Reap => {
                if self.room.status == RoomStatus::Finished || self.room.players.is_empty() {
                    Flow::Shutdown
                } else {
                    Flow::Continue
                }
            }
        }
    }

    async fn handle_join(
        &mut self,
        player_id: PlayerId,
        name: String,
        password: Option<String>,
        sender: EventSender,
    ) -> Result<()> {
        self.room.verify_password(password.as_deref())?;
        let player = Player::new(player_id.clone(), name, sender);
        self.room.add_player(player)?;
        debug!("Player {} joined room {}", player_id, self.room.code);

        let roster = self.room.players.iter().map(Into::into).collect();
        self.send_to(
            &player_id,
            ServerEvent::RoomJoined {
                room_code: self.room.code.clone(),
                game: self.room.game,
                players: roster,
                max_players: self.room.max_players,
            },
        );
        if let Some(joined) = self.room.player(&player_id) {
            let event = ServerEvent::PlayerJoined {
                room_code: self.room.code.clone(),
                player: joined.into(),
                count: self.room.players.len(),
                max_players: self.room.max_players,
            };
            self.broadcast_except(&player_id, event);
        }

        if self.room.is_full() {
            self.start_game().await?;
        }
        self.refresh_snapshot().await;
        Ok(())
    }

    async fn start_game(&mut self) -> Result<()> {
        self.room.start()?;
        info!(
            "Room {} started: {} with {} players",
            self.room.code,
            self.room.game.as_str(),
            self.room.players.len()
        );
        let state = match &self.room.state {
            Some(s) => s,
            None => return Err(ParlorError::RoomNotActive),
        };
        let public = state.public_view();
        let turn_owner = state.turn_owner();
        self.broadcast(ServerEvent::GameStart {
            room_code: self.room.code.clone(),
            game: self.room.game,
            state: public,
            turn_owner,
        });
        self.send_private_slices();
        Ok(())
    }

    /// Targeted private views (hands, fleets) after the deal or a move
    fn send_private_slices(&self) {
        let state = match &self.room.state {
            Some(s) => s,
            None => return,
        };
        for player in &self.room.players {
            if let Some(view) = state.private_view(&player.id) {
                send_event(
                    &player.sender,
                    &player.id,
                    ServerEvent::PrivateState {
                        room_code: self.room.code.clone(),
                        state: view,
                    },
                );
            }
        }
    }

    async fn handle_move(&mut self, player_id: &PlayerId, mv: GameMove, sender: &EventSender) {
        if self.room.status != RoomStatus::Active {
            self.reject(sender, player_id, &ParlorError::RoomNotActive);
            return;
        }
        if !self.room.has_player(player_id) {
            self.reject(sender, player_id, &ParlorError::PlayerNotInRoom);
            return;
        }
        let state = match self.room.state.as_mut() {
            Some(s) => s,
            None => {
                self.reject(sender, player_id, &ParlorError::RoomNotActive);
                return;
            }
        };

        match state.apply(player_id, &mv) {
            Err(err) => {
                debug!(
                    "Room {} rejected move from {}: {}",
                    self.room.code, player_id, err
                );
                self.reject(sender, player_id, &err);
            }
            Ok(outcome) => {
                let mut terminal = outcome.terminal;
                if terminal.is_none() {
                    terminal = self.check_best_of(&outcome.events);
                }
                self.broadcast_turn_update(outcome.events);
                self.send_private_slices();
                if let Some(outcome) = terminal {
                    self.finish_room(outcome).await;
                }
            }
        }
    }

    /// Rock-Paper-Scissors plays best-of-N; the engine scores single rounds
    /// and the room ends the match once a majority is clinched
    fn check_best_of(&mut self, events: &[GameEvent]) -> Option<Outcome> {
        if self.room.game != GameType::Rps {
            return None;
        }
        let majority = self.room.rps_rounds / 2;
        for event in events {
            if let GameEvent::RoundResolved { scores, .. } = event {
                self.rounds_resolved += 1;
                let leader = scores
                    .iter()
                    .max_by_key(|(_, score)| **score)
                    .map(|(p, s)| (p.clone(), *s));
                if let Some((player, score)) = leader {
                    if score > majority {
                        return Some(Outcome::Score {
                            winner: Some(player),
                            scores: scores.clone(),
                        });
                    }
                }
            }
        }
        None
    }

    fn broadcast_turn_update(&self, events: Vec<GameEvent>) {
        let state = match &self.room.state {
            Some(s) => s,
            None => return,
        };
        self.broadcast(ServerEvent::TurnUpdate {
            room_code: self.room.code.clone(),
            state: state.public_view(),
            events,
            turn_owner: state.turn_owner(),
        });
    }

    async fn finish_room(&mut self, outcome: Outcome) {
        info!("Room {} finished: {:?}", self.room.code, outcome);
        self.room.finish(outcome.clone());
        let state = self
            .room
            .state
            .as_ref()
            .map(|s| s.public_view())
            .unwrap_or(serde_json::Value::Null);
        self.broadcast(ServerEvent::GameOver {
            room_code: self.room.code.clone(),
            outcome,
            state,
            timestamp: chrono::Utc::now(),
        });
        self.refresh_snapshot().await;
        self.schedule_reap();
    }

    fn schedule_reap(&self) {
        let tx = self.self_tx.clone();
        let after = self.config.reap_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(RoomCommand::Reap);
        });
    }

    async fn handle_leave(&mut self, player_id: &PlayerId) -> Flow {
        let left = match self.room.remove_player(player_id) {
            Some(p) => p,
            None => return Flow::Continue,
        };
        debug!("Player {} left room {}", left.id, self.room.code);
        self.broadcast(ServerEvent::PlayerLeft {
            room_code: self.room.code.clone(),
            player_id: left.id.clone(),
        });

        if self.room.status == RoomStatus::Active {
            if self.room.players.len() < self.room.game.min_to_continue() {
                let winner = self.room.players.first().map(|p| p.id.clone());
                self.finish_room(Outcome::Forfeit {
                    winner,
                    left: left.id,
                })
                .await;
            } else if let Some(state) = self.room.state.as_mut() {
                // Enough players remain: fold the seat into the game
                let outcome = state.eliminate(&left.id);
                self.broadcast_turn_update(outcome.events);
                self.send_private_slices();
                if let Some(terminal) = outcome.terminal {
                    self.finish_room(terminal).await;
                }
            }
        }

        self.refresh_snapshot().await;
        if self.room.players.is_empty() {
            return Flow::Shutdown;
        }
        Flow::Continue
    }

    async fn handle_disconnect(&mut self, player_id: &PlayerId) {
        let generation = match self.room.player_mut(player_id) {
            Some(p) if p.connected => p.mark_disconnected(),
            _ => return,
        };
        debug!(
            "Player {} disconnected from room {}, grace timer running",
            player_id, self.room.code
        );
        self.broadcast(ServerEvent::PlayerDisconnected {
            room_code: self.room.code.clone(),
            player_id: player_id.clone(),
            grace_secs: self.config.grace_period.as_secs(),
        });
        self.refresh_snapshot().await;

        let tx = self.self_tx.clone();
        let after = self.config.grace_period;
        let player_id = player_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(RoomCommand::GraceExpired {
                player_id,
                generation,
            });
        });
    }

    async fn handle_grace_expired(&mut self, player_id: &PlayerId, generation: u64) -> Flow {
        let expired = match self.room.player(player_id) {
            Some(p) => !p.connected && p.connection_generation == generation,
            None => false,
        };
        if !expired {
            return Flow::Continue;
        }
        warn!(
            "Player {} grace period expired in room {}",
            player_id, self.room.code
        );
        self.handle_leave(player_id).await
    }

    async fn handle_reconnect(&mut self, player_id: &PlayerId, sender: EventSender) {
        match self.room.player_mut(player_id) {
            Some(player) => player.reattach(sender),
            None => {
                // Seat already reaped; the caller gets a targeted error
                send_event(
                    &sender,
                    player_id,
                    ServerEvent::Error {
                        code: ParlorError::PlayerNotInRoom.code().to_string(),
                        message: ParlorError::PlayerNotInRoom.to_string(),
                    },
                );
                return;
            }
        }
        debug!("Player {} reconnected to room {}", player_id, self.room.code);
        self.broadcast(ServerEvent::PlayerReconnected {
            room_code: self.room.code.clone(),
            player_id: player_id.clone(),
        });
        self.refresh_snapshot().await;

        let state = self.room.state.as_ref();
        self.send_to(
            player_id,
            ServerEvent::Resync {
                room_code: self.room.code.clone(),
                status: self.room.status.as_str().to_string(),
                state: state
                    .map(|s| s.public_view())
                    .unwrap_or(serde_json::Value::Null),
                private_state: state.and_then(|s| s.private_view(player_id)),
                turn_owner: state.and_then(|s| s.turn_owner()),
                outcome: self.room.outcome.clone(),
            },
        );
    }

    fn reject(&self, sender: &EventSender, player_id: &PlayerId, err: &ParlorError) {
        let event = ServerEvent::MoveRejected {
            room_code: self.room.code.clone(),
            code: err.code().to_string(),
            reason: err.to_string(),
        };
        send_event(sender, player_id, event);
    }

    fn send_to(&self, player_id: &PlayerId, event: ServerEvent) {
        if let Some(player) = self.room.player(player_id) {
            send_event(&player.sender, player_id, event);
        }
    }

    fn broadcast(&self, event: ServerEvent) {
        for player in &self.room.players {
            send_event(&player.sender, &player.id, event.clone());
        }
    }

    fn broadcast_except(&self, skip: &PlayerId, event: ServerEvent) {
        for player in self.room.players.iter().filter(|p| p.id != *skip) {
            send_event(&player.sender, &player.id, event.clone());
        }
    }

    async fn refresh_snapshot(&self) {
        *self.snapshot.write().await = self.room.info();
    }
}
