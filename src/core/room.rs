//! Room entity and configuration
//!
//! A room is plain state owned by its scheduler task; nothing in here locks
//! or spawns. Registry-level concerns (capacity, lookup) live in the
//! dispatcher.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::constants::{ROOM_CODE_ALPHABET, ROOM_CODE_LEN};
use crate::core::events::RoomInfo;
use crate::core::player::{Player, PlayerId};
use crate::error::{ParlorError, Result};
use crate::games::{GameState, GameType, Outcome};

/// Room lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStatus {
    /// Collecting players
    Waiting,
    /// Match in progress
    Active,
    /// Match over; room sticks around for result queries until reaped
    Finished,
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Finished => "finished",
        }
    }
}

/// Creation-time room parameters
#[derive(Debug, Clone)]
pub struct RoomConfig {
    pub game: GameType,
    pub max_players: usize,
    pub password: Option<String>,
    /// Best-of round count override, Rock-Paper-Scissors only
    pub rps_rounds: Option<u32>,
    /// Shuffle/dice seed override; random when absent
    pub seed: Option<u64>,
}

impl RoomConfig {
    pub fn new(game: GameType, max_players: Option<usize>) -> Self {
        let (min, _) = game.player_range();
        Self {
            game,
            max_players: max_players.unwrap_or(min),
            password: None,
            rps_rounds: None,
            seed: None,
        }
    }

    fn validate(&self) -> Result<()> {
        let (min, max) = self.game.player_range();
        if self.max_players < min || self.max_players > max {
            return Err(ParlorError::InvalidConfig(format!(
                "{} takes {} to {} players, got {}",
                self.game.as_str(),
                min,
                max,
                self.max_players
            )));
        }
        if let Some(rounds) = self.rps_rounds {
            if self.game != GameType::Rps {
                return Err(ParlorError::InvalidConfig(
                    "round count only applies to rock-paper-scissors".to_string(),
                ));
            }
            if rounds % 2 == 0 || !(1..=25).contains(&rounds) {
                return Err(ParlorError::InvalidConfig(format!(
                    "round count must be odd and between 1 and 25, got {}",
                    rounds
                )));
            }
        }
        Ok(())
    }
}

/// Derive a short shareable room code from a fresh UUID.
/// The alphabet excludes ambiguous glyphs (0/O, 1/I/L).
pub fn generate_room_code() -> String {
    let uuid = Uuid::new_v4();
    uuid.as_bytes()
        .iter()
        .take(ROOM_CODE_LEN)
        .map(|b| ROOM_CODE_ALPHABET[*b as usize % ROOM_CODE_ALPHABET.len()] as char)
        .collect()
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ParlorError::ConfigError(format!("password hashing failed: {}", e)))
}

#[derive(Debug)]
pub struct Room {
    pub code: String,
    pub game: GameType,
    pub max_players: usize,
    password_hash: Option<String>,
    /// Resolved best-of target for Rock-Paper-Scissors
    pub rps_rounds: u32,
    seed: u64,
    pub status: RoomStatus,
    pub players: Vec<Player>,
    pub state: Option<GameState>,
    pub outcome: Option<Outcome>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Room {
    pub fn new(config: RoomConfig, defaults: &EngineConfig) -> Result<Self> {
        config.validate()?;
        let password_hash = match &config.password {
            Some(pw) if !pw.is_empty() => Some(hash_password(pw)?),
            _ => None,
        };
        Ok(Self {
            code: generate_room_code(),
            game: config.game,
            max_players: config.max_players,
            password_hash,
            rps_rounds: config.rps_rounds.unwrap_or(defaults.rps_rounds),
            seed: config.seed.unwrap_or_else(rand::random),
            status: RoomStatus::Waiting,
            players: Vec::new(),
            state: None,
            outcome: None,
            created_at: Utc::now(),
            finished_at: None,
        })
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players
    }

    pub fn has_player(&self, id: &PlayerId) -> bool {
        self.players.iter().any(|p| p.id == *id)
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == *id)
    }

    pub fn player_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == *id)
    }

    pub fn verify_password(&self, attempt: Option<&str>) -> Result<()> {
        let hash = match &self.password_hash {
            Some(h) => h,
            None => return Ok(()),
        };
        let attempt = attempt.ok_or(ParlorError::WrongPassword)?;
        let parsed = PasswordHash::new(hash)
            .map_err(|e| ParlorError::ConfigError(format!("stored hash invalid: {}", e)))?;
        Argon2::default()
            .verify_password(attempt.as_bytes(), &parsed)
            .map_err(|_| ParlorError::WrongPassword)
    }

    /// Seat a player. Seat order is join order and becomes the turn order.
    pub fn add_player(&mut self, player: Player) -> Result<()> {
        match self.status {
            RoomStatus::Waiting => {}
            RoomStatus::Active => return Err(ParlorError::RoomFull),
            RoomStatus::Finished => return Err(ParlorError::RoomClosed),
        }
        if self.is_full() {
            return Err(ParlorError::RoomFull);
        }
        if self.has_player(&player.id) {
            return Err(ParlorError::IllegalMove("already seated in this room".to_string()));
        }
        self.players.push(player);
        Ok(())
    }

    pub fn remove_player(&mut self, id: &PlayerId) -> Option<Player> {
        let idx = self.players.iter().position(|p| p.id == *id)?;
        Some(self.players.remove(idx))
    }

    /// Roster is full: deal and go live
    pub fn start(&mut self) -> Result<()> {
        if self.status != RoomStatus::Waiting || !self.is_full() {
            return Err(ParlorError::RoomNotActive);
        }
        let seats: Vec<PlayerId> = self.players.iter().map(|p| p.id.clone()).collect();
        let rng = ChaCha8Rng::seed_from_u64(self.seed);
        self.state = Some(GameState::new_initial(self.game, &seats, rng));
        self.status = RoomStatus::Active;
        Ok(())
    }

    pub fn finish(&mut self, outcome: Outcome) {
        self.status = RoomStatus::Finished;
        self.outcome = Some(outcome);
        self.finished_at = Some(Utc::now());
    }

    /// Whether an active match can survive one more departure
    pub fn can_continue_without(&self, leaving: &PlayerId) -> bool {
        let remaining = self
            .players
            .iter()
            .filter(|p| p.id != *leaving)
            .count();
        remaining >= self.game.min_to_continue()
    }

    pub fn info(&self) -> RoomInfo {
        RoomInfo {
            code: self.code.clone(),
            game: self.game,
            status: self.status.as_str().to_string(),
            player_count: self.players.len(),
            max_players: self.max_players,
            has_password: self.password_hash.is_some(),
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::connection::event_channel;

    fn seat(id: &str) -> Player {
        let (tx, _rx) = event_channel();
        Player::new(id.to_string(), id.to_string(), tx)
    }

    fn plain_config(game: GameType, max_players: usize) -> RoomConfig {
        RoomConfig {
            game,
            max_players,
            password: None,
            rps_rounds: None,
            seed: Some(7),
        }
    }

    #[test]
    fn test_room_code_shape() {
        for _ in 0..50 {
            let code = generate_room_code();
            assert_eq!(code.len(), ROOM_CODE_LEN);
            assert!(code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn test_player_count_validated_per_game() {
        let defaults = EngineConfig::for_testing();
        let result = Room::new(plain_config(GameType::TicTacToe, 3), &defaults);
        assert!(matches!(result, Err(ParlorError::InvalidConfig(_))));
        let result = Room::new(plain_config(GameType::Durak, 7), &defaults);
        assert!(matches!(result, Err(ParlorError::InvalidConfig(_))));
        assert!(Room::new(plain_config(GameType::Durak, 4), &defaults).is_ok());
    }

    #[test]
    fn test_rounds_override_only_for_rps() {
        let defaults = EngineConfig::for_testing();
        let mut config = plain_config(GameType::TicTacToe, 2);
        config.rps_rounds = Some(5);
        assert!(Room::new(config, &defaults).is_err());

        let mut config = plain_config(GameType::Rps, 2);
        config.rps_rounds = Some(4);
        assert!(Room::new(config, &defaults).is_err());

        let mut config = plain_config(GameType::Rps, 2);
        config.rps_rounds = Some(5);
        let room = Room::new(config, &defaults).unwrap();
        assert_eq!(room.rps_rounds, 5);
    }

    #[test]
    fn test_password_round_trip() {
        let defaults = EngineConfig::for_testing();
        let mut config = plain_config(GameType::Rps, 2);
        config.password = Some("hunter2".to_string());
        let room = Room::new(config, &defaults).unwrap();

        assert!(room.verify_password(Some("hunter2")).is_ok());
        assert_eq!(
            room.verify_password(Some("wrong")),
            Err(ParlorError::WrongPassword)
        );
        assert_eq!(room.verify_password(None), Err(ParlorError::WrongPassword));
        assert!(room.info().has_password);
    }

    #[test]
    fn test_full_roster_starts_game() {
        let defaults = EngineConfig::for_testing();
        let mut room = Room::new(plain_config(GameType::TicTacToe, 2), &defaults).unwrap();

        assert!(room.start().is_err()); // not full yet
        room.add_player(seat("a")).unwrap();
        room.add_player(seat("b")).unwrap();
        assert!(room.is_full());
        assert_eq!(
            room.add_player(seat("c")),
            Err(ParlorError::RoomFull)
        );

        room.start().unwrap();
        assert_eq!(room.status, RoomStatus::Active);
        assert!(room.state.is_some());
    }

    #[test]
    fn test_duplicate_seat_rejected() {
        let defaults = EngineConfig::for_testing();
        let mut room = Room::new(plain_config(GameType::Durak, 3), &defaults).unwrap();
        room.add_player(seat("a")).unwrap();
        assert!(room.add_player(seat("a")).is_err());
    }
}
