//! Game rule engines
//!
//! One self-contained module per game, all behind the same contract: a state
//! struct with a validate-then-mutate `apply`, public/private view
//! projections and a turn owner. Dispatch is a tagged enum match, not trait
//! objects, so each engine stays independently testable.

pub mod battleship;
pub mod deck;
pub mod durak;
pub mod magnate;
pub mod rps;
pub mod tictactoe;
pub mod uno;

use std::collections::HashMap;

use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::player::PlayerId;
use crate::error::{ParlorError, Result};

use battleship::BattleshipState;
use deck::Card;
use durak::DurakState;
use magnate::MagnateState;
use rps::{RpsChoice, RpsState};
use tictactoe::TicTacToeState;
use uno::{UnoCard, UnoColor, UnoState};

/// The six supported game types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameType {
    Rps,
    TicTacToe,
    Battleship,
    Durak,
    Uno,
    Magnate,
}

impl GameType {
    /// Legal range for the configured player count
    pub fn player_range(&self) -> (usize, usize) {
        match self {
            Self::Rps | Self::TicTacToe | Self::Battleship => (2, 2),
            Self::Durak | Self::Uno | Self::Magnate => (2, 6),
        }
    }

    /// Minimum roster size below which an active game cannot continue
    pub fn min_to_continue(&self) -> usize {
        2
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rps => "rps",
            Self::TicTacToe => "tic_tac_toe",
            Self::Battleship => "battleship",
            Self::Durak => "durak",
            Self::Uno => "uno",
            Self::Magnate => "magnate",
        }
    }
}

/// Inbound move payloads, one namespace across all games.
/// The engine for the room's game type rejects moves that belong elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GameMove {
    // Rock-Paper-Scissors
    Choose { choice: RpsChoice },

    // Tic-Tac-Toe
    Place { cell: usize },

    // Battleship
    PlaceShips { ships: Vec<Vec<(u8, u8)>> },
    Fire { x: u8, y: u8 },

    // Durak
    Attack { card: Card },
    Defend { card: Card, pair_index: usize },
    Take,
    Pass,

    // UNO
    PlayCard { card: UnoCard, chosen_color: Option<UnoColor> },
    Draw,
    CallUno,
    CatchUno { target: PlayerId },

    // Magnate
    Roll,
    Buy,
    DeclineBuy,
    Bid { amount: i64 },
    PassBid,
    Build { square: u8 },
    PayJailFine,
    UseJailCard,
    EndTurn,
}

/// Events a rule engine reports back for broadcast alongside the new state
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    RoundResolved {
        winner: Option<PlayerId>,
        scores: HashMap<PlayerId, u32>,
    },
    PhaseChanged {
        phase: String,
    },
    Hit {
        shooter: PlayerId,
        x: u8,
        y: u8,
        sunk: bool,
    },
    Miss {
        shooter: PlayerId,
        x: u8,
        y: u8,
    },
    TableCleared,
    CardsTaken {
        player: PlayerId,
        count: usize,
    },
    PlayerOut {
        player: PlayerId,
    },
    PenaltyDraw {
        player: PlayerId,
        count: usize,
    },
    UnoCalled {
        player: PlayerId,
    },
    DiceRolled {
        player: PlayerId,
        die1: u8,
        die2: u8,
    },
    PassedGo {
        player: PlayerId,
    },
    RentPaid {
        from: PlayerId,
        to: PlayerId,
        amount: i64,
    },
    TaxPaid {
        player: PlayerId,
        amount: i64,
    },
    CardDrawn {
        player: PlayerId,
        text: String,
    },
    PropertyBought {
        player: PlayerId,
        square: u8,
        price: i64,
    },
    AuctionOpened {
        square: u8,
    },
    BidPlaced {
        player: PlayerId,
        amount: i64,
    },
    AuctionSettled {
        winner: Option<PlayerId>,
        square: u8,
        amount: i64,
    },
    WentToJail {
        player: PlayerId,
    },
    Bankrupt {
        player: PlayerId,
    },
}

/// Terminal result of a match
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outcome {
    Win {
        winner: PlayerId,
    },
    Draw,
    /// Durak names a loser, not a winner
    Durak {
        loser: PlayerId,
    },
    /// Best-of-N score outcome (RPS)
    Score {
        winner: Option<PlayerId>,
        scores: HashMap<PlayerId, u32>,
    },
    /// Room force-finished because too few players remained
    Forfeit {
        winner: Option<PlayerId>,
        left: PlayerId,
    },
}

/// What an accepted move produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineOutcome {
    pub events: Vec<GameEvent>,
    pub terminal: Option<Outcome>,
}

impl EngineOutcome {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_events(events: Vec<GameEvent>) -> Self {
        Self {
            events,
            terminal: None,
        }
    }
}

/// One authoritative game state per room; tagged union, one shape per game
#[derive(Debug, Clone)]
pub enum GameState {
    Rps(RpsState),
    TicTacToe(TicTacToeState),
    Battleship(BattleshipState),
    Durak(DurakState),
    Uno(UnoState),
    Magnate(MagnateState),
}

impl GameState {
    /// Build the initial state for a full roster, performing the initial
    /// deal/placement where the game has one
    pub fn new_initial(game: GameType, players: &[PlayerId], rng: ChaCha8Rng) -> Self {
        match game {
            GameType::Rps => Self::Rps(RpsState::new(players)),
            GameType::TicTacToe => Self::TicTacToe(TicTacToeState::new(players)),
            GameType::Battleship => Self::Battleship(BattleshipState::new(players)),
            GameType::Durak => Self::Durak(DurakState::new(players, rng)),
            GameType::Uno => Self::Uno(UnoState::new(players, rng)),
            GameType::Magnate => Self::Magnate(MagnateState::new(players, rng)),
        }
    }

    pub fn game_type(&self) -> GameType {
        match self {
            Self::Rps(_) => GameType::Rps,
            Self::TicTacToe(_) => GameType::TicTacToe,
            Self::Battleship(_) => GameType::Battleship,
            Self::Durak(_) => GameType::Durak,
            Self::Uno(_) => GameType::Uno,
            Self::Magnate(_) => GameType::Magnate,
        }
    }

    /// Apply one move for one player. A rejection performs no mutation.
    pub fn apply(&mut self, player: &PlayerId, mv: &GameMove) -> Result<EngineOutcome> {
        match self {
            Self::Rps(state) => state.apply(player, mv),
            Self::TicTacToe(state) => state.apply(player, mv),
            Self::Battleship(state) => state.apply(player, mv),
            Self::Durak(state) => state.apply(player, mv),
            Self::Uno(state) => state.apply(player, mv),
            Self::Magnate(state) => state.apply(player, mv),
        }
    }

    /// Broadcastable slice of the state; never contains private hands or
    /// ship layouts
    pub fn public_view(&self) -> Value {
        let view = match self {
            Self::Rps(state) => serde_json::to_value(state.public_view()),
            Self::TicTacToe(state) => serde_json::to_value(state.public_view()),
            Self::Battleship(state) => serde_json::to_value(state.public_view()),
            Self::Durak(state) => serde_json::to_value(state.public_view()),
            Self::Uno(state) => serde_json::to_value(state.public_view()),
            Self::Magnate(state) => serde_json::to_value(state.public_view()),
        };
        view.unwrap_or(Value::Null)
    }

    /// Per-player private slice, sent only to its owner
    pub fn private_view(&self, player: &PlayerId) -> Option<Value> {
        let view = match self {
            Self::Rps(state) => state.private_view(player).map(serde_json::to_value),
            Self::TicTacToe(_) => None,
            Self::Battleship(state) => state.private_view(player).map(serde_json::to_value),
            Self::Durak(state) => state.private_view(player).map(serde_json::to_value),
            Self::Uno(state) => state.private_view(player).map(serde_json::to_value),
            Self::Magnate(_) => None,
        };
        view.map(|v| v.unwrap_or(Value::Null))
    }

    /// Whose turn it is, where the game has a single turn owner
    pub fn turn_owner(&self) -> Option<PlayerId> {
        match self {
            Self::Rps(_) => None,
            Self::TicTacToe(state) => Some(state.turn_owner()),
            Self::Battleship(state) => state.turn_owner(),
            Self::Durak(state) => state.turn_owner(),
            Self::Uno(state) => Some(state.turn_owner()),
            Self::Magnate(state) => state.turn_owner(),
        }
    }

    /// Remove a player who left mid-game while enough players remain for
    /// the game to continue. Two-player games never take this path; the
    /// room force-finishes them instead.
    pub fn eliminate(&mut self, player: &PlayerId) -> EngineOutcome {
        match self {
            Self::Rps(_) | Self::TicTacToe(_) | Self::Battleship(_) => EngineOutcome::none(),
            Self::Durak(state) => state.eliminate(player),
            Self::Uno(state) => state.eliminate(player),
            Self::Magnate(state) => state.eliminate(player),
        }
    }
}

pub(crate) fn illegal(reason: &str) -> ParlorError {
    ParlorError::IllegalMove(reason.to_string())
}

pub(crate) fn wrong_game() -> ParlorError {
    illegal("move does not belong to this game")
}
