//! Parlor - an authoritative multi-game session engine
//!
//! This library hosts turn-based matches in short-lived rooms: it seats
//! players, serializes their moves per room, runs the rules for six games
//! and pushes state updates back out through transport-agnostic channels.

pub mod config;
pub mod constants;
pub mod core;
pub mod error;
pub mod games;

// Re-export main components
pub use crate::config::EngineConfig;
pub use crate::core::{event_channel, ClientCommand, ServerEvent, SessionEngine};
pub use crate::error::{ParlorError, Result};
pub use crate::games::{GameMove, GameType, Outcome};
