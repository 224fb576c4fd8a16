//! Core session machinery: rooms, players, scheduling and event plumbing

pub mod connection;
pub mod dispatcher;
pub mod events;
pub mod player;
pub mod room;
pub mod scheduler;

// Re-export main components for convenience
pub use connection::{event_channel, EventReceiver, EventSender};
pub use dispatcher::SessionEngine;
pub use events::{ClientCommand, RoomInfo, ServerEvent};
pub use player::{Player, PlayerId, PlayerInfo};
pub use room::{Room, RoomConfig, RoomStatus};
pub use scheduler::{RoomCommand, RoomHandle};
