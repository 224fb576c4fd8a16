use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParlorError {
    // Room creation errors
    InvalidConfig(String),
    RegistryFull,

    // Join-time errors (user-correctable)
    RoomNotFound,
    RoomFull,
    WrongPassword,

    // Move-time rejections (room state unaffected)
    RoomNotActive,
    PlayerNotInRoom,
    NotYourTurn,
    IllegalMove(String),

    // Engine plumbing errors
    RoomClosed,
    ConfigError(String),
}

impl fmt::Display for ParlorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "Invalid room configuration: {}", msg),
            Self::RegistryFull => write!(f, "Room registry is at capacity"),
            Self::RoomNotFound => write!(f, "Room not found"),
            Self::RoomFull => write!(f, "Room is full"),
            Self::WrongPassword => write!(f, "Wrong room password"),
            Self::RoomNotActive => write!(f, "Room is not active"),
            Self::PlayerNotInRoom => write!(f, "Player is not in this room"),
            Self::NotYourTurn => write!(f, "Not your turn"),
            Self::IllegalMove(msg) => write!(f, "Illegal move: {}", msg),
            Self::RoomClosed => write!(f, "Room task has shut down"),
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for ParlorError {}

impl ParlorError {
    /// Stable machine-readable code for outbound error events
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "invalid_config",
            Self::RegistryFull => "registry_full",
            Self::RoomNotFound => "not_found",
            Self::RoomFull => "full",
            Self::WrongPassword => "wrong_password",
            Self::RoomNotActive => "room_not_active",
            Self::PlayerNotInRoom => "player_not_in_room",
            Self::NotYourTurn => "not_your_turn",
            Self::IllegalMove(_) => "illegal_move",
            Self::RoomClosed => "room_closed",
            Self::ConfigError(_) => "config_error",
        }
    }
}

// Generic result type for the engine
pub type Result<T> = std::result::Result<T, ParlorError>;
