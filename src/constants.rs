use std::time::Duration;

// Reconnect grace period before a dropped player is treated as having left
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(45);

// Idle time after a room finishes before it is reaped
pub const DEFAULT_REAP_TIMEOUT: Duration = Duration::from_secs(300);

// Registry capacity
pub const DEFAULT_MAX_ROOMS: usize = 10_000;

// Rock-Paper-Scissors match length (must be odd)
pub const DEFAULT_RPS_ROUNDS: u32 = 3;

// Room code alphabet: upper-case alphanumerics minus ambiguous glyphs (0/O, 1/I/L)
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
pub const ROOM_CODE_LEN: usize = 6;
