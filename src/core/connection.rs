//! Outbound event channel handles
//! The transport layer owns the sockets; the engine only ever sees a sender
//! it can push typed events into.

use log::warn;
use tokio::sync::mpsc;

use crate::core::events::ServerEvent;

/// Sender half handed to the engine by the transport layer
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Receiver half kept by the transport layer
pub type EventReceiver = mpsc::UnboundedReceiver<ServerEvent>;

/// Create a fresh outbound channel pair for a connection
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Send an event, logging (but tolerating) a dropped receiver
pub fn send_event(target: &EventSender, player_id: &str, event: ServerEvent) -> bool {
    match target.send(event) {
        Ok(_) => true,
        Err(_) => {
            warn!("Failed to deliver event to player {}", player_id);
            false
        }
    }
}
