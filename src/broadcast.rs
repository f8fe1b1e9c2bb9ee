//! Delivery helpers for server messages.
//!
//! Messages are serialized once and pushed onto each recipient's [`Sink`].
//! A closed sink means the connection is already gone; its leave is handled
//! by the connection loop, so delivery failures are only logged.

use tracing::{debug, error};

use crate::error::Result;
use crate::protocol::ServerMessage;
use crate::room::{Room, Sink};

/// Serialize `message` to its wire form.
///
/// # Errors
///
/// Returns [`ChainReactionError::Serialization`](crate::ChainReactionError::Serialization)
/// if `serde_json` rejects the message.
pub fn encode(message: &ServerMessage) -> Result<String> {
    Ok(serde_json::to_string(message)?)
}

/// Like [`encode`], but logs the failure. Delivery helpers never fail.
fn encode_logged(message: &ServerMessage) -> Option<String> {
    match encode(message) {
        Ok(json) => Some(json),
        Err(e) => {
            error!("failed to encode server message: {e}");
            None
        }
    }
}

/// Send `message` on a single sink. Returns `true` if it was queued.
pub fn send_direct(sink: &Sink, message: &ServerMessage) -> bool {
    encode_logged(message).is_some_and(|json| push(sink, json))
}

/// Send `message` to one member of `room`. Returns `true` if it was queued.
pub fn send_to(room: &Room, player: &str, message: &ServerMessage) -> bool {
    match room.recipient(player) {
        Some(sink) => send_direct(sink, message),
        None => {
            debug!(room = %room.code(), player = %player, "no recipient registered");
            false
        }
    }
}

/// Send `message` to every member of `room`. Returns how many sinks accepted
/// it.
pub fn broadcast(room: &Room, message: &ServerMessage) -> usize {
    let Some(json) = encode_logged(message) else {
        return 0;
    };
    let mut delivered = 0;
    for (player, sink) in room.recipients() {
        if push(sink, json.clone()) {
            delivered += 1;
        } else {
            debug!(room = %room.code(), player = %player, "recipient sink closed");
        }
    }
    delivered
}

fn push(sink: &Sink, json: String) -> bool {
    sink.send(json).is_ok()
}
