//! Process-wide room table.
//!
//! The registry maps room codes to rooms. Its own lock only guards the map;
//! each room sits behind a separate [`Mutex`] so operations on different
//! rooms never contend. The registry never awaits a room lock while holding
//! the map, so taking the map lock while holding a room lock cannot deadlock.

use std::collections::HashMap;
use std::sync::Arc;

use rand::seq::IndexedRandom;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::ServerConfig;
use crate::protocol::{PlayerId, RoomCode};
use crate::room::{Room, Sink};

/// Shared, lockable handle to one room.
pub type RoomHandle = Arc<Mutex<Room>>;

/// Characters used in generated room codes.
const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Collection of all live rooms.
#[derive(Debug)]
pub struct RoomRegistry {
    rooms: Mutex<HashMap<RoomCode, RoomHandle>>,
    code_length: usize,
    max_players: usize,
}

impl RoomRegistry {
    /// Create an empty registry using the room limits from `config`.
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            code_length: config.room_code_length,
            max_players: config.max_players,
        }
    }

    /// Create and register a room hosted by `host`.
    ///
    /// The code is unique among rooms registered at the time of the call.
    pub async fn create_room(
        &self,
        host: PlayerId,
        sink: Sink,
        dimensions: (u32, u32),
    ) -> (RoomCode, RoomHandle) {
        let mut rooms = self.rooms.lock().await;
        let code = unique_code(|code| rooms.contains_key(code), || {
            random_code(self.code_length)
        });
        let room = Room::new(code.clone(), host, sink, dimensions, self.max_players);
        let handle = Arc::new(Mutex::new(room));
        rooms.insert(code.clone(), Arc::clone(&handle));
        debug!(room = %code, live_rooms = rooms.len(), "room registered");
        (code, handle)
    }

    /// Find a live room by code.
    pub async fn lookup(&self, code: &str) -> Option<RoomHandle> {
        self.rooms.lock().await.get(code).cloned()
    }

    /// Deregister a room. Returns `true` if it was registered.
    pub async fn remove(&self, code: &str) -> bool {
        let mut rooms = self.rooms.lock().await;
        let removed = rooms.remove(code).is_some();
        if removed {
            debug!(room = %code, live_rooms = rooms.len(), "room deregistered");
        }
        removed
    }

    /// Number of registered rooms.
    pub async fn len(&self) -> usize {
        self.rooms.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rooms.lock().await.is_empty()
    }

    /// Codes of all registered rooms, sorted.
    pub async fn codes(&self) -> Vec<RoomCode> {
        let mut codes: Vec<RoomCode> = self.rooms.lock().await.keys().cloned().collect();
        codes.sort();
        codes
    }
}

/// Draw codes until one is not taken.
fn unique_code(
    taken: impl Fn(&str) -> bool,
    mut draw: impl FnMut() -> RoomCode,
) -> RoomCode {
    loop {
        let code = draw();
        if !taken(&code) {
            return code;
        }
        debug!(room = %code, "room code collision, resampling");
    }
}

/// Random uppercase alphanumeric code of `length` characters.
pub fn random_code(length: usize) -> RoomCode {
    let mut rng = rand::rng();
    (0..length)
        .filter_map(|_| ROOM_CODE_ALPHABET.choose(&mut rng))
        .map(|&b| char::from(b))
        .collect()
}
