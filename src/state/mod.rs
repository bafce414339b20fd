mod room;
mod round;
mod submit;

pub use room::{generate_room_code, JoinAck};
pub use round::RoundState;
pub use submit::SubmitOutcome;

use crate::oracle::CategoryOracle;
use crate::protocol::{PlayerInfo, ServerMessage};
use crate::types::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};

/// Errors surfaced at the registry boundary, before any state mutation.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("room {0} not found")]
    RoomNotFound(RoomCode),

    #[error("missing name or room code")]
    ConfigMissing,

    #[error("player {0} not found in room")]
    PlayerNotFound(PlayerId),

    #[error("only the host can start the game")]
    NotHost,
}

impl RegistryError {
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::RoomNotFound(_) => "ROOM_NOT_FOUND",
            RegistryError::ConfigMissing => "CONFIG_MISSING",
            RegistryError::PlayerNotFound(_) => "PLAYER_NOT_FOUND",
            RegistryError::NotHost => "NOT_HOST",
        }
    }
}

/// One game room. Owned by the registry; every mutation happens under the
/// room's mutex, so the registry is the single writer for room state.
pub struct Room {
    pub code: RoomCode,
    /// Insertion order is join order; players[0] is the host.
    pub players: Vec<Player>,
    pub round: RoundState,
    /// Background-fetched next category, keyed by the generation it was
    /// requested for. Discarded if the round moved on.
    pub prefetched: Option<(u64, Category)>,
    pub started: bool,
    /// Fan-out channel for this room; every connection subscribes on join.
    pub tx: broadcast::Sender<ServerMessage>,
}

impl Room {
    fn new(code: RoomCode) -> Self {
        let (tx, _rx) = broadcast::channel(100);
        Self {
            code,
            players: Vec::new(),
            round: RoundState::new(),
            prefetched: None,
            started: false,
            tx,
        }
    }

    /// Broadcast to every subscriber; no receivers connected is fine.
    pub fn broadcast(&self, msg: ServerMessage) {
        let _ = self.tx.send(msg);
    }

    pub fn roster(&self) -> Vec<PlayerInfo> {
        self.players.iter().map(PlayerInfo::from).collect()
    }

    pub fn player_mut(&mut self, player_id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == player_id)
    }

    pub fn is_host(&self, player_id: &str) -> bool {
        self.players.first().is_some_and(|p| p.id == player_id)
    }

    /// Difficulty hint for the oracle, driven by the leading score.
    pub fn level_hint(&self) -> u32 {
        let top = self.players.iter().map(|p| p.score).max().unwrap_or(0);
        crate::scoring::level_for_score(top)
    }
}

/// Shared application state: the room registry.
///
/// The map lock is held only to resolve, create, or destroy a room entry;
/// room mutations run under that room's own mutex. Different rooms proceed
/// fully in parallel, and the oracle is never awaited while either lock is
/// held.
#[derive(Clone)]
pub struct AppState {
    rooms: Arc<RwLock<HashMap<RoomCode, Arc<Mutex<Room>>>>>,
    pub oracle: Arc<CategoryOracle>,
}

impl AppState {
    pub fn new(oracle: CategoryOracle) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            oracle: Arc::new(oracle),
        }
    }

    pub async fn room(&self, code: &str) -> Result<Arc<Mutex<Room>>, RegistryError> {
        self.rooms
            .read()
            .await
            .get(code)
            .cloned()
            .ok_or_else(|| RegistryError::RoomNotFound(code.to_string()))
    }

    /// Room map access for membership changes; see `state/room.rs`.
    pub(crate) fn rooms(&self) -> &RwLock<HashMap<RoomCode, Arc<Mutex<Room>>>> {
        &self.rooms
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}
