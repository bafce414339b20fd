use super::{AppState, RegistryError, Room};
use crate::protocol::{CategoryInfo, ServerMessage};
use crate::types::*;
use rand::Rng;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

/// Safe character set for room codes (excludes 0/O, 1/I/L to avoid confusion)
const CODE_CHARS: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 6;

/// Generate a random room code for hosts.
pub fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

/// Everything a new connection needs after joining: its registry-assigned
/// id, a subscription to the room's broadcasts, and an immediate snapshot
/// of the current round so latecomers never see a stale or empty prompt.
pub struct JoinAck {
    pub player_id: PlayerId,
    pub rx: broadcast::Receiver<ServerMessage>,
    pub current_category: Option<CategoryInfo>,
}

impl AppState {
    /// Register a player in a room, creating the room on first join.
    ///
    /// Broadcasts the full updated roster to the room and returns the
    /// current category for an immediate unicast to the joiner.
    pub async fn join(&self, room_code: &str, username: &str) -> Result<JoinAck, RegistryError> {
        let room_code = room_code.trim().to_uppercase();
        let username = username.trim();
        if room_code.is_empty() || username.is_empty() {
            return Err(RegistryError::ConfigMissing);
        }

        // Membership changes hold the map lock so room creation and
        // destruction cannot interleave.
        let mut rooms = self.rooms().write().await;
        let room = rooms
            .entry(room_code.clone())
            .or_insert_with(|| {
                tracing::info!(room = %room_code, "creating room");
                Arc::new(Mutex::new(Room::new(room_code.clone())))
            })
            .clone();

        let mut room = room.lock().await;
        let player = Player::new(username.to_string());
        let player_id = player.id.clone();
        room.players.push(player);
        tracing::info!(room = %room.code, player = %player_id, name = username, "player joined");

        // Subscribe before broadcasting so the joiner sees their own
        // roster refresh.
        let rx = room.tx.subscribe();
        room.broadcast(ServerMessage::PlayerUpdate {
            players: room.roster(),
        });

        Ok(JoinAck {
            player_id,
            rx,
            current_category: room.round.category.as_ref().map(CategoryInfo::from),
        })
    }

    /// Remove a player; destroys the room when the last player leaves.
    pub async fn leave(&self, room_code: &str, player_id: &str) -> Result<(), RegistryError> {
        let mut rooms = self.rooms().write().await;
        let room_arc = rooms
            .get(room_code)
            .cloned()
            .ok_or_else(|| RegistryError::RoomNotFound(room_code.to_string()))?;

        let mut room = room_arc.lock().await;
        let before = room.players.len();
        room.players.retain(|p| p.id != player_id);
        if room.players.len() == before {
            return Err(RegistryError::PlayerNotFound(player_id.to_string()));
        }

        tracing::info!(room = %room.code, player = %player_id, "player left");

        if room.players.is_empty() {
            drop(room);
            rooms.remove(room_code);
            tracing::info!(room = %room_code, "room destroyed");
        } else {
            room.broadcast(ServerMessage::PlayerUpdate {
                players: room.roster(),
            });
        }
        Ok(())
    }

    /// Toggle a player's lobby readiness and refresh the roster.
    pub async fn set_ready(
        &self,
        room_code: &str,
        player_id: &str,
        ready: bool,
    ) -> Result<(), RegistryError> {
        let room = self.room(room_code).await?;
        let mut room = room.lock().await;
        let player = room
            .player_mut(player_id)
            .ok_or_else(|| RegistryError::PlayerNotFound(player_id.to_string()))?;
        player.status = if ready {
            PlayerStatus::Ready
        } else {
            PlayerStatus::Waiting
        };
        room.broadcast(ServerMessage::PlayerUpdate {
            players: room.roster(),
        });
        Ok(())
    }

    /// Host-triggered game start: signals the room and kicks off the first
    /// rotation. Subsequent rotations fire automatically at the answer
    /// threshold.
    pub async fn start_game(&self, room_code: &str, player_id: &str) -> Result<(), RegistryError> {
        let room = self.room(room_code).await?;
        {
            let mut room = room.lock().await;
            if !room.is_host(player_id) {
                return Err(RegistryError::NotHost);
            }
            if room.started {
                // Repeated start requests must not re-rotate.
                return Ok(());
            }
            room.started = true;
            room.broadcast(ServerMessage::StartGameSignal);
        }
        self.spawn_rotation(room_code);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::CategoryOracle;

    #[test]
    fn room_codes_use_safe_charset() {
        for _ in 0..50 {
            let code = generate_room_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|b| CODE_CHARS.contains(&b)));
        }
    }

    #[tokio::test]
    async fn joiner_receives_current_category() {
        let state = AppState::new(CategoryOracle::fallback_only());
        state.join("ABCD", "P1").await.unwrap();

        {
            let room = state.room("ABCD").await.unwrap();
            let mut room = room.lock().await;
            room.round.install(Category::new("FRUITS", ["apple"], "#fff"));
        }

        let ack = state.join("ABCD", "P2").await.unwrap();
        let category = ack.current_category.expect("latecomer must get the round");
        assert_eq!(category.text, "FRUITS");
    }

    #[tokio::test]
    async fn ready_state_is_broadcast() {
        let state = AppState::new(CategoryOracle::fallback_only());
        let ack = state.join("ABCD", "P1").await.unwrap();
        let mut rx = ack.rx;

        // First broadcast is the join's own roster refresh.
        let joined = rx.recv().await.unwrap();
        assert!(matches!(joined, ServerMessage::PlayerUpdate { .. }));

        state.set_ready("ABCD", &ack.player_id, true).await.unwrap();

        match rx.recv().await.unwrap() {
            ServerMessage::PlayerUpdate { players } => {
                assert_eq!(players[0].status, PlayerStatus::Ready);
            }
            other => panic!("expected PlayerUpdate, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn only_host_starts_game() {
        let state = AppState::new(CategoryOracle::fallback_only());
        let _host = state.join("ABCD", "P1").await.unwrap();
        let other = state.join("ABCD", "P2").await.unwrap();

        assert!(matches!(
            state.start_game("ABCD", &other.player_id).await,
            Err(RegistryError::NotHost)
        ));
    }

    #[tokio::test]
    async fn leave_unknown_room_is_rejected() {
        let state = AppState::new(CategoryOracle::fallback_only());
        assert!(matches!(
            state.leave("NOPE", "id").await,
            Err(RegistryError::RoomNotFound(_))
        ));
    }
}
