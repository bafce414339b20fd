use super::AppState;
use crate::protocol::{CategoryInfo, ServerMessage};
use crate::types::*;
use std::collections::HashSet;

/// State of the active round: ACTIVE (accepting) or LOCKED (rotating).
///
/// `locked` flips true exactly when `accepted` reaches the rotation
/// threshold and false exactly when the next category is installed. The
/// generation counter increments on every installation and keys
/// stale-response discards and prefetch validity.
#[derive(Debug, Clone)]
pub struct RoundState {
    pub category: Option<Category>,
    pub accepted: HashSet<String>,
    pub locked: bool,
    pub generation: u64,
}

impl RoundState {
    pub fn new() -> Self {
        Self {
            category: None,
            accepted: HashSet::new(),
            locked: false,
            generation: 0,
        }
    }

    /// Install the next category: supersedes the old one, clears the
    /// accepted set, clears the lock, and moves to a new generation.
    pub fn install(&mut self, category: Category) {
        self.category = Some(category);
        self.accepted.clear();
        self.locked = false;
        self.generation += 1;
    }

    pub fn at_threshold(&self) -> bool {
        self.accepted.len() >= ROTATION_THRESHOLD
    }
}

impl Default for RoundState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    /// Fire-and-forget rotation. Failure is absorbed (the oracle falls back
    /// to the local table), so the lock can never stay stuck.
    pub fn spawn_rotation(&self, room_code: &str) {
        let state = self.clone();
        let code = room_code.to_string();
        tokio::spawn(async move {
            state.rotate(&code).await;
        });
    }

    /// Replace the active category and unlock the round.
    ///
    /// The category comes from the prefetch buffer when its generation
    /// still matches; otherwise it is fetched synchronously. The oracle
    /// round-trip happens with no lock held; only the cheap installation
    /// re-enters the room's serialization domain.
    pub async fn rotate(&self, room_code: &str) {
        let Ok(room) = self.room(room_code).await else {
            // Room emptied out while the rotation was in flight.
            return;
        };

        let (prefetched, level, generation) = {
            let mut room = room.lock().await;
            let generation = room.round.generation;
            let prefetched = room
                .prefetched
                .take()
                .filter(|(gen, _)| *gen == generation)
                .map(|(_, category)| category);
            (prefetched, room.level_hint(), generation)
        };

        let category = match prefetched {
            Some(category) => category,
            None => self.oracle.request_category(level).await,
        };

        let next_generation = {
            let mut room = room.lock().await;
            if room.round.generation != generation {
                // Another rotation beat us to it; rotation is idempotent.
                tracing::debug!(room = %room.code, "discarding superseded rotation");
                return;
            }
            tracing::info!(room = %room.code, category = %category.name, "rotating category");
            let info = CategoryInfo::from(&category);
            room.round.install(category);
            room.broadcast(ServerMessage::SyncQuestion { category: info });
            room.broadcast(ServerMessage::SyncStatus { locked: false });
            room.broadcast(ServerMessage::PlayerUpdate {
                players: room.roster(),
            });
            room.round.generation
        };

        self.spawn_prefetch(room_code, next_generation);
    }

    /// Best-effort background fetch of the next category. The result is
    /// stored only if the round it was requested for is still active.
    pub fn spawn_prefetch(&self, room_code: &str, generation: u64) {
        let state = self.clone();
        let code = room_code.to_string();
        tokio::spawn(async move {
            let Ok(room) = state.room(&code).await else {
                return;
            };
            let level = room.lock().await.level_hint();
            let category = state.oracle.request_category(level).await;

            let mut room = room.lock().await;
            if room.round.generation == generation {
                room.prefetched = Some((generation, category));
            } else {
                tracing::debug!(room = %room.code, "discarding stale prefetch");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::CategoryOracle;

    #[test]
    fn install_resets_round() {
        let mut round = RoundState::new();
        round.accepted.insert("apple".to_string());
        round.locked = true;
        let generation = round.generation;

        round.install(Category::new("ANIMALS", ["lion"], "#fff"));
        assert!(round.accepted.is_empty());
        assert!(!round.locked);
        assert_eq!(round.generation, generation + 1);
        assert_eq!(round.category.as_ref().unwrap().name, "ANIMALS");
    }

    #[test]
    fn threshold_at_five() {
        let mut round = RoundState::new();
        for w in ["a", "b", "c", "d"] {
            round.accepted.insert(w.to_string());
        }
        assert!(!round.at_threshold());
        round.accepted.insert("e".to_string());
        assert!(round.at_threshold());
    }

    #[tokio::test]
    async fn rotate_installs_fallback_and_unlocks() {
        let state = AppState::new(CategoryOracle::fallback_only());
        state.join("ABCD", "P1").await.unwrap();

        {
            let room = state.room("ABCD").await.unwrap();
            let mut room = room.lock().await;
            room.round.locked = true;
            room.round.accepted.insert("stale".to_string());
        }

        state.rotate("ABCD").await;

        let room = state.room("ABCD").await.unwrap();
        let room = room.lock().await;
        assert!(!room.round.locked);
        assert!(room.round.accepted.is_empty());
        assert!(room.round.category.is_some());
        assert_eq!(room.round.generation, 1);
    }

    #[tokio::test]
    async fn rotate_prefers_matching_prefetch() {
        let state = AppState::new(CategoryOracle::fallback_only());
        state.join("ABCD", "P1").await.unwrap();

        let special = Category::new("SPECIAL", ["one"], "#fff");
        {
            let room = state.room("ABCD").await.unwrap();
            let mut room = room.lock().await;
            room.prefetched = Some((room.round.generation, special.clone()));
        }

        state.rotate("ABCD").await;

        let room = state.room("ABCD").await.unwrap();
        let room = room.lock().await;
        assert_eq!(room.round.category.as_ref().unwrap().name, "SPECIAL");
        assert!(room.prefetched.is_none());
    }

    #[tokio::test]
    async fn rotate_discards_mismatched_prefetch() {
        let state = AppState::new(CategoryOracle::fallback_only());
        state.join("ABCD", "P1").await.unwrap();

        {
            let room = state.room("ABCD").await.unwrap();
            let mut room = room.lock().await;
            // Prefetched for a generation that already rotated away.
            room.prefetched = Some((99, Category::new("STALE", ["x"], "#fff")));
        }

        state.rotate("ABCD").await;

        let room = state.room("ABCD").await.unwrap();
        let room = room.lock().await;
        assert_ne!(room.round.category.as_ref().unwrap().name, "STALE");
    }
}
