use super::{AppState, RegistryError, Room};
use crate::protocol::ServerMessage;
use crate::scoring;
use crate::validate::{fast_verdict, normalize, FastVerdict};

/// Result of a single submission, as seen by the submitting connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted { word: String, points: u64 },
    /// Already accepted this round; no penalty, no broadcast.
    Duplicate,
    /// Genuine wrong guess; the player's streak is reset.
    Wrong,
    /// Round is rotating; submissions are rejected until the next
    /// category lands.
    Locked,
    /// A slow-path judgement resolved after the round rotated; the state
    /// it was issued against no longer exists and nothing was mutated.
    Stale,
}

impl AppState {
    /// Validate and score one word for one player.
    ///
    /// The fast path (duplicate check + example-set lookup) runs under the
    /// room lock and settles most submissions in O(1). Inconclusive words
    /// go to the oracle with no lock held, so one slow judgement never
    /// blocks other players; the round generation captured before the
    /// await gates the mutation afterwards. The registry is the single
    /// serialization point, so concurrent submissions of the same word
    /// resolve to exactly one acceptance.
    pub async fn submit(
        &self,
        room_code: &str,
        player_id: &str,
        raw_word: &str,
    ) -> Result<SubmitOutcome, RegistryError> {
        let word = normalize(raw_word);
        if word.is_empty() {
            return Err(RegistryError::ConfigMissing);
        }

        let room = self.room(room_code).await?;

        // Fast path, in-lock.
        let (generation, category_name) = {
            let mut locked_room = room.lock().await;
            if locked_room.player_mut(player_id).is_none() {
                return Err(RegistryError::PlayerNotFound(player_id.to_string()));
            }
            if locked_room.round.locked {
                return Ok(SubmitOutcome::Locked);
            }
            let Some(category) = locked_room.round.category.as_ref() else {
                // No round yet (game not started); nothing to accept.
                return Ok(SubmitOutcome::Locked);
            };

            match fast_verdict(category, &locked_room.round.accepted, &word) {
                FastVerdict::Duplicate => return Ok(SubmitOutcome::Duplicate),
                FastVerdict::Known => {
                    return Ok(self.accept(&mut locked_room, player_id, word));
                }
                FastVerdict::Unknown => {
                    (locked_room.round.generation, category.name.clone())
                }
            }
        };

        // Slow path: oracle judgement with no lock held. Fails closed.
        let valid = self.oracle.validate_word(&category_name, &word).await;

        let mut locked_room = room.lock().await;
        if locked_room.round.generation != generation {
            // The round this judgement was issued against rotated away.
            tracing::debug!(room = room_code, word, "discarding stale judgement");
            return Ok(SubmitOutcome::Stale);
        }

        if !valid {
            let Some(player) = locked_room.player_mut(player_id) else {
                return Err(RegistryError::PlayerNotFound(player_id.to_string()));
            };
            player.streak = 0;
            locked_room.broadcast(ServerMessage::PlayerUpdate {
                players: locked_room.roster(),
            });
            return Ok(SubmitOutcome::Wrong);
        }

        if locked_room.round.locked {
            return Ok(SubmitOutcome::Locked);
        }
        // Another player may have landed the same word while we awaited.
        if locked_room.round.accepted.contains(&word) {
            return Ok(SubmitOutcome::Duplicate);
        }

        Ok(self.accept(&mut locked_room, player_id, word))
    }

    /// Record an accepted word: score it, broadcast it, and lock the round
    /// if it was the rotation-threshold answer. Must be called with the
    /// room lock held; the rotation itself is spawned, never awaited here.
    fn accept(&self, room: &mut Room, player_id: &str, word: String) -> SubmitOutcome {
        let now = chrono::Utc::now();
        let Some(player) = room.player_mut(player_id) else {
            return SubmitOutcome::Stale;
        };

        let millis_since_last = player
            .last_submit
            .parse::<chrono::DateTime<chrono::Utc>>()
            .map(|last| (now - last).num_milliseconds())
            .unwrap_or(i64::MAX);
        let points = scoring::points_with_pace(player.streak, false, millis_since_last);

        player.score += points;
        player.streak += 1;
        player.last_submit = now.to_rfc3339();
        let username = player.name.clone();

        room.round.accepted.insert(word.clone());
        tracing::debug!(room = %room.code, word, points, "word accepted");

        room.broadcast(ServerMessage::NewWord {
            word: word.clone(),
            username,
        });
        room.broadcast(ServerMessage::PlayerUpdate {
            players: room.roster(),
        });

        if room.round.at_threshold() {
            room.round.locked = true;
            room.broadcast(ServerMessage::SyncStatus { locked: true });
            self.spawn_rotation(&room.code);
        }

        SubmitOutcome::Accepted { word, points }
    }
}
