use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Opaque ID types for type safety
pub type PlayerId = String;
pub type RoomCode = String;

/// Countdown ceiling in seconds; correct answers refill toward this cap.
pub const MAX_TIME: u32 = 40;

/// Accepted answers per round before the category rotates.
pub const ROTATION_THRESHOLD: usize = 5;

/// Seconds added to the countdown per correct answer.
pub const TIME_BONUS: u32 = 3;

/// Integrity regained on a correct answer / lost on a wrong guess.
pub const INTEGRITY_RECOVERY: u8 = 5;
pub const INTEGRITY_PENALTY: u8 = 15;

/// A category prompt with its known-answer set.
///
/// `examples` is normalized (lowercased, trimmed) at construction so the
/// fast validation path is a plain set-membership test. The set is never
/// mutated once the category is installed into a round; rotation replaces
/// the whole value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub name: String,
    pub examples: HashSet<String>,
    /// Opaque display token forwarded to clients untouched.
    pub color: String,
}

impl Category {
    pub fn new(
        name: &str,
        examples: impl IntoIterator<Item = impl AsRef<str>>,
        color: &str,
    ) -> Self {
        Self {
            name: name.trim().to_uppercase(),
            examples: examples
                .into_iter()
                .map(|e| e.as_ref().trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
            color: color.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerStatus {
    Waiting,
    Ready,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub status: PlayerStatus,
    pub score: u64,
    pub streak: u32,
    /// ISO8601 timestamp of the last accepted submission. Starts at the
    /// epoch so the first accept never counts as a fast chain.
    pub last_submit: String,
}

impl Player {
    pub fn new(name: String) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            name,
            status: PlayerStatus::Waiting,
            score: 0,
            streak: 0,
            last_submit: chrono::DateTime::<chrono::Utc>::UNIX_EPOCH.to_rfc3339(),
        }
    }
}

/// Client-side session phases, driven by the session controller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionPhase {
    Idle,
    Lobby,
    Waiting,
    Playing,
    GameOver,
}
