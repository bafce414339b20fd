use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    JoinRoom {
        room_code: RoomCode,
        username: String,
    },
    SubmitWord {
        room_code: RoomCode,
        player_id: PlayerId,
        word: String,
    },
    PlayerReady {
        room_code: RoomCode,
        player_id: PlayerId,
        ready: bool,
    },
    /// Host-only: kick off the first rotation and signal game start.
    StartGameRequest {
        room_code: RoomCode,
        player_id: PlayerId,
    },
    LeaveRoom {
        room_code: RoomCode,
        player_id: PlayerId,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Unicast join ack carrying the registry-assigned player id.
    Joined {
        player_id: PlayerId,
        room_code: RoomCode,
        server_now: String,
    },
    /// Authoritative roster refresh, broadcast on every membership or
    /// score change.
    PlayerUpdate {
        players: Vec<PlayerInfo>,
    },
    /// New round state: installed category with its example set.
    SyncQuestion {
        category: CategoryInfo,
    },
    /// Rotation lock flag; submissions are rejected while `locked` is true.
    SyncStatus {
        locked: bool,
    },
    /// Broadcast acceptance of a word.
    NewWord {
        word: String,
        username: String,
    },
    /// Unicast rejection. `kind` is the machine-readable discriminant:
    /// only a wrong guess carries a penalty, so clients must be able to
    /// tell it apart from a duplicate or a locked round.
    WordError {
        kind: WordErrorKind,
        reason: String,
    },
    StartGameSignal,
    Error {
        code: String,
        msg: String,
    },
}

/// Why a submission was rejected.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WordErrorKind {
    /// Already accepted this round; no penalty.
    Duplicate,
    /// Genuine wrong guess; costs the submitter integrity.
    Wrong,
    /// Round is rotating.
    Locked,
    /// Judgement resolved after the round rotated away.
    Stale,
}

/// Public roster entry. Carries the player id so clients can reconcile
/// their own entry even when display names collide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub name: String,
    pub status: PlayerStatus,
    pub score: u64,
    pub streak: u32,
}

impl From<&Player> for PlayerInfo {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            status: p.status.clone(),
            score: p.score,
            streak: p.streak,
        }
    }
}

/// Wire form of a category; examples travel as a plain list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryInfo {
    pub text: String,
    pub examples: Vec<String>,
    pub color: String,
}

impl From<&Category> for CategoryInfo {
    fn from(c: &Category) -> Self {
        let mut examples: Vec<String> = c.examples.iter().cloned().collect();
        examples.sort();
        Self {
            text: c.name.clone(),
            examples,
            color: c.color.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_message_wire_format() {
        let json = r#"{"t":"join_room","room_code":"ABCD","username":"P1"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::JoinRoom { ref room_code, ref username }
                if room_code == "ABCD" && username == "P1"
        ));
    }

    #[test]
    fn server_message_tags_with_t() {
        let msg = ServerMessage::SyncStatus { locked: true };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""t":"sync_status""#));
    }

    #[test]
    fn word_error_kind_travels_snake_case() {
        let msg = ServerMessage::WordError {
            kind: WordErrorKind::Wrong,
            reason: "Invalid word for this category.".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""kind":"wrong""#));
    }
}
