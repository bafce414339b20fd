//! WebSocket message dispatch
//!
//! Maps parsed client messages onto registry operations and turns their
//! outcomes into the optional unicast reply. State changes visible to the
//! whole room travel over the room broadcast channel, never through the
//! return value here.

use crate::protocol::{ClientMessage, ServerMessage, WordErrorKind};
use crate::state::{AppState, SubmitOutcome};

fn registry_error(e: crate::state::RegistryError) -> ServerMessage {
    ServerMessage::Error {
        code: e.code().to_string(),
        msg: e.to_string(),
    }
}

/// Handle one post-join client message and return the optional unicast
/// response.
pub async fn handle_message(msg: ClientMessage, state: &AppState) -> Option<ServerMessage> {
    match msg {
        // The connection loop performs the join handshake; a second join
        // on the same socket is a protocol violation.
        ClientMessage::JoinRoom { .. } => Some(ServerMessage::Error {
            code: "ALREADY_JOINED".to_string(),
            msg: "This connection already joined a room".to_string(),
        }),

        ClientMessage::SubmitWord {
            room_code,
            player_id,
            word,
        } => match state.submit(&room_code, &player_id, &word).await {
            // Acceptance is announced to the room via new_word broadcast.
            Ok(SubmitOutcome::Accepted { .. }) => None,
            Ok(SubmitOutcome::Duplicate) => Some(ServerMessage::WordError {
                kind: WordErrorKind::Duplicate,
                reason: "Duplicate Data Detected.".to_string(),
            }),
            Ok(SubmitOutcome::Wrong) => Some(ServerMessage::WordError {
                kind: WordErrorKind::Wrong,
                reason: "Invalid word for this category.".to_string(),
            }),
            Ok(SubmitOutcome::Locked) => Some(ServerMessage::WordError {
                kind: WordErrorKind::Locked,
                reason: "Category is rotating. Hold on.".to_string(),
            }),
            Ok(SubmitOutcome::Stale) => Some(ServerMessage::WordError {
                kind: WordErrorKind::Stale,
                reason: "Category rotated before validation finished.".to_string(),
            }),
            Err(e) => Some(registry_error(e)),
        },

        ClientMessage::PlayerReady {
            room_code,
            player_id,
            ready,
        } => match state.set_ready(&room_code, &player_id, ready).await {
            Ok(()) => None,
            Err(e) => Some(registry_error(e)),
        },

        ClientMessage::StartGameRequest {
            room_code,
            player_id,
        } => match state.start_game(&room_code, &player_id).await {
            Ok(()) => None,
            Err(e) => Some(registry_error(e)),
        },

        ClientMessage::LeaveRoom {
            room_code,
            player_id,
        } => match state.leave(&room_code, &player_id).await {
            Ok(()) => None,
            Err(e) => Some(registry_error(e)),
        },
    }
}
