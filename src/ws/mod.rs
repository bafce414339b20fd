pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::sync::broadcast::error::RecvError;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::{AppState, JoinAck};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

type WsSender = SplitSink<WebSocket, Message>;
type WsReceiver = SplitStream<WebSocket>;

async fn send(sender: &mut WsSender, msg: &ServerMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize server message: {}", e);
            true
        }
    }
}

/// Handle an individual WebSocket connection.
///
/// The first accepted message must be `join_room`; everything before that
/// is rejected with an error. Dropping the socket removes the player from
/// their room.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // Join handshake: read until a join_room lands in a room or the
    // socket goes away.
    let (room_code, ack) = loop {
        let text = match receiver.next().await {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) | None => return,
            Some(Ok(Message::Ping(data))) => {
                if sender.send(Message::Pong(data)).await.is_err() {
                    return;
                }
                continue;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                tracing::error!("WebSocket error before join: {}", e);
                return;
            }
        };

        let error = match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::JoinRoom {
                room_code,
                username,
            }) => {
                let room_code = room_code.trim().to_uppercase();
                match state.join(&room_code, &username).await {
                    Ok(ack) => break (room_code, ack),
                    Err(e) => ServerMessage::Error {
                        code: e.code().to_string(),
                        msg: e.to_string(),
                    },
                }
            }
            Ok(_) => ServerMessage::Error {
                code: "NOT_JOINED".to_string(),
                msg: "Join a room before sending commands".to_string(),
            },
            Err(e) => {
                tracing::debug!("Unparseable message before join: {}", e);
                ServerMessage::Error {
                    code: "PARSE_ERROR".to_string(),
                    msg: format!("Invalid message format: {}", e),
                }
            }
        };

        if !send(&mut sender, &error).await {
            return;
        }
    };

    let player_id = ack.player_id.clone();
    tracing::info!(room = %room_code, player = %player_id, "player connected");

    run_session(&mut sender, &mut receiver, &state, &room_code, ack).await;

    if let Err(e) = state.leave(&room_code, &player_id).await {
        tracing::debug!(room = %room_code, "leave after disconnect: {}", e);
    }
    tracing::info!(room = %room_code, player = %player_id, "player disconnected");
}

/// Post-join connection loop: fan room broadcasts out to the socket and
/// dispatch client messages into the registry.
async fn run_session(
    sender: &mut WsSender,
    receiver: &mut WsReceiver,
    state: &AppState,
    room_code: &str,
    ack: JoinAck,
) {
    let joined = ServerMessage::Joined {
        player_id: ack.player_id.clone(),
        room_code: room_code.to_string(),
        server_now: chrono::Utc::now().to_rfc3339(),
    };
    if !send(sender, &joined).await {
        return;
    }

    // Late joiner: hand over the round already in progress.
    if let Some(category) = ack.current_category {
        if !send(sender, &ServerMessage::SyncQuestion { category }).await {
            return;
        }
    }

    let mut broadcast_rx = ack.rx;

    loop {
        tokio::select! {
            broadcast_msg = broadcast_rx.recv() => {
                match broadcast_msg {
                    Ok(msg) => {
                        if !send(sender, &msg).await {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!(room = %room_code, skipped = n, "slow consumer lagged behind broadcasts");
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                if let Some(response) =
                                    handlers::handle_message(client_msg, state).await
                                {
                                    if !send(sender, &response).await {
                                        break;
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::error!("Failed to parse client message: {}", e);
                                let error = ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                };
                                if !send(sender, &error).await {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => break,
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }
}
