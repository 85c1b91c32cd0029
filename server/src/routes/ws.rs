//! WebSocket handler: room-scoped message relay.
//!
//! DESIGN
//! ======
//! On upgrade, the ticket is exchanged for a user id and the connection enters
//! a `select!` loop over three sources:
//! - Incoming client text: parse + dispatch by message type
//! - Outbound messages queued by room peers: forward to client
//! - Heartbeat ticks: ping, or reap a connection that missed a pong
//!
//! Each inbound message is handled to completion, persistence included,
//! before the next one is read, so a single sender's messages are relayed in
//! order.
//!
//! AUTHORIZATION
//! =============
//! Every room-scoped message must name the room the connection has joined.
//! Anything else is dropped without a reply, so a connection learns nothing
//! about rooms it is not in.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade with `?ticket=` -> 401 if refused, 500 if the validator is down
//! 2. `join_room` -> status + `joined_room`
//! 3. Room messages -> relay to peers and persist
//! 4. Close or reap -> leave the room

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use protocol::{Message, ProtocolError};
use tokio::sync::mpsc;
use tokio::time::{Instant, interval_at};
use tracing::{debug, error, info, warn};

use crate::error::ErrorCode;
use crate::services::heartbeat::{Beat, Heartbeat};
use crate::services::room;
use crate::services::store::StoreError;
use crate::services::ticket::TicketError;
use crate::state::{AppState, Connection, OUTBOUND_CAPACITY};

/// Shown to the importing user when a bulk replace could not be stored.
pub const IMPORT_FAILED_MESSAGE: &str = "There was a problem saving the imported canvas. Please try again.";

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(ticket) = params.get("ticket") else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    let user_id = match state.tickets.validate(ticket).await {
        Ok(uid) => uid,
        Err(e @ TicketError::Unavailable(_)) => {
            error!(code = e.error_code(), error = %e, "ws: ticket validation failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        Err(e) => {
            info!(code = e.error_code(), "ws: ticket refused");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };

    ws.on_upgrade(move |socket| run_ws(socket, state, user_id))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, user_id: String) {
    // Per-connection channel for messages queued by room peers.
    let (tx, mut rx) = mpsc::channel::<Message>(OUTBOUND_CAPACITY);
    let mut conn = Connection::new(user_id, tx);

    let period = state.config.heartbeat_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    let mut heartbeat = Heartbeat::new();

    info!(connection_id = %conn.id, user_id = %conn.user_id, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    WsMessage::Text(text) => process_inbound_text(&state, &mut conn, text.as_str()).await,
                    WsMessage::Pong(_) => heartbeat.pong(),
                    WsMessage::Close(_) => break,
                    _ => {}
                }
            }
            Some(outbound) = rx.recv() => {
                if send_message(&mut socket, &outbound).await.is_err() {
                    break;
                }
            }
            _ = ticker.tick() => match heartbeat.tick() {
                Beat::Reap => {
                    info!(connection_id = %conn.id, "ws: reaping unresponsive connection");
                    break;
                }
                Beat::Ping => {
                    if socket.send(WsMessage::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            },
        }
    }

    room::handle_disconnect(&state, &mut conn).await;
}

async fn send_message(socket: &mut WebSocket, message: &Message) -> Result<(), ()> {
    let text = match message.encode() {
        Ok(text) => text,
        Err(e) => {
            // An unencodable message is skipped; the socket itself is fine.
            warn!(kind = message.kind(), error = %e, "ws: failed to encode outbound message");
            return Ok(());
        }
    };
    socket.send(WsMessage::Text(text.into())).await.map_err(|_| ())
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Parse and handle one inbound text frame.
///
/// Kept separate from the socket loop so tests can drive dispatch with plain
/// channels standing in for sockets. Nothing here is fatal to the connection.
pub(crate) async fn process_inbound_text(state: &AppState, conn: &mut Connection, text: &str) {
    let message = match protocol::parse(text) {
        Ok(message) => message,
        Err(e @ ProtocolError::Malformed(_)) => {
            warn!(connection_id = %conn.id, error = %e, "ws: malformed inbound message");
            return;
        }
        Err(e @ (ProtocolError::MissingType | ProtocolError::UnknownType(_))) => {
            info!(connection_id = %conn.id, error = %e, "ws: unknown message type ignored");
            return;
        }
        Err(e @ ProtocolError::Invalid { .. }) => {
            debug!(connection_id = %conn.id, error = %e, "ws: invalid message dropped");
            return;
        }
    };

    match message {
        Message::JoinRoom { room_id } => room::join_room(state, conn, &room_id).await,
        Message::LeaveRoom { room_id } => room::leave_room(state, conn, &room_id).await,
        message => {
            let kind = message.kind();
            let Some(room_id) = message.room_id().map(str::to_owned) else {
                debug!(connection_id = %conn.id, kind, "ws: server-only message from client dropped");
                return;
            };
            if !conn.is_in(&room_id) {
                debug!(connection_id = %conn.id, kind, room_id = %room_id, current = ?conn.room, "ws: room mismatch, dropped");
                return;
            }
            handle_room_message(state, conn, &room_id, message).await;
        }
    }
}

/// Handle a message already authorized for `room_id`.
async fn handle_room_message(state: &AppState, conn: &Connection, room_id: &str, message: Message) {
    let kind = message.kind();
    match &message {
        Message::Chat { message: text, .. } => {
            if let Err(e) = state.store.save_chat(room_id, &conn.user_id, text).await {
                log_store_error(conn, room_id, kind, &e);
                return;
            }
            let relay = Message::Chat {
                room_id: room_id.to_owned(),
                message: text.clone(),
                user_id: Some(conn.user_id.clone()),
            };
            room::broadcast(state, room_id, &relay, Some(conn.id)).await;
        }
        Message::UpdateElements { message: elements, .. } => match state.store.replace_all(room_id, elements).await {
            Ok(()) => {
                info!(connection_id = %conn.id, room_id, count = elements.len(), "ws: room elements replaced");
                let updated = Message::ElementsUpdated {
                    room_id: room_id.to_owned(),
                    user_id: Some(conn.user_id.clone()),
                    message: elements.clone(),
                };
                room::broadcast(state, room_id, &updated, None).await;
            }
            Err(e) => {
                log_store_error(conn, room_id, kind, &e);
                conn.send(Message::ImportFailed { message: IMPORT_FAILED_MESSAGE.into() });
            }
        },
        Message::ElementCreate { element, .. } => {
            room::broadcast(state, room_id, &message, Some(conn.id)).await;
            if let Err(e) = state.store.create(room_id, element).await {
                log_store_error(conn, room_id, kind, &e);
            }
        }
        Message::ElementsUpdate { elements, .. } => {
            room::broadcast(state, room_id, &message, Some(conn.id)).await;
            if let Err(e) = state.store.upsert_many(room_id, elements).await {
                log_store_error(conn, room_id, kind, &e);
            }
        }
        Message::ElementsDelete { element_ids, .. } => {
            room::broadcast(state, room_id, &message, Some(conn.id)).await;
            if let Err(e) = state.store.delete_many(room_id, element_ids).await {
                log_store_error(conn, room_id, kind, &e);
            }
        }
        presence if presence.is_ephemeral() => relay_presence(state, conn, room_id, presence).await,
        Message::ClearCanvas { .. } => {
            let cleared = Message::CanvasCleared { room_id: room_id.to_owned() };
            room::broadcast(state, room_id, &cleared, Some(conn.id)).await;
            match state.store.delete_all(room_id).await {
                Ok(removed) => info!(connection_id = %conn.id, room_id, removed, "ws: canvas cleared"),
                Err(e) => log_store_error(conn, room_id, kind, &e),
            }
        }
        _ => debug!(connection_id = %conn.id, kind, "ws: server-only message from client dropped"),
    }
}

/// Relay a presence message to the room's other connections. Nothing is stored.
async fn relay_presence(state: &AppState, conn: &Connection, room_id: &str, message: &Message) {
    if let Message::CursorMove { user_name, x, y, .. } = message {
        let stamped = Message::CursorMove {
            room_id: room_id.to_owned(),
            user_id: Some(conn.user_id.clone()),
            user_name: user_name.clone(),
            x: *x,
            y: *y,
        };
        room::broadcast(state, room_id, &stamped, Some(conn.id)).await;
        return;
    }
    room::broadcast(state, room_id, message, Some(conn.id)).await;
}

fn log_store_error(conn: &Connection, room_id: &str, kind: &str, err: &StoreError) {
    error!(
        connection_id = %conn.id,
        room_id,
        kind,
        code = err.error_code(),
        retryable = err.retryable(),
        error = %err,
        "ws: persistence failed"
    );
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
