//! Room membership and broadcast.
//!
//! DESIGN
//! ======
//! Rooms exist only while they have connections: entries are created lazily on
//! join and pruned as soon as the last connection of a user, and then of the
//! room, leaves. A connection is in at most one room; joining another room
//! leaves the current one first.
//!
//! Broadcast is best-effort: each member's channel is fed with `try_send`, so
//! a full or closed peer never blocks the sender or the rest of the room.

use protocol::Message;
use tracing::{debug, info};

use crate::state::{AppState, Connection, ConnectionId};

/// Add `conn` to `room_id` and confirm with a status line and `joined_room`.
pub async fn join_room(state: &AppState, conn: &mut Connection, room_id: &str) {
    if let Some(current) = conn.room.clone() {
        if current != room_id {
            leave_room(state, conn, &current).await;
        }
    }

    {
        let mut rooms = state.rooms.write().await;
        rooms
            .entry(room_id.to_owned())
            .or_default()
            .entry(conn.user_id.clone())
            .or_default()
            .insert(conn.id, conn.tx.clone());
    }
    conn.room = Some(room_id.to_owned());

    info!(connection_id = %conn.id, user_id = %conn.user_id, room_id, "room: joined");
    conn.send(Message::status(format!("You have joined room {room_id}")));
    conn.send(Message::JoinedRoom { room_id: room_id.to_owned() });
}

/// Remove `conn` from `room_id`. Does nothing unless that is its current room.
pub async fn leave_room(state: &AppState, conn: &mut Connection, room_id: &str) {
    if !conn.is_in(room_id) {
        debug!(connection_id = %conn.id, room_id, "room: leave for a room not joined");
        return;
    }

    remove_member(state, conn, room_id).await;
    conn.room = None;

    info!(connection_id = %conn.id, user_id = %conn.user_id, room_id, "room: left");
    conn.send(Message::status(format!("You have left room {room_id}")));
}

/// Socket-close cleanup: leave whatever room the connection is in.
pub async fn handle_disconnect(state: &AppState, conn: &mut Connection) {
    if let Some(room_id) = conn.room.clone() {
        leave_room(state, conn, &room_id).await;
    }
    info!(connection_id = %conn.id, user_id = %conn.user_id, "room: disconnected");
}

async fn remove_member(state: &AppState, conn: &Connection, room_id: &str) {
    let mut rooms = state.rooms.write().await;
    let Some(members) = rooms.get_mut(room_id) else {
        return;
    };
    if let Some(connections) = members.get_mut(&conn.user_id) {
        connections.remove(&conn.id);
        if connections.is_empty() {
            members.remove(&conn.user_id);
        }
    }
    if members.is_empty() {
        rooms.remove(room_id);
    }
}

/// Send `message` to every connection in `room_id` except `exclude`.
///
/// Returns the number of connections the message was queued for.
pub async fn broadcast(state: &AppState, room_id: &str, message: &Message, exclude: Option<ConnectionId>) -> usize {
    let rooms = state.rooms.read().await;
    let Some(members) = rooms.get(room_id) else {
        return 0;
    };

    let mut delivered = 0;
    for (conn_id, tx) in members.values().flat_map(|connections| connections.iter()) {
        if exclude == Some(*conn_id) {
            continue;
        }
        // Best-effort: if a peer's channel is full, skip it.
        if tx.try_send(message.clone()).is_ok() {
            delivered += 1;
        }
    }
    delivered
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
