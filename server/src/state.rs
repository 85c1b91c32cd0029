//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the element store, the ticket validator and the room membership map:
//! room id -> user id -> connection id -> outbound channel. A user may have
//! several connections (tabs) in one room; each connection belongs to at most
//! one room at a time.
//!
//! Every connection owns a bounded mpsc channel. Its socket task drains the
//! channel into the websocket, so broadcasting never awaits a slow peer.

use std::collections::HashMap;
use std::sync::Arc;

use protocol::{Message, RoomId};
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::config::Config;
use crate::services::store::ElementStore;
use crate::services::ticket::{DevTickets, TicketValidator};

/// Outbound queue depth per connection. Messages beyond it are dropped for that peer.
pub const OUTBOUND_CAPACITY: usize = 256;

pub type ConnectionId = Uuid;
pub type UserId = String;

/// Connections of one room, grouped by user.
pub type RoomMembers = HashMap<UserId, HashMap<ConnectionId, mpsc::Sender<Message>>>;

// =============================================================================
// CONNECTION
// =============================================================================

/// Per-socket state owned by the connection task.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    /// Authoritative user id from the ticket exchange.
    pub user_id: UserId,
    pub tx: mpsc::Sender<Message>,
    /// The room this connection has joined, if any.
    pub room: Option<RoomId>,
}

impl Connection {
    #[must_use]
    pub fn new(user_id: impl Into<UserId>, tx: mpsc::Sender<Message>) -> Self {
        Self { id: Uuid::new_v4(), user_id: user_id.into(), tx, room: None }
    }

    /// Queue a message for this connection only. Returns false if it was dropped.
    pub fn send(&self, message: Message) -> bool {
        self.tx.try_send(message).is_ok()
    }

    #[must_use]
    pub fn is_in(&self, room_id: &str) -> bool {
        self.room.as_deref() == Some(room_id)
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ElementStore>,
    pub rooms: Arc<RwLock<HashMap<RoomId, RoomMembers>>>,
    pub tickets: Arc<dyn TicketValidator>,
    /// Present when `DEV_TICKETS` is enabled; also installed as `tickets`.
    pub dev_tickets: Option<Arc<DevTickets>>,
    pub config: Arc<Config>,
}

impl AppState {
    #[must_use]
    pub fn new(
        store: Arc<dyn ElementStore>,
        tickets: Arc<dyn TicketValidator>,
        dev_tickets: Option<Arc<DevTickets>>,
        config: Config,
    ) -> Self {
        Self { store, rooms: Arc::new(RwLock::new(HashMap::new())), tickets, dev_tickets, config: Arc::new(config) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connection_send_queues_to_its_own_channel() {
        let (conn, mut rx) = test_helpers::test_connection("u1");
        assert!(conn.send(Message::status("hi")));
        assert_eq!(rx.recv().await, Some(Message::status("hi")));
    }

    #[test]
    fn connection_room_membership() {
        let (mut conn, _rx) = test_helpers::test_connection("u1");
        assert!(!conn.is_in("R"));
        conn.room = Some("R".into());
        assert!(conn.is_in("R"));
        assert!(!conn.is_in("S"));
    }

    #[tokio::test]
    async fn new_state_has_no_rooms() {
        let state = test_helpers::test_app_state();
        assert!(state.rooms.read().await.is_empty());
        assert!(state.dev_tickets.is_some());
    }

    #[test]
    fn connection_ids_are_unique() {
        let (a, _ra) = test_helpers::test_connection("u1");
        let (b, _rb) = test_helpers::test_connection("u1");
        assert_ne!(a.id, b.id);
    }
}
