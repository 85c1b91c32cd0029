use super::*;
use crate::config::Config;
use crate::services::store::{ElementStore, MemoryStore};
use crate::services::ticket::RejectAll;
use crate::state::test_helpers::{connections_in, test_app_state, test_app_state_with_store};
use axum::Json;
use axum::extract::{Path, State};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::time::{Duration, sleep, timeout};
use tokio_tungstenite::tungstenite::Message as WsFrame;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

// =============================================================================
// HANDLERS
// =============================================================================

#[tokio::test]
async fn healthz_is_ok() {
    assert_eq!(healthz().await, StatusCode::OK);
}

#[tokio::test]
async fn list_elements_returns_rows_in_order() {
    let store = Arc::new(MemoryStore::new());
    store.create("R", &json!({"id": "a", "type": "rectangle"})).await.unwrap();
    store.create("R", &json!({"id": "b", "type": "circle"})).await.unwrap();
    let state = test_app_state_with_store(store);

    let Json(rows) = elements::list_elements(State(state), Path("R".into())).await.unwrap();

    assert_eq!(
        serde_json::to_value(&rows).unwrap(),
        json!([
            {"id": "a", "roomId": "R", "data": {"id": "a", "type": "rectangle"}},
            {"id": "b", "roomId": "R", "data": {"id": "b", "type": "circle"}},
        ])
    );
}

#[tokio::test]
async fn dev_ticket_is_accepted_once_by_the_validator() {
    let state = test_app_state();
    let body = dev::TicketRequest { user_id: "u1".into() };

    let Json(issued) = dev::issue_ticket(State(state.clone()), Json(body)).await.unwrap();

    assert_eq!(state.tickets.validate(&issued.ticket).await.unwrap(), "u1");
    assert!(state.tickets.validate(&issued.ticket).await.is_err());
}

#[tokio::test]
async fn dev_ticket_requires_a_user_id() {
    let state = test_app_state();
    let body = dev::TicketRequest { user_id: "  ".into() };
    let err = dev::issue_ticket(State(state), Json(body)).await.unwrap_err();
    assert_eq!(err, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn dev_ticket_is_not_found_when_disabled() {
    let state = AppState::new(Arc::new(MemoryStore::new()), Arc::new(RejectAll), None, Config::default());
    let body = dev::TicketRequest { user_id: "u1".into() };
    let err = dev::issue_ticket(State(state), Json(body)).await.unwrap_err();
    assert_eq!(err, StatusCode::NOT_FOUND);
}

// =============================================================================
// END TO END
// =============================================================================

async fn spawn_server(state: AppState) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind should succeed");
    let addr = listener.local_addr().expect("local addr");
    let router = app(state);
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    addr
}

async fn connect(addr: SocketAddr, state: &AppState, user_id: &str) -> Client {
    let ticket = state.dev_tickets.as_ref().expect("dev tickets enabled").issue(user_id);
    let (client, _) = connect_async(format!("ws://{addr}/?ticket={ticket}"))
        .await
        .expect("upgrade should succeed");
    client
}

async fn send_json(client: &mut Client, value: Value) {
    client
        .send(WsFrame::Text(value.to_string().into()))
        .await
        .expect("send should succeed");
}

async fn next_json(client: &mut Client) -> Value {
    loop {
        let frame = timeout(Duration::from_secs(2), client.next())
            .await
            .expect("receive timed out")
            .expect("stream ended")
            .expect("websocket error");
        if let WsFrame::Text(text) = frame {
            return serde_json::from_str(text.as_str()).expect("server sent json");
        }
    }
}

async fn join(client: &mut Client, room_id: &str) {
    send_json(client, json!({"type": "join_room", "roomId": room_id})).await;
    assert_eq!(next_json(client).await["type"], "status");
    assert_eq!(next_json(client).await, json!({"type": "joined_room", "roomId": room_id}));
}

#[tokio::test]
async fn created_element_reaches_peer_and_room_read() {
    let state = test_app_state();
    let addr = spawn_server(state.clone()).await;
    let mut a = connect(addr, &state, "u1").await;
    let mut b = connect(addr, &state, "u2").await;
    join(&mut a, "R").await;
    join(&mut b, "R").await;

    let element = json!({"id": "e1", "type": "rectangle", "x": 1.5, "y": 2.0, "width": 30.0, "height": 40.0});
    send_json(&mut a, json!({"type": "element-create", "roomId": "R", "element": element})).await;
    assert_eq!(
        next_json(&mut b).await,
        json!({"type": "element-create", "roomId": "R", "element": element})
    );

    // Chat is stored before it is relayed, so seeing it means the create is stored too.
    send_json(&mut a, json!({"type": "chat", "roomId": "R", "message": "done"})).await;
    assert_eq!(next_json(&mut b).await["type"], "chat");

    let rows: Value = reqwest::get(format!("http://{addr}/api/rooms/R/elements"))
        .await
        .expect("request should succeed")
        .json()
        .await
        .expect("json body");
    assert_eq!(rows, json!([{"id": "e1", "roomId": "R", "data": element}]));
}

#[tokio::test]
async fn upgrade_without_a_valid_ticket_is_refused() {
    let state = test_app_state();
    let addr = spawn_server(state).await;

    assert!(connect_async(format!("ws://{addr}/")).await.is_err());
    assert!(connect_async(format!("ws://{addr}/?ticket=bogus")).await.is_err());
}

#[tokio::test]
async fn ticket_cannot_be_replayed() {
    let state = test_app_state();
    let addr = spawn_server(state.clone()).await;
    let ticket = state.dev_tickets.as_ref().expect("dev tickets enabled").issue("u1");

    assert!(connect_async(format!("ws://{addr}/?ticket={ticket}")).await.is_ok());
    assert!(connect_async(format!("ws://{addr}/?ticket={ticket}")).await.is_err());
}

#[tokio::test]
async fn silent_client_is_reaped_and_leaves_its_room() {
    let mut state = test_app_state();
    state.config = Arc::new(Config { heartbeat_interval: Duration::from_millis(50), ..(*state.config).clone() });
    let addr = spawn_server(state.clone()).await;

    let mut client = connect(addr, &state, "u1").await;
    join(&mut client, "R").await;
    assert_eq!(connections_in(&state, "R").await, 1);

    // Not reading means the client never answers pings.
    sleep(Duration::from_millis(400)).await;
    assert_eq!(connections_in(&state, "R").await, 0);
}
