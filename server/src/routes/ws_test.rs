use super::*;
use crate::services::store::{ChatRow, ElementStore, MemoryStore};
use crate::state::test_helpers::{connections_in, test_app_state_with_store, test_connection};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::time::{Duration, timeout};

async fn recv(rx: &mut mpsc::Receiver<Message>) -> Message {
    timeout(Duration::from_millis(500), rx.recv())
        .await
        .expect("receive timed out")
        .expect("channel closed unexpectedly")
}

async fn assert_empty(rx: &mut mpsc::Receiver<Message>) {
    assert!(
        timeout(Duration::from_millis(50), rx.recv()).await.is_err(),
        "expected no message"
    );
}

fn drain(rx: &mut mpsc::Receiver<Message>) {
    while rx.try_recv().is_ok() {}
}

async fn send(state: &AppState, conn: &mut Connection, value: Value) {
    process_inbound_text(state, conn, &value.to_string()).await;
}

struct Room {
    state: AppState,
    store: Arc<MemoryStore>,
    a: Connection,
    ra: mpsc::Receiver<Message>,
    b: Connection,
    rb: mpsc::Receiver<Message>,
}

/// Users "u1" (a) and "u2" (b) both joined to room "R", confirmations drained.
async fn room_r() -> Room {
    let store = Arc::new(MemoryStore::new());
    let state = test_app_state_with_store(store.clone());
    let (mut a, mut ra) = test_connection("u1");
    let (mut b, mut rb) = test_connection("u2");
    send(&state, &mut a, json!({"type": "join_room", "roomId": "R"})).await;
    send(&state, &mut b, json!({"type": "join_room", "roomId": "R"})).await;
    drain(&mut ra);
    drain(&mut rb);
    Room { state, store, a, ra, b, rb }
}

fn ids(rows: &[crate::services::store::ElementRow]) -> Vec<&str> {
    rows.iter().map(|row| row.id.as_str()).collect()
}

fn rect(id: &str) -> Value {
    json!({"id": id, "type": "rectangle", "x": 10.0, "y": 20.0, "width": 30.0, "height": 40.0, "strokeColor": "#000"})
}

// =============================================================================
// MEMBERSHIP
// =============================================================================

#[tokio::test]
async fn join_room_text_confirms_membership() {
    let store = Arc::new(MemoryStore::new());
    let state = test_app_state_with_store(store);
    let (mut conn, mut rx) = test_connection("u1");

    send(&state, &mut conn, json!({"type": "join_room", "roomId": "R"})).await;

    assert_eq!(recv(&mut rx).await, Message::status("You have joined room R"));
    assert_eq!(recv(&mut rx).await, Message::JoinedRoom { room_id: "R".into() });
    assert_eq!(connections_in(&state, "R").await, 1);
}

#[tokio::test]
async fn after_leave_room_messages_are_dropped() {
    let mut r = room_r().await;
    send(&r.state, &mut r.a, json!({"type": "leave_room", "roomId": "R"})).await;
    assert_eq!(recv(&mut r.ra).await, Message::status("You have left room R"));

    send(&r.state, &mut r.a, json!({"type": "element-create", "roomId": "R", "element": rect("e1")})).await;

    assert_empty(&mut r.rb).await;
    assert!(r.store.list("R").await.unwrap().is_empty());
}

// =============================================================================
// ELEMENT RELAY
// =============================================================================

#[tokio::test]
async fn element_create_reaches_peers_and_storage() {
    let mut r = room_r().await;
    let element = rect("e1");

    send(&r.state, &mut r.a, json!({"type": "element-create", "roomId": "R", "element": element})).await;

    assert_eq!(
        recv(&mut r.rb).await,
        Message::ElementCreate { room_id: "R".into(), element: element.clone() }
    );
    assert_empty(&mut r.ra).await;

    let rows = r.store.list("R").await.unwrap();
    assert_eq!(ids(&rows), vec!["e1"]);
    assert_eq!(rows[0].data, element);
}

#[tokio::test]
async fn element_create_reaches_the_senders_other_tabs() {
    let mut r = room_r().await;
    let (mut tab2, mut rtab2) = test_connection("u1");
    send(&r.state, &mut tab2, json!({"type": "join_room", "roomId": "R"})).await;
    drain(&mut rtab2);

    send(&r.state, &mut r.a, json!({"type": "element-create", "roomId": "R", "element": rect("e1")})).await;

    assert!(matches!(recv(&mut rtab2).await, Message::ElementCreate { .. }));
    assert!(matches!(recv(&mut r.rb).await, Message::ElementCreate { .. }));
    assert_empty(&mut r.ra).await;
}

#[tokio::test]
async fn elements_update_relays_verbatim_and_merges() {
    let mut r = room_r().await;
    r.store.create("R", &rect("e1")).await.unwrap();
    let patch = json!({"id": "e1", "x": 99.5, "strokeColor": null});

    send(&r.state, &mut r.a, json!({"type": "elements-update", "roomId": "R", "elements": [patch]})).await;

    assert_eq!(
        recv(&mut r.rb).await,
        Message::ElementsUpdate { room_id: "R".into(), elements: vec![patch.clone()] }
    );
    let data = &r.store.list("R").await.unwrap()[0].data;
    assert_eq!(data["x"], json!(99.5));
    assert!(data.get("strokeColor").is_none());
    assert_eq!(data["width"], json!(30.0));
}

#[tokio::test]
async fn repeated_elements_update_is_idempotent() {
    let mut r = room_r().await;
    r.store.create("R", &rect("e1")).await.unwrap();
    let update = json!({"type": "elements-update", "roomId": "R", "elements": [{"id": "e1", "y": 5}]});

    send(&r.state, &mut r.a, update.clone()).await;
    let once = r.store.list("R").await.unwrap();
    send(&r.state, &mut r.a, update).await;

    assert_eq!(r.store.list("R").await.unwrap(), once);
}

#[tokio::test]
async fn elements_update_inserts_unknown_ids() {
    let mut r = room_r().await;
    send(&r.state, &mut r.a, json!({"type": "elements-update", "roomId": "R", "elements": [rect("late")]})).await;
    assert_eq!(ids(&r.store.list("R").await.unwrap()), vec!["late"]);
}

#[tokio::test]
async fn elements_delete_relays_and_removes_rows() {
    let mut r = room_r().await;
    for id in ["a", "w", "keep"] {
        r.store.create("R", &rect(id)).await.unwrap();
    }

    send(&r.state, &mut r.a, json!({"type": "elements-delete", "roomId": "R", "elementIds": ["a", "w"]})).await;

    assert_eq!(
        recv(&mut r.rb).await,
        Message::ElementsDelete { room_id: "R".into(), element_ids: vec!["a".into(), "w".into()] }
    );
    assert_eq!(ids(&r.store.list("R").await.unwrap()), vec!["keep"]);
}

// =============================================================================
// BULK REPLACE
// =============================================================================

#[tokio::test]
async fn update_elements_replaces_and_notifies_the_whole_room() {
    let mut r = room_r().await;
    r.store.create("R", &rect("old")).await.unwrap();
    let elements = vec![rect("n1"), rect("n2")];

    send(&r.state, &mut r.a, json!({"type": "update-elements", "roomId": "R", "message": elements})).await;

    let expected = Message::ElementsUpdated {
        room_id: "R".into(),
        user_id: Some("u1".into()),
        message: elements.clone(),
    };
    assert_eq!(recv(&mut r.rb).await, expected);
    assert_eq!(recv(&mut r.ra).await, expected);
    assert_eq!(ids(&r.store.list("R").await.unwrap()), vec!["n1", "n2"]);
}

#[tokio::test]
async fn failed_bulk_replace_tells_only_the_sender() {
    let mut r = room_r().await;
    r.store.create("R", &rect("e1")).await.unwrap();
    let before = r.store.list("R").await.unwrap();

    let bad = json!({"type": "update-elements", "roomId": "R", "message": [rect("n1"), {"type": "rectangle"}]});
    send(&r.state, &mut r.a, bad).await;

    assert_eq!(
        recv(&mut r.ra).await,
        Message::ImportFailed { message: IMPORT_FAILED_MESSAGE.into() }
    );
    assert_empty(&mut r.rb).await;
    assert_eq!(r.store.list("R").await.unwrap(), before);
}

#[tokio::test]
async fn bulk_replace_with_duplicate_ids_fails_atomically() {
    let mut r = room_r().await;
    r.store.create("R", &rect("e1")).await.unwrap();

    let dup = json!({"type": "update-elements", "roomId": "R", "message": [rect("x"), rect("x")]});
    send(&r.state, &mut r.a, dup).await;

    assert!(matches!(recv(&mut r.ra).await, Message::ImportFailed { .. }));
    assert_eq!(ids(&r.store.list("R").await.unwrap()), vec!["e1"]);
}

// =============================================================================
// AUTHORIZATION
// =============================================================================

#[tokio::test]
async fn wrong_room_produces_no_broadcast_and_no_write() {
    let mut r = room_r().await;
    let (mut c, mut rc) = test_connection("u3");
    send(&r.state, &mut c, json!({"type": "join_room", "roomId": "S"})).await;
    drain(&mut rc);

    send(&r.state, &mut r.a, json!({"type": "element-create", "roomId": "S", "element": rect("sneak")})).await;
    send(&r.state, &mut r.a, json!({"type": "clear-canvas", "roomId": "S"})).await;
    send(&r.state, &mut r.a, json!({"type": "update-elements", "roomId": "S", "message": [rect("x")]})).await;

    assert_empty(&mut rc).await;
    assert_empty(&mut r.rb).await;
    assert_empty(&mut r.ra).await;
    assert!(r.store.list("S").await.unwrap().is_empty());
}

#[tokio::test]
async fn connection_without_a_room_is_ignored() {
    let mut r = room_r().await;
    let (mut loner, mut rl) = test_connection("u9");

    send(&r.state, &mut loner, json!({"type": "cursor-move", "roomId": "R", "x": 1, "y": 2})).await;
    send(&r.state, &mut loner, json!({"type": "chat", "roomId": "R", "message": "hi"})).await;

    assert_empty(&mut r.ra).await;
    assert_empty(&mut r.rb).await;
    assert_empty(&mut rl).await;
    assert!(r.store.chats().await.is_empty());
}

// =============================================================================
// EPHEMERAL
// =============================================================================

#[tokio::test]
async fn cursor_move_carries_the_authenticated_user() {
    let mut r = room_r().await;

    send(
        &r.state,
        &mut r.a,
        json!({"type": "cursor-move", "roomId": "R", "userId": "forged", "userName": "Ada", "x": 3.5, "y": -1}),
    )
    .await;

    assert_eq!(
        recv(&mut r.rb).await,
        Message::CursorMove {
            room_id: "R".into(),
            user_id: Some("u1".into()),
            user_name: Some("Ada".into()),
            x: 3.5,
            y: -1.0,
        }
    );
    assert_empty(&mut r.ra).await;
}

#[tokio::test]
async fn strokes_and_highlights_are_relayed_but_never_stored() {
    let mut r = room_r().await;
    let frames = [
        json!({"type": "stroke-start", "roomId": "R", "element": {"id": "p1", "type": "pencil", "points": []}}),
        json!({"type": "stroke-update", "roomId": "R", "strokeId": "p1", "points": [{"x": 1, "y": 2}]}),
        json!({"type": "stroke-end", "roomId": "R", "strokeId": "p1", "points": [{"x": 1, "y": 2}]}),
        json!({"type": "highlight-start", "roomId": "R", "element": {"id": "h1", "type": "highlighter"}}),
        json!({"type": "highlight-end", "roomId": "R", "strokeId": "h1"}),
        json!({"type": "clear-highlights", "roomId": "R"}),
    ];
    for frame in frames {
        send(&r.state, &mut r.a, frame).await;
    }

    let kinds: Vec<&str> = {
        let mut kinds = Vec::new();
        for _ in 0..6 {
            kinds.push(recv(&mut r.rb).await.kind());
        }
        kinds
    };
    assert_eq!(
        kinds,
        vec!["stroke-start", "stroke-update", "stroke-end", "highlight-start", "highlight-end", "clear-highlights"]
    );
    assert!(r.store.list("R").await.unwrap().is_empty());
}

#[tokio::test]
async fn stroke_update_without_stroke_id_is_dropped() {
    let mut r = room_r().await;
    send(&r.state, &mut r.a, json!({"type": "stroke-update", "roomId": "R", "strokeId": "", "points": []})).await;
    assert_empty(&mut r.rb).await;
}

// =============================================================================
// CLEAR / CHAT
// =============================================================================

#[tokio::test]
async fn clear_canvas_empties_the_room_and_tells_peers() {
    let mut r = room_r().await;
    r.store.create("R", &rect("e1")).await.unwrap();

    send(&r.state, &mut r.a, json!({"type": "clear-canvas", "roomId": "R"})).await;

    assert_eq!(recv(&mut r.rb).await, Message::CanvasCleared { room_id: "R".into() });
    assert_empty(&mut r.ra).await;
    assert!(r.store.list("R").await.unwrap().is_empty());
}

#[tokio::test]
async fn chat_is_stored_and_relayed_with_user_id() {
    let mut r = room_r().await;

    send(&r.state, &mut r.a, json!({"type": "chat", "roomId": "R", "message": "hello"})).await;

    assert_eq!(
        recv(&mut r.rb).await,
        Message::Chat { room_id: "R".into(), message: "hello".into(), user_id: Some("u1".into()) }
    );
    assert_empty(&mut r.ra).await;
    assert_eq!(
        r.store.chats().await,
        vec![ChatRow { room_id: "R".into(), user_id: "u1".into(), message: "hello".into() }]
    );
}

// =============================================================================
// ROBUSTNESS
// =============================================================================

#[tokio::test]
async fn bad_input_is_ignored_and_the_connection_keeps_working() {
    let mut r = room_r().await;

    process_inbound_text(&r.state, &mut r.a, "{not json").await;
    send(&r.state, &mut r.a, json!({"type": "teleport", "roomId": "R"})).await;
    send(&r.state, &mut r.a, json!({"roomId": "R"})).await;
    send(&r.state, &mut r.a, json!({"type": "element-create", "roomId": "R"})).await;
    assert_empty(&mut r.rb).await;

    send(&r.state, &mut r.a, json!({"type": "clear-canvas", "roomId": "R"})).await;
    assert_eq!(recv(&mut r.rb).await, Message::CanvasCleared { room_id: "R".into() });
}

#[tokio::test]
async fn server_only_messages_from_clients_are_dropped() {
    let mut r = room_r().await;
    send(&r.state, &mut r.a, json!({"type": "canvas-cleared", "roomId": "R"})).await;
    send(&r.state, &mut r.a, json!({"type": "import-failed", "message": "x"})).await;
    send(&r.state, &mut r.a, json!({"type": "elements-updated", "roomId": "R", "message": []})).await;
    assert_empty(&mut r.rb).await;
    assert_empty(&mut r.ra).await;
}

#[tokio::test]
async fn messages_from_one_sender_arrive_in_order() {
    let mut r = room_r().await;
    for i in 0..5 {
        send(&r.state, &mut r.a, json!({"type": "cursor-move", "roomId": "R", "x": i, "y": 0})).await;
    }
    for i in 0..5 {
        let Message::CursorMove { x, .. } = recv(&mut r.rb).await else {
            panic!("expected cursor-move");
        };
        assert!((x - f64::from(i)).abs() < f64::EPSILON);
    }
}

#[tokio::test]
async fn disconnect_removes_the_connection_from_the_room() {
    let mut r = room_r().await;
    room::handle_disconnect(&r.state, &mut r.b).await;
    assert_eq!(connections_in(&r.state, "R").await, 1);

    send(&r.state, &mut r.a, json!({"type": "clear-canvas", "roomId": "R"})).await;
    assert_empty(&mut r.ra).await;
}
