use serde_json::json;

use super::*;
use crate::geometry::Point;

fn session() -> Session {
    Session::new("R", "u1", "Ada")
}

#[test]
fn join_and_leave_name_the_room() {
    let s = session();
    assert_eq!(s.join_message(), Message::JoinRoom { room_id: "R".into() });
    assert_eq!(s.leave_message(), Message::LeaveRoom { room_id: "R".into() });
}

#[test]
fn accepts_own_room_and_roomless_messages() {
    let s = session();
    assert!(s.accepts(&Message::CanvasCleared { room_id: "R".into() }));
    assert!(!s.accepts(&Message::CanvasCleared { room_id: "other".into() }));
    assert!(s.accepts(&Message::ImportFailed { message: "nope".into() }));
    assert!(s.accepts(&Message::status("hello")));
}

#[test]
fn created_elements_are_rounded() {
    let mut s = session();
    let el = Element::rectangle("e1", 10.123_456, 20.0, 30.009, 40.0);
    let Some(Message::ElementCreate { room_id, element }) = s.outbound(&Action::ElementCreated(el), 0.0) else {
        panic!("expected element-create");
    };
    assert_eq!(room_id, "R");
    assert_eq!(element["x"], json!(10.12));
    assert_eq!(element["width"], json!(30.01));
}

#[test]
fn patches_are_rounded() {
    let mut s = session();
    let action = Action::ElementsUpdated(vec![json!({"id": "a", "x": 1.005_1})]);
    let Some(Message::ElementsUpdate { elements, .. }) = s.outbound(&action, 0.0) else {
        panic!("expected elements-update");
    };
    assert_eq!(elements, vec![json!({"id": "a", "x": 1.01})]);
}

#[test]
fn cursor_moves_are_throttled_and_stamped() {
    let mut s = session();
    let at = Action::CursorMoved(Point::new(1.0, 2.0));
    let first = s.outbound(&at, 1000.0);
    assert_eq!(
        first,
        Some(Message::CursorMove {
            room_id: "R".into(),
            user_id: Some("u1".into()),
            user_name: Some("Ada".into()),
            x: 1.0,
            y: 2.0,
        })
    );
    assert!(s.outbound(&at, 1050.0).is_none());
    assert!(s.outbound(&at, 1100.0).is_some());
}

#[test]
fn stroke_updates_throttle_but_ends_always_go_out() {
    let mut s = session();
    let update = Action::StrokeUpdated { stroke_id: "p".into(), points: vec![Point::new(0.0, 0.0)] };
    assert!(s.outbound(&update, 0.0).is_some());
    assert!(s.outbound(&update, 10.0).is_none());
    let end = Action::StrokeEnded { stroke_id: "p".into(), points: Vec::new() };
    assert!(s.outbound(&end, 11.0).is_some());
}

#[test]
fn a_new_stroke_opens_a_fresh_window() {
    let mut s = session();
    let update = Action::StrokeUpdated { stroke_id: "p".into(), points: Vec::new() };
    assert!(s.outbound(&update, 0.0).is_some());
    let start = Action::StrokeStarted(Element::pencil("q", vec![Point::new(0.0, 0.0)]));
    assert!(matches!(s.outbound(&start, 5.0), Some(Message::StrokeStart { .. })));
    assert!(s.outbound(&update, 6.0).is_some());
}

#[test]
fn local_only_actions_send_nothing() {
    let mut s = session();
    assert!(s.outbound(&Action::RenderNeeded, 0.0).is_none());
    assert!(s.outbound(&Action::SetCursor("grab".into()), 0.0).is_none());
    assert!(s.outbound(&Action::Notice("x".into()), 0.0).is_none());
}

#[test]
fn bulk_replace_becomes_update_elements() {
    let mut s = session();
    let action = Action::ElementsReplaced(vec![Element::circle("c", 0.0, 0.0, 5.0)]);
    let Some(Message::UpdateElements { message, .. }) = s.outbound(&action, 0.0) else {
        panic!("expected update-elements");
    };
    assert_eq!(message.len(), 1);
    assert_eq!(message[0]["id"], json!("c"));
}
