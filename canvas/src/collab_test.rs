use serde_json::json;

use super::*;

#[test]
fn throttle_passes_leading_call_and_drops_the_rest_of_the_window() {
    let mut t = Throttle::new(100.0);
    assert!(t.ready(0.0));
    assert!(!t.ready(40.0));
    assert!(!t.ready(99.9));
    assert!(t.ready(100.0));
    assert!(!t.ready(150.0));
}

#[test]
fn throttle_reset_opens_immediately() {
    let mut t = Throttle::new(50.0);
    assert!(t.ready(10.0));
    t.reset();
    assert!(t.ready(11.0));
}

#[test]
fn stale_cursors_are_evicted() {
    let mut r = RemoteState::default();
    r.move_cursor("u1", Some("Ada".into()), Point::new(1.0, 2.0), 0.0);
    r.move_cursor("u2", None, Point::new(3.0, 4.0), 3000.0);
    assert!(r.evict_stale(5000.0));
    assert_eq!(r.cursors.keys().collect::<Vec<_>>(), vec!["u2"]);
    assert!(!r.evict_stale(7999.0));
}

#[test]
fn stroke_lifecycle() {
    let mut r = RemoteState::default();
    assert!(r.stroke_start(&json!({"id": "s1", "type": "pencil", "x": 0, "y": 0, "points": [{"x": 0, "y": 0}]})));
    assert!(r.stroke_update("s1", &[Point::new(0.0, 0.0), Point::new(5.0, 5.0)]));
    let Some(Shape::Pencil(p)) = r.strokes.get("s1").map(|e| &e.shape) else {
        panic!("stroke missing");
    };
    assert_eq!(p.points.len(), 2);
    assert!(r.stroke_end("s1"));
    assert!(r.strokes.is_empty());
}

#[test]
fn updates_for_unknown_strokes_are_ignored() {
    let mut r = RemoteState::default();
    assert!(!r.stroke_update("nope", &[]));
    assert!(!r.highlight_update("nope", &[]));
    assert!(!r.stroke_end("nope"));
}

#[test]
fn non_pencil_stroke_start_is_rejected() {
    let mut r = RemoteState::default();
    assert!(!r.stroke_start(&json!({"id": "r", "type": "rectangle", "x": 0, "y": 0, "width": 1, "height": 1})));
    assert!(!r.highlight_start(&json!({"nonsense": true})));
}

#[test]
fn highlights_persist_until_cleared() {
    let mut r = RemoteState::default();
    r.highlight_start(&json!({"id": "h", "type": "pencil", "x": 0, "y": 0, "isHighlighter": true}));
    assert_eq!(r.highlights.len(), 1);
    r.clear_highlights();
    assert!(r.highlights.is_empty());
}
