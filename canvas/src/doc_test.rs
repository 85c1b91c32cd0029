#![allow(clippy::float_cmp)]

use serde_json::json;

use super::*;
use crate::element::HandleType;
use crate::geometry::Point;

fn wired_board() -> DocStore {
    let mut doc = DocStore::new();
    doc.insert(Element::rectangle("a", 0.0, 0.0, 10.0, 10.0));
    doc.insert(Element::rectangle("b", 50.0, 0.0, 10.0, 10.0));
    doc.insert(Element::rectangle("c", 100.0, 0.0, 10.0, 10.0));
    doc.insert(Element::wire("w1", Point::default(), ("a", HandleType::TopRight), ("b", HandleType::TopLeft)));
    doc.insert(Element::wire("w2", Point::default(), ("b", HandleType::TopRight), ("c", HandleType::TopLeft)));
    doc
}

fn ids(doc: &DocStore) -> Vec<&str> {
    doc.elements().iter().map(|e| e.id.as_str()).collect()
}

// =============================================================
// Insert / upsert
// =============================================================

#[test]
fn insert_dedupes_by_id() {
    let mut doc = DocStore::new();
    assert!(doc.insert(Element::rectangle("r", 0.0, 0.0, 10.0, 10.0)));
    assert!(!doc.insert(Element::rectangle("r", 5.0, 5.0, 10.0, 10.0)));
    assert_eq!(doc.len(), 1);
    assert_eq!(doc.get("r").map(|e| e.x), Some(0.0));
}

#[test]
fn upsert_keeps_z_position() {
    let mut doc = wired_board();
    doc.upsert(Element::circle("a", 1.0, 1.0, 3.0));
    assert_eq!(ids(&doc)[0], "a");
    assert!(matches!(doc.get("a").map(|e| &e.shape), Some(crate::element::Shape::Circle(_))));
}

// =============================================================
// Patches
// =============================================================

#[test]
fn patch_merges_fields() {
    let mut doc = wired_board();
    assert!(doc.apply_patch(&json!({"id": "a", "x": 40.0, "stroke": "#f00"})));
    let a = doc.get("a").expect("a");
    assert_eq!(a.x, 40.0);
    assert_eq!(a.style.stroke.as_deref(), Some("#f00"));
}

#[test]
fn same_patch_twice_is_idempotent() {
    let mut doc = wired_board();
    let patch = json!({"id": "b", "width": 99.0, "fill": null});
    doc.apply_patch(&patch);
    let once = doc.snapshot();
    doc.apply_patch(&patch);
    assert_eq!(doc.snapshot(), once);
}

#[test]
fn patch_for_unknown_or_missing_id_is_ignored() {
    let mut doc = wired_board();
    let before = doc.snapshot();
    assert!(!doc.apply_patch(&json!({"id": "nope", "x": 1.0})));
    assert!(!doc.apply_patch(&json!({"x": 1.0})));
    assert_eq!(doc.snapshot(), before);
}

// =============================================================
// Cascade
// =============================================================

#[test]
fn deleting_an_element_removes_its_wires() {
    let mut doc = wired_board();
    let removed = doc.remove_cascade(&["b".to_owned()]);
    assert_eq!(removed, vec!["b", "w1", "w2"]);
    assert_eq!(ids(&doc), vec!["a", "c"]);
}

#[test]
fn cascade_leaves_unrelated_wires() {
    let doc = wired_board();
    assert_eq!(doc.cascade(&["a".to_owned()]), vec!["a", "w1"]);
}

#[test]
fn cascade_does_not_duplicate_wires_already_listed() {
    let doc = wired_board();
    assert_eq!(doc.cascade(&["w1".to_owned(), "a".to_owned()]), vec!["w1", "a"]);
}

#[test]
fn removing_missing_ids_reports_nothing() {
    let mut doc = wired_board();
    assert!(doc.remove_cascade(&["zzz".to_owned()]).is_empty());
    assert_eq!(doc.len(), 5);
}

// =============================================================
// Bulk
// =============================================================

#[test]
fn load_values_skips_undecodable_entries() {
    let mut doc = wired_board();
    doc.load_values(&[
        json!({"id": "ok", "type": "circle", "x": 0, "y": 0, "radius": 4}),
        json!({"id": "bad", "type": "hexagon", "x": 0, "y": 0}),
        json!({"id": "worse"}),
    ]);
    assert_eq!(ids(&doc), vec!["ok"]);
}

#[test]
fn clear_empties_the_store() {
    let mut doc = wired_board();
    doc.clear();
    assert!(doc.is_empty());
}
