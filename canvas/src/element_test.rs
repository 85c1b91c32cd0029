#![allow(clippy::float_cmp)]

use serde_json::json;

use super::*;

// =============================================================
// Wire format
// =============================================================

#[test]
fn rectangle_serializes_flat_with_type_tag() {
    let el = Element::rectangle("r1", 10.0, 20.0, 30.0, 40.0);
    let value = to_json(&el).expect("serialize");
    assert_eq!(
        value,
        json!({
            "id": "r1", "type": "rectangle", "x": 10.0, "y": 20.0,
            "width": 30.0, "height": 40.0, "fill": "#e6e6e6"
        })
    );
}

#[test]
fn integer_coordinates_decode_as_floats() {
    let el = from_json(json!({"id": "c", "type": "circle", "x": 5, "y": 6, "radius": 7})).expect("decode");
    assert_eq!(el.x, 5.0);
    assert_eq!(el.shape, Shape::Circle(CircleShape { radius: 7.0 }));
}

#[test]
fn unknown_keys_are_ignored() {
    let el = from_json(json!({
        "id": "a", "type": "annotation", "x": 0, "y": 0,
        "isActivelySelected": true, "authorId": "u", "authorName": "Ada"
    }))
    .expect("decode");
    let Shape::Annotation(a) = el.shape else {
        panic!("expected annotation");
    };
    assert_eq!(a.width, 32.0);
    assert_eq!(a.annotation_state, AnnotationState::Open);
    assert!(a.comments.is_empty());
}

#[test]
fn line_curve_fields_use_original_names() {
    let mut el = Element::arrow("a", 0.0, 0.0, 100.0, 0.0);
    if let Shape::Arrow(line) = &mut el.shape {
        line.cp1x = Some(50.0);
        line.cp1y = Some(40.0);
        line.curve_handle_x = Some(50.0);
        line.curve_handle_y = Some(20.0);
    }
    let value = to_json(&el).expect("serialize");
    assert_eq!(value["cp1x"], json!(50.0));
    assert_eq!(value["curveHandleY"], json!(20.0));
    assert_eq!(value["type"], json!("arrow"));
}

#[test]
fn wire_handles_are_kebab_case_and_routing_defaults_to_curved() {
    let el = from_json(json!({
        "id": "w", "type": "wire", "x": 0, "y": 0,
        "startElementId": "a", "endElementId": "b",
        "startHandle": "bottom-right", "endHandle": "circle-left"
    }))
    .expect("decode");
    let Shape::Wire(w) = &el.shape else {
        panic!("expected wire");
    };
    assert_eq!(w.start_handle, HandleType::BottomRight);
    assert_eq!(w.end_handle, HandleType::CircleLeft);
    assert_eq!(w.routing, WireRouting::Curved);
    assert!(to_json(&el).expect("serialize").get("routing").is_none());
}

#[test]
fn highlighter_flag_is_only_written_when_set() {
    let plain = Element::pencil("p", vec![Point::new(1.0, 1.0)]);
    assert!(to_json(&plain).expect("serialize").get("isHighlighter").is_none());
    let hl = Element::highlighter("h", Point::new(0.0, 0.0));
    let value = to_json(&hl).expect("serialize");
    assert_eq!(value["isHighlighter"], json!(true));
    assert_eq!(value["opacity"], json!(0.6));
}

#[test]
fn text_defaults_font_when_missing() {
    let el = from_json(json!({"id": "t", "type": "text", "x": 1, "y": 2, "text": "hi"})).expect("decode");
    let Shape::Text(t) = el.shape else {
        panic!("expected text");
    };
    assert_eq!(t.font_size, 36.0);
    assert_eq!(t.font_family, "'virgil', sans-serif");
}

#[test]
fn handle_normals_follow_handle_names() {
    assert_eq!(HandleType::BottomRight.outward_normal(), Point::new(1.0, 1.0));
    assert_eq!(HandleType::CircleLeft.outward_normal(), Point::new(-1.0, 0.0));
    assert_eq!(HandleType::Start.outward_normal(), Point::new(0.0, 0.0));
}

#[test]
fn wire_references_either_end() {
    let w = Element::wire("w", Point::default(), ("a", HandleType::TopLeft), ("b", HandleType::End));
    assert!(w.references("a"));
    assert!(w.references("b"));
    assert!(!w.references("c"));
    assert!(!Element::rectangle("a", 0.0, 0.0, 1.0, 1.0).references("a"));
}

// =============================================================
// Patches
// =============================================================

#[test]
fn diff_contains_only_changed_fields() {
    let before = Element::rectangle("r", 0.0, 0.0, 10.0, 10.0);
    let mut after = before.clone();
    after.x = 5.0;
    after.style.stroke = Some("#f00".into());
    let patch = diff(&before, &after).expect("changed");
    assert_eq!(patch, json!({"id": "r", "x": 5.0, "stroke": "#f00"}));
}

#[test]
fn diff_nulls_removed_fields() {
    let mut before = Element::line("l", 0.0, 0.0, 10.0, 0.0);
    if let Shape::Line(line) = &mut before.shape {
        line.cp1x = Some(5.0);
        line.cp1y = Some(5.0);
    }
    let mut after = before.clone();
    if let Shape::Line(line) = &mut after.shape {
        line.reset_curve();
    }
    let patch = diff(&before, &after).expect("changed");
    assert_eq!(patch, json!({"id": "l", "cp1x": null, "cp1y": null}));
}

#[test]
fn diff_of_identical_elements_is_none() {
    let el = Element::circle("c", 1.0, 1.0, 4.0);
    assert!(diff(&el, &el.clone()).is_none());
}

#[test]
fn apply_patch_round_trips_a_diff() {
    let before = Element::diamond("d", 0.0, 0.0, 10.0, 20.0).with_rotation(30.0);
    let mut after = before.clone();
    after.y = -4.0;
    after.rotation = None;
    after.shape = Shape::Diamond(BoxShape { width: 12.0, height: 20.0 });
    let patch = diff(&before, &after).expect("changed");
    assert_eq!(apply_patch(&before, &patch), Some(after));
}

#[test]
fn apply_patch_is_idempotent() {
    let el = Element::rectangle("r", 0.0, 0.0, 10.0, 10.0);
    let patch = json!({"id": "r", "width": 50.0, "fill": null});
    let once = apply_patch(&el, &patch).expect("valid");
    let twice = apply_patch(&once, &patch).expect("valid");
    assert_eq!(once, twice);
    assert_eq!(once.style.fill, None);
}

#[test]
fn apply_patch_never_changes_the_id() {
    let el = Element::rectangle("r", 0.0, 0.0, 10.0, 10.0);
    let next = apply_patch(&el, &json!({"id": "other", "x": 3.0})).expect("valid");
    assert_eq!(next.id, "r");
    assert_eq!(next.x, 3.0);
}

#[test]
fn apply_patch_rejects_invalid_result() {
    let el = Element::rectangle("r", 0.0, 0.0, 10.0, 10.0);
    assert!(apply_patch(&el, &json!({"id": "r", "width": null})).is_none());
    assert!(apply_patch(&el, &json!("not an object")).is_none());
}

// =============================================================
// Rounding and style
// =============================================================

#[test]
fn round_element_rounds_nested_numbers() {
    let el = Element::pencil("p", vec![Point::new(1.23456, 2.0), Point::new(3.0, 4.98765)]);
    let rounded = round_element(&el, 2);
    let Shape::Pencil(p) = rounded.shape else {
        panic!("expected pencil");
    };
    assert_eq!(p.points, vec![Point::new(1.23, 2.0), Point::new(3.0, 4.99)]);
    assert_eq!(rounded.x, 1.23);
}

#[test]
fn round_value_keeps_integers() {
    let mut value = json!({"timestamp": 1_700_000_000_123_i64, "x": 0.125_001});
    round_value(&mut value, 2);
    assert_eq!(value["timestamp"], json!(1_700_000_000_123_i64));
    assert_eq!(value["x"], json!(0.13));
}

#[test]
fn style_overlay_only_sets_present_fields() {
    let mut style = Style { stroke: Some("#000".into()), fill: Some("#fff".into()), ..Style::default() };
    style.overlay(&Style { fill: Some("#0f0".into()), stroke_width: Some(3.0), ..Style::default() });
    assert_eq!(style.stroke.as_deref(), Some("#000"));
    assert_eq!(style.fill.as_deref(), Some("#0f0"));
    assert_eq!(style.stroke_width, Some(3.0));
}
