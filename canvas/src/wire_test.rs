use super::*;
use crate::text::ApproxTextMeasure;
use crate::transform::move_element;

fn m() -> ApproxTextMeasure {
    ApproxTextMeasure::default()
}

fn close(a: Point, b: Point) -> bool {
    (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
}

fn board() -> Vec<Element> {
    vec![
        Element::rectangle("a", 0.0, 0.0, 100.0, 50.0),
        Element::circle("b", 300.0, 200.0, 40.0),
        Element::wire("w", Point::new(100.0, 50.0), ("a", HandleType::BottomRight), ("b", HandleType::CircleLeft)),
    ]
}

#[test]
fn endpoints_come_from_referenced_handles() {
    let elements = board();
    let (start, end) = wire_endpoints(&elements[2], &elements, &m()).expect("endpoints");
    assert!(close(start, Point::new(100.0, 50.0)));
    assert!(close(end, Point::new(260.0, 200.0)));
}

#[test]
fn moving_an_endpoint_element_moves_the_wire_without_touching_it() {
    let mut elements = board();
    let stored = elements[2].clone();
    move_element(&mut elements[0], 50.0, 0.0);
    let (start, end) = wire_endpoints(&elements[2], &elements, &m()).expect("endpoints");
    assert!(close(start, Point::new(150.0, 50.0)));
    assert!(close(end, Point::new(260.0, 200.0)));
    assert_eq!(elements[2], stored);
}

#[test]
fn missing_reference_yields_no_geometry() {
    let elements = vec![
        Element::rectangle("a", 0.0, 0.0, 10.0, 10.0),
        Element::wire("w", Point::default(), ("a", HandleType::TopLeft), ("gone", HandleType::TopLeft)),
    ];
    assert!(wire_endpoints(&elements[1], &elements, &m()).is_none());
    assert!(resolve_wire(&elements[1], &elements, &m()).is_none());
}

#[test]
fn curved_wire_leaves_along_handle_normals() {
    let elements = vec![
        Element::rectangle("a", 0.0, 0.0, 100.0, 100.0),
        Element::circle("b", 300.0, 50.0, 50.0),
        Element::wire("w", Point::default(), ("a", HandleType::TopRight), ("b", HandleType::CircleLeft)),
    ];
    let path = resolve_wire(&elements[2], &elements, &m()).expect("path");
    assert!(close(path.start, Point::new(100.0, 0.0)));
    let WirePathKind::Curve { cp1, cp2 } = path.kind else {
        panic!("expected curve");
    };
    let tension = crate::geometry::distance(path.start, path.end) * 0.2;
    assert!(close(cp1, Point::new(100.0 + tension, -tension)));
    assert!(close(cp2, Point::new(250.0 - tension, 50.0)));
}

#[test]
fn orthogonal_wire_routes_around_other_elements() {
    let mut elements = vec![
        Element::rectangle("a", 0.0, 0.0, 40.0, 40.0),
        Element::rectangle("block", 150.0, -100.0, 40.0, 200.0),
        Element::rectangle("b", 300.0, 0.0, 40.0, 40.0),
        Element::wire("w", Point::default(), ("a", HandleType::TopRight), ("b", HandleType::TopLeft)),
    ];
    if let Shape::Wire(w) = &mut elements[3].shape {
        w.routing = WireRouting::Orthogonal;
    }
    let path = resolve_wire(&elements[3], &elements, &m()).expect("path");
    let WirePathKind::Orthogonal(points) = path.kind else {
        panic!("expected orthogonal route");
    };
    assert_eq!(points.first(), Some(&Point::new(40.0, 0.0)));
    assert_eq!(points.last(), Some(&Point::new(300.0, 0.0)));
    let blocked = crate::geometry::Rect::new(130.0, -120.0, 80.0, 240.0);
    assert!(points.iter().all(|p| !blocked.contains_strict(*p)));
}
