//! Handles and hit-testing.
//!
//! Every test runs in the element's local (unrotated) frame: the query point
//! is rotated by the negative element rotation about the element center, and
//! then compared against unrotated geometry. Handles are likewise listed in
//! local space; [`handle_point`] maps one back into the world.

#[cfg(test)]
#[path = "hit_test.rs"]
mod hit_test;

use crate::bounds::{element_center, local_bounds};
use crate::consts::{
    ARROWHEAD_HIT_RADIUS, CURVE_SAMPLES, HANDLE_HALF, LENIENT_HANDLE_HALF, LINE_HIT_THRESHOLD,
    ROTATION_HANDLE_OFFSET,
};
use crate::element::{Element, Handle, HandleType, Shape};
use crate::geometry::{
    Point, Rect, distance, distance_to_line_segment, midpoint, normalize_rect, point_on_quadratic,
    quadratic_bounds, rotate_point,
};
use crate::text::TextMeasure;
use crate::wire::resolve_wire;

const fn handle(kind: HandleType, x: f64, y: f64) -> Handle {
    Handle { kind, at: Point::new(x, y) }
}

/// Named control points of an element, in local space.
///
/// Diamonds expose their four vertices under the corner names (left, top,
/// right, bottom in that order). Annotations and wires have no handles.
#[must_use]
pub fn handles(el: &Element, measure: &dyn TextMeasure) -> Vec<Handle> {
    match &el.shape {
        Shape::Rectangle(b) => {
            let r = normalize_rect(el.x, el.y, b.width, b.height);
            vec![
                handle(HandleType::TopLeft, r.x, r.y),
                handle(HandleType::TopRight, r.right(), r.y),
                handle(HandleType::BottomLeft, r.x, r.bottom()),
                handle(HandleType::BottomRight, r.right(), r.bottom()),
                handle(HandleType::Rotation, r.x + r.width / 2.0, r.y + ROTATION_HANDLE_OFFSET),
            ]
        }
        Shape::Diamond(b) => {
            let r = normalize_rect(el.x, el.y, b.width, b.height);
            let c = r.center();
            vec![
                handle(HandleType::TopLeft, r.x, c.y),
                handle(HandleType::TopRight, c.x, r.y),
                handle(HandleType::BottomLeft, r.right(), c.y),
                handle(HandleType::BottomRight, c.x, r.bottom()),
                handle(HandleType::Rotation, c.x, r.y + ROTATION_HANDLE_OFFSET),
            ]
        }
        Shape::Line(l) | Shape::Arrow(l) => {
            let start = Point::new(el.x, el.y);
            let end = Point::new(l.x2, l.y2);
            let mid = midpoint(start, end);
            let top = match l.control_point() {
                Some(cp) => {
                    let b = quadratic_bounds(start, cp, end);
                    Point::new(b.x + b.width / 2.0, b.y)
                }
                None => mid,
            };
            let grip = l.curve_handle().unwrap_or(mid);
            vec![
                handle(HandleType::Start, start.x, start.y),
                handle(HandleType::End, end.x, end.y),
                handle(HandleType::Rotation, top.x, top.y + ROTATION_HANDLE_OFFSET),
                handle(HandleType::Curve, grip.x, grip.y),
            ]
        }
        Shape::Circle(c) => vec![
            handle(HandleType::CircleTop, el.x, el.y - c.radius),
            handle(HandleType::CircleBottom, el.x, el.y + c.radius),
            handle(HandleType::CircleLeft, el.x - c.radius, el.y),
            handle(HandleType::CircleRight, el.x + c.radius, el.y),
            handle(HandleType::Rotation, el.x, el.y - c.radius + ROTATION_HANDLE_OFFSET),
        ],
        Shape::Text(_) => {
            let r = local_bounds(el, measure);
            vec![
                handle(HandleType::BottomRight, r.right(), r.bottom()),
                handle(HandleType::Rotation, r.x + r.width / 2.0, r.y + ROTATION_HANDLE_OFFSET),
            ]
        }
        Shape::Pencil(_) => {
            let r = local_bounds(el, measure);
            vec![handle(HandleType::Rotation, r.x + r.width / 2.0, r.y + ROTATION_HANDLE_OFFSET)]
        }
        Shape::Annotation(_) | Shape::Wire(_) => Vec::new(),
    }
}

/// World position of one named handle, or `None` if the element lacks it.
#[must_use]
pub fn handle_point(el: &Element, kind: HandleType, measure: &dyn TextMeasure) -> Option<Point> {
    let local = handles(el, measure).into_iter().find(|h| h.kind == kind)?.at;
    let angle = el.rotation_rad();
    if angle == 0.0 {
        return Some(local);
    }
    Some(rotate_point(local, element_center(el, measure), angle))
}

/// Map a world point into the element's unrotated frame.
pub fn to_local(el: &Element, p: Point, measure: &dyn TextMeasure) -> Point {
    let angle = el.rotation_rad();
    if angle == 0.0 {
        return p;
    }
    rotate_point(p, element_center(el, measure), -angle)
}

/// Which handle of `el` lies under world point `p`, if any.
///
/// Regular handles accept ±7.5 units; rotation and curve grips, and every
/// handle in lenient mode, accept ±12.
#[must_use]
pub fn hit_test_handle(el: &Element, p: Point, lenient: bool, measure: &dyn TextMeasure) -> Option<HandleType> {
    let local = to_local(el, p, measure);
    handles(el, measure).into_iter().find_map(|h| {
        let icon = matches!(h.kind, HandleType::Rotation | HandleType::Curve);
        let half = if lenient || icon { LENIENT_HANDLE_HALF } else { HANDLE_HALF };
        ((local.x - h.at.x).abs() <= half && (local.y - h.at.y).abs() <= half).then_some(h.kind)
    })
}

/// Front-most element under world point `p`.
///
/// Elements later in the slice are on top. `leniency` widens every
/// containment test by that many world units. Wires are skipped unless
/// `include_wires` is set, in which case they are tested along the path
/// they are drawn with.
#[must_use]
pub fn element_at_position<'a>(
    elements: &'a [Element],
    p: Point,
    leniency: f64,
    include_wires: bool,
    measure: &dyn TextMeasure,
) -> Option<&'a Element> {
    elements.iter().rev().find(|el| {
        if el.is_wire() {
            return include_wires && wire_contains(el, elements, p, leniency, measure);
        }
        contains(el, to_local(el, p, measure), leniency, measure)
    })
}

fn contains(el: &Element, local: Point, leniency: f64, measure: &dyn TextMeasure) -> bool {
    match &el.shape {
        Shape::Rectangle(_) | Shape::Annotation(_) | Shape::Text(_) => {
            local_bounds(el, measure).inflate(leniency).contains(local)
        }
        Shape::Circle(c) => distance(local, Point::new(el.x, el.y)) <= c.radius + leniency,
        Shape::Diamond(b) => {
            let r = normalize_rect(el.x, el.y, b.width, b.height);
            let c = r.center();
            let half_w = r.width / 2.0 + leniency;
            let half_h = r.height / 2.0 + leniency;
            half_w > 0.0 && half_h > 0.0 && (local.x - c.x).abs() / half_w + (local.y - c.y).abs() / half_h <= 1.0
        }
        Shape::Line(l) | Shape::Arrow(l) => {
            let start = Point::new(el.x, el.y);
            let end = Point::new(l.x2, l.y2);
            let threshold = LINE_HIT_THRESHOLD + leniency;
            let on_body = match l.control_point() {
                Some(cp) => (0..CURVE_SAMPLES).any(|i| {
                    let t = f64::from(i) / f64::from(CURVE_SAMPLES - 1);
                    distance(point_on_quadratic(t, start, cp, end), local) < threshold
                }),
                None => distance_to_line_segment(local, start, end) < threshold,
            };
            on_body || (matches!(el.shape, Shape::Arrow(_)) && distance(local, end) < ARROWHEAD_HIT_RADIUS + leniency)
        }
        Shape::Pencil(pencil) => {
            let threshold = LINE_HIT_THRESHOLD + leniency;
            let Some(bbox) = Rect::from_points(&pencil.points) else {
                return false;
            };
            bbox.inflate(threshold).contains(local)
                && pencil.points.windows(2).any(|seg| distance_to_line_segment(local, seg[0], seg[1]) < threshold)
        }
        Shape::Wire(_) => false,
    }
}

fn wire_contains(wire: &Element, elements: &[Element], p: Point, leniency: f64, measure: &dyn TextMeasure) -> bool {
    resolve_wire(wire, elements, measure).is_some_and(|path| path.distance_to(p) < LINE_HIT_THRESHOLD + leniency)
}
