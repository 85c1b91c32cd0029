//! Element bounds: local boxes, rotation-aware world boxes, selection unions
//! and rubber-band intersection.

use crate::element::{Element, Shape};
use crate::geometry::{Point, Rect, normalize_rect, quadratic_bounds, rotate_point};
use crate::text::{TextMeasure, measure_text};

/// Unrotated box of an element in its own frame.
///
/// Rotation is applied about this box's center. Wires have no box of their
/// own (their endpoints belong to other elements) and report a zero-size box
/// at their recorded origin.
#[must_use]
pub fn local_bounds(el: &Element, measure: &dyn TextMeasure) -> Rect {
    match &el.shape {
        Shape::Rectangle(b) | Shape::Diamond(b) => normalize_rect(el.x, el.y, b.width, b.height),
        Shape::Circle(c) => Rect::new(el.x - c.radius, el.y - c.radius, c.radius * 2.0, c.radius * 2.0),
        Shape::Line(l) | Shape::Arrow(l) => {
            let p0 = Point::new(el.x, el.y);
            let p2 = Point::new(l.x2, l.y2);
            match l.control_point() {
                Some(p1) => quadratic_bounds(p0, p1, p2),
                None => normalize_rect(el.x, el.y, l.x2 - el.x, l.y2 - el.y),
            }
        }
        Shape::Text(t) => {
            let (w, h) = measure_text(measure, &t.text, t.font_size, &t.font_family);
            Rect::new(el.x, el.y, w, h)
        }
        Shape::Pencil(p) => Rect::from_points(&p.points).unwrap_or(Rect::new(el.x, el.y, 0.0, 0.0)),
        Shape::Annotation(a) => normalize_rect(el.x, el.y, a.width, a.height),
        Shape::Wire(_) => Rect::new(el.x, el.y, 0.0, 0.0),
    }
}

/// The point rotation is applied around.
#[must_use]
pub fn element_center(el: &Element, measure: &dyn TextMeasure) -> Point {
    local_bounds(el, measure).center()
}

/// Axis-aligned world-space box, accounting for rotation.
///
/// Rotated elements rotate the four corners of their local box and take the
/// extremes. Circles ignore rotation.
#[must_use]
pub fn element_bounds(el: &Element, measure: &dyn TextMeasure) -> Rect {
    let local = local_bounds(el, measure);
    let angle = el.rotation_rad();
    if angle == 0.0 || matches!(el.shape, Shape::Circle(_)) {
        return local;
    }
    let center = local.center();
    let corners = local.corners().map(|c| rotate_point(c, center, angle));
    Rect::from_points(&corners).unwrap_or(local)
}

/// Union of the bounds of every element; a zero rectangle when empty.
#[must_use]
pub fn combined_bounds<'a>(elements: impl IntoIterator<Item = &'a Element>, measure: &dyn TextMeasure) -> Rect {
    elements
        .into_iter()
        .map(|el| element_bounds(el, measure))
        .reduce(|acc, r| acc.union(&r))
        .unwrap_or_default()
}

/// Whether an element overlaps a selection rectangle.
///
/// Circles use the exact circle/rectangle distance; every other kind,
/// diamonds included, uses box overlap. Wires are never rubber-band selected.
#[must_use]
pub fn intersects_rect(el: &Element, rect: &Rect, measure: &dyn TextMeasure) -> bool {
    match &el.shape {
        Shape::Circle(c) => {
            let r = normalize_rect(rect.x, rect.y, rect.width, rect.height);
            let nearest_x = el.x.clamp(r.x, r.right());
            let nearest_y = el.y.clamp(r.y, r.bottom());
            let dx = el.x - nearest_x;
            let dy = el.y - nearest_y;
            dx * dx + dy * dy < c.radius * c.radius
        }
        Shape::Wire(_) => false,
        _ => {
            let r = normalize_rect(rect.x, rect.y, rect.width, rect.height);
            element_bounds(el, measure).intersects(&r)
        }
    }
}

#[cfg(test)]
#[path = "bounds_test.rs"]
mod bounds_test;
