//! Wire endpoint derivation and path resolution.
//!
//! A wire stores only references: which element and which named handle sits
//! at each end. Its endpoints are recomputed from the referenced elements on
//! every read, so moving or resizing a shape drags its wires along without any
//! wire update being sent.

use crate::consts::WIRE_HIT_SAMPLES;
use crate::element::{Element, HandleType, Shape, WireRouting};
use crate::geometry::{Point, distance_to_line_segment, point_on_cubic, rotate_point, wire_control_points};
use crate::hit::handle_point;
use crate::router::{find_orthogonal_path, wire_obstacles};
use crate::text::TextMeasure;

/// Resolved geometry of a wire.
#[derive(Debug, Clone, PartialEq)]
pub struct WirePath {
    pub start: Point,
    pub end: Point,
    pub kind: WirePathKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WirePathKind {
    /// Cubic Bezier `start → cp1 → cp2 → end`.
    Curve { cp1: Point, cp2: Point },
    /// Axis-aligned polyline, first and last points equal to the endpoints.
    Orthogonal(Vec<Point>),
}

impl WirePath {
    /// Distance from `p` to the wire as drawn: the sampled curve, or the
    /// routed polyline.
    #[must_use]
    pub fn distance_to(&self, p: Point) -> f64 {
        match &self.kind {
            WirePathKind::Curve { cp1, cp2 } => {
                let last = f64::from(WIRE_HIT_SAMPLES - 1);
                let samples: Vec<Point> = (0..WIRE_HIT_SAMPLES)
                    .map(|i| point_on_cubic(f64::from(i) / last, self.start, *cp1, *cp2, self.end))
                    .collect();
                polyline_distance(p, &samples)
            }
            WirePathKind::Orthogonal(points) => polyline_distance(p, points),
        }
    }
}

fn polyline_distance(p: Point, points: &[Point]) -> f64 {
    points
        .windows(2)
        .map(|seg| distance_to_line_segment(p, seg[0], seg[1]))
        .fold(f64::INFINITY, f64::min)
}

fn find<'a>(elements: &'a [Element], id: &str) -> Option<&'a Element> {
    elements.iter().find(|el| el.id == id)
}

/// Current world positions of a wire's two ends.
///
/// `None` when `wire` is not a wire, or a referenced element or handle is
/// missing.
#[must_use]
pub fn wire_endpoints(wire: &Element, elements: &[Element], measure: &dyn TextMeasure) -> Option<(Point, Point)> {
    let Shape::Wire(w) = &wire.shape else {
        return None;
    };
    let start = handle_point(find(elements, &w.start_element_id)?, w.start_handle, measure)?;
    let end = handle_point(find(elements, &w.end_element_id)?, w.end_handle, measure)?;
    Some((start, end))
}

/// Outward direction of a handle in world space, following the owner's rotation.
fn world_normal(owner: &Element, handle: HandleType) -> Point {
    let n = handle.outward_normal();
    let angle = owner.rotation_rad();
    if angle == 0.0 {
        return n;
    }
    rotate_point(n, Point::default(), angle)
}

/// Full drawable geometry of a wire.
#[must_use]
pub fn resolve_wire(wire: &Element, elements: &[Element], measure: &dyn TextMeasure) -> Option<WirePath> {
    let Shape::Wire(w) = &wire.shape else {
        return None;
    };
    let (start, end) = wire_endpoints(wire, elements, measure)?;
    let start_el = find(elements, &w.start_element_id)?;
    let end_el = find(elements, &w.end_element_id)?;

    let kind = match w.routing {
        WireRouting::Curved => {
            let (cp1, cp2) = wire_control_points(
                start,
                world_normal(start_el, w.start_handle),
                end,
                world_normal(end_el, w.end_handle),
            );
            WirePathKind::Curve { cp1, cp2 }
        }
        WireRouting::Orthogonal => {
            let obstacles = wire_obstacles(elements, &w.start_element_id, &w.end_element_id, measure);
            WirePathKind::Orthogonal(find_orthogonal_path(start, end, &obstacles))
        }
    };
    Some(WirePath { start, end, kind })
}

#[cfg(test)]
#[path = "wire_test.rs"]
mod wire_test;
