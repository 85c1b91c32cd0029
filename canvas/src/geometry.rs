//! Pure geometry: rectangles, rotation, segment distance, Bezier curves and
//! path simplification.
//!
//! Nothing here knows about element kinds. Callers pass plain points and
//! receive plain points or rectangles back.

#[cfg(test)]
#[path = "geometry_test.rs"]
mod geometry_test;

pub use protocol::Point;

use crate::consts::CURVE_TENSION;

/// Axis-aligned rectangle. `width` and `height` are non-negative once built
/// through [`normalize_rect`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Smallest rectangle containing every point, or `None` for no points.
    #[must_use]
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in iter {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self::new(min_x, min_y, max_x - min_x, max_y - min_y))
    }

    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// The four corners, clockwise from top-left.
    #[must_use]
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.x, self.y),
            Point::new(self.right(), self.y),
            Point::new(self.right(), self.bottom()),
            Point::new(self.x, self.bottom()),
        ]
    }

    /// Grow by `pad` on every side.
    #[must_use]
    pub fn inflate(&self, pad: f64) -> Self {
        Self::new(self.x - pad, self.y - pad, self.width + 2.0 * pad, self.height + 2.0 * pad)
    }

    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Self::new(x, y, self.right().max(other.right()) - x, self.bottom().max(other.bottom()) - y)
    }

    /// Inclusive containment.
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    /// Containment excluding the boundary.
    #[must_use]
    pub fn contains_strict(&self, p: Point) -> bool {
        p.x > self.x && p.x < self.right() && p.y > self.y && p.y < self.bottom()
    }

    /// Overlap test with strict inequalities: touching edges do not intersect.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.x < other.right() && self.right() > other.x && self.y < other.bottom() && self.bottom() > other.y
    }
}

/// Rectangle with non-negative extent from a possibly inverted box.
///
/// Resize handles can drive width or height negative mid-drag; this swaps the
/// origin so every consumer sees a well-formed rectangle.
#[must_use]
pub fn normalize_rect(x: f64, y: f64, width: f64, height: f64) -> Rect {
    let (nx, nw) = if width < 0.0 { (x + width, -width) } else { (x, width) };
    let (ny, nh) = if height < 0.0 { (y + height, -height) } else { (y, height) };
    Rect::new(nx, ny, nw, nh)
}

/// Rotate `point` about `center` by `angle` radians (clockwise on a y-down canvas).
#[must_use]
pub fn rotate_point(point: Point, center: Point, angle: f64) -> Point {
    let (sin, cos) = angle.sin_cos();
    let dx = point.x - center.x;
    let dy = point.y - center.y;
    Point::new(center.x + dx * cos - dy * sin, center.y + dx * sin + dy * cos)
}

#[must_use]
pub fn distance(a: Point, b: Point) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

#[must_use]
pub fn midpoint(a: Point, b: Point) -> Point {
    Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
}

/// Minimum distance from `p` to the segment `[a, b]`.
#[must_use]
pub fn distance_to_line_segment(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return distance(p, a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    distance(p, Point::new(a.x + t * dx, a.y + t * dy))
}

// =============================================================
// Bezier curves
// =============================================================

/// Point at parameter `t` on the quadratic curve `p0 → p1 → p2`.
#[must_use]
pub fn point_on_quadratic(t: f64, p0: Point, p1: Point, p2: Point) -> Point {
    let u = 1.0 - t;
    Point::new(
        u * u * p0.x + 2.0 * u * t * p1.x + t * t * p2.x,
        u * u * p0.y + 2.0 * u * t * p1.y + t * t * p2.y,
    )
}

/// Tight bounding box of a quadratic curve using its analytic extrema.
#[must_use]
pub fn quadratic_bounds(p0: Point, p1: Point, p2: Point) -> Rect {
    let mut points = vec![p0, p2];
    for t in [quadratic_extremum(p0.x, p1.x, p2.x), quadratic_extremum(p0.y, p1.y, p2.y)]
        .into_iter()
        .flatten()
    {
        points.push(point_on_quadratic(t, p0, p1, p2));
    }
    Rect::from_points(&points).unwrap_or_default()
}

/// Parameter of the axis extremum strictly inside `(0, 1)`, if any.
fn quadratic_extremum(a: f64, b: f64, c: f64) -> Option<f64> {
    let denom = a - 2.0 * b + c;
    if denom.abs() < f64::EPSILON {
        return None;
    }
    let t = (a - b) / denom;
    (t > 0.0 && t < 1.0).then_some(t)
}

/// Point at parameter `t` on the cubic curve `p0 → p1 → p2 → p3`.
#[must_use]
pub fn point_on_cubic(t: f64, p0: Point, p1: Point, p2: Point, p3: Point) -> Point {
    let u = 1.0 - t;
    let a = u * u * u;
    let b = 3.0 * u * u * t;
    let c = 3.0 * u * t * t;
    let d = t * t * t;
    Point::new(
        a * p0.x + b * p1.x + c * p2.x + d * p3.x,
        a * p0.y + b * p1.y + c * p2.y + d * p3.y,
    )
}

/// Control points for a wire running from `start` to `end`.
///
/// Each control point sits on the outward normal of its handle, at a distance
/// proportional to the wire length, so the curve leaves and enters each
/// element perpendicular to the attached edge. A zero normal keeps the control
/// point on the endpoint.
#[must_use]
pub fn wire_control_points(start: Point, start_normal: Point, end: Point, end_normal: Point) -> (Point, Point) {
    let tension = distance(start, end) * CURVE_TENSION;
    (
        Point::new(start.x + start_normal.x * tension, start.y + start_normal.y * tension),
        Point::new(end.x + end_normal.x * tension, end.y + end_normal.y * tension),
    )
}

// =============================================================
// Simplification
// =============================================================

/// Douglas-Peucker reduction of a polyline to tolerance `epsilon`.
///
/// The first and last points are always kept.
#[must_use]
pub fn simplify_path(points: &[Point], epsilon: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;

    let mut stack = vec![(0, points.len() - 1)];
    while let Some((first, last)) = stack.pop() {
        let mut max_dist = 0.0;
        let mut index = first;
        for (i, p) in points.iter().enumerate().take(last).skip(first + 1) {
            let d = distance_to_line_segment(*p, points[first], points[last]);
            if d > max_dist {
                max_dist = d;
                index = i;
            }
        }
        if max_dist > epsilon {
            keep[index] = true;
            stack.push((first, index));
            stack.push((index, last));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}
