//! Element transforms: move, handle resize, rotation and curve bending.
//!
//! All functions mutate in place. Callers own snapshotting and diffing; see
//! [`crate::engine`] for how a gesture turns into a history entry and a patch.

use std::f64::consts::PI;

use crate::consts::{FONT_RESIZE_RATE, MIN_FONT_SIZE};
use crate::element::{Element, HandleType, LineShape, Shape};
use crate::geometry::{Point, rotate_point};

/// Translate an element by `(dx, dy)`.
///
/// Lines also carry their far endpoint and any curve points; pencils carry
/// every path point. Wires are positioned by their endpoints and do not move.
pub fn move_element(el: &mut Element, dx: f64, dy: f64) {
    if el.is_wire() {
        return;
    }
    el.x += dx;
    el.y += dy;
    match &mut el.shape {
        Shape::Line(l) | Shape::Arrow(l) => {
            l.x2 += dx;
            l.y2 += dy;
            if let (Some(x), Some(y)) = (l.cp1x.as_mut(), l.cp1y.as_mut()) {
                *x += dx;
                *y += dy;
            }
            if let (Some(x), Some(y)) = (l.curve_handle_x.as_mut(), l.curve_handle_y.as_mut()) {
                *x += dx;
                *y += dy;
            }
            if let Some(points) = l.points.as_mut() {
                shift(points, dx, dy);
            }
        }
        Shape::Pencil(p) => shift(&mut p.points, dx, dy),
        Shape::Rectangle(_)
        | Shape::Diamond(_)
        | Shape::Circle(_)
        | Shape::Text(_)
        | Shape::Annotation(_)
        | Shape::Wire(_) => {}
    }
}

fn shift(points: &mut [Point], dx: f64, dy: f64) {
    for p in points {
        p.x += dx;
        p.y += dy;
    }
}

/// Drag `handle` by `(dx, dy)`, given in the element's local frame.
///
/// Corner handles move the grabbed corner and leave the opposite one fixed;
/// width and height may go negative and are normalized by readers. Dragging a
/// line endpoint straightens the line. Circle handles change the radius by
/// the drag component along the handle direction, never below zero. Text
/// scales its font with horizontal drag, never below the minimum size.
/// Handles a kind does not have are ignored.
pub fn resize_element(el: &mut Element, handle: HandleType, dx: f64, dy: f64) {
    match &mut el.shape {
        Shape::Rectangle(b) | Shape::Diamond(b) => match handle {
            HandleType::TopLeft => {
                el.x += dx;
                el.y += dy;
                b.width -= dx;
                b.height -= dy;
            }
            HandleType::TopRight => {
                el.y += dy;
                b.width += dx;
                b.height -= dy;
            }
            HandleType::BottomLeft => {
                el.x += dx;
                b.width -= dx;
                b.height += dy;
            }
            HandleType::BottomRight => {
                b.width += dx;
                b.height += dy;
            }
            _ => {}
        },
        Shape::Line(l) | Shape::Arrow(l) => match handle {
            HandleType::Start => {
                el.x += dx;
                el.y += dy;
                l.reset_curve();
            }
            HandleType::End => {
                l.x2 += dx;
                l.y2 += dy;
                l.reset_curve();
            }
            _ => {}
        },
        Shape::Circle(c) => {
            let delta = match handle {
                HandleType::CircleTop => -dy,
                HandleType::CircleBottom => dy,
                HandleType::CircleLeft => -dx,
                HandleType::CircleRight | HandleType::Radius => dx,
                _ => return,
            };
            c.radius = (c.radius + delta).max(0.0);
        }
        Shape::Text(t) => {
            if handle == HandleType::BottomRight {
                t.font_size = (t.font_size + dx * FONT_RESIZE_RATE).max(MIN_FONT_SIZE);
            }
        }
        Shape::Pencil(_) | Shape::Annotation(_) | Shape::Wire(_) => {}
    }
}

/// A world-space drag delta expressed in the element's local frame.
#[must_use]
pub fn local_delta(el: &Element, dx: f64, dy: f64) -> (f64, f64) {
    let angle = el.rotation_rad();
    if angle == 0.0 {
        return (dx, dy);
    }
    let p = rotate_point(Point::new(dx, dy), Point::default(), -angle);
    (p.x, p.y)
}

/// Rotation in degrees after dragging the rotation grip from `start` to
/// `current` around `center`, starting from `initial` degrees.
#[must_use]
pub fn rotation_after_drag(center: Point, start: Point, current: Point, initial: f64) -> f64 {
    let from = (start.y - center.y).atan2(start.x - center.x);
    let to = (current.y - center.y).atan2(current.x - center.x);
    initial + (to - from) * 180.0 / PI
}

/// Bend a line so it passes through `grip` (local space) at its midpoint.
///
/// The quadratic control point that puts `grip` on the curve at t = 0.5 is
/// `2·grip − (p0 + p2)/2`.
pub fn bend_line(start: Point, line: &mut LineShape, grip: Point) {
    line.cp1x = Some(2.0 * grip.x - 0.5 * start.x - 0.5 * line.x2);
    line.cp1y = Some(2.0 * grip.y - 0.5 * start.y - 0.5 * line.y2);
    line.curve_handle_x = Some(grip.x);
    line.curve_handle_y = Some(grip.y);
}

#[cfg(test)]
#[path = "transform_test.rs"]
mod transform_test;
