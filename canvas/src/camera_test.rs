#![allow(clippy::float_cmp)]

use super::*;

const EPSILON: f64 = 1e-10;

fn point_approx_eq(a: Point, b: Point) -> bool {
    (a.x - b.x).abs() < EPSILON && (a.y - b.y).abs() < EPSILON
}

// --- Conversions ---

#[test]
fn default_camera_is_identity() {
    let cam = Camera::default();
    let p = Point::new(12.5, -3.0);
    assert_eq!(cam.screen_to_world(p), p);
    assert_eq!(cam.world_to_screen(p), p);
}

#[test]
fn world_to_screen_applies_scale_then_offset() {
    let cam = Camera { scale: 2.0, offset_x: 10.0, offset_y: -5.0 };
    assert!(point_approx_eq(cam.world_to_screen(Point::new(3.0, 4.0)), Point::new(16.0, 3.0)));
}

#[test]
fn conversions_round_trip() {
    let cam = Camera { scale: 0.37, offset_x: 123.0, offset_y: -45.5 };
    let p = Point::new(-812.0, 77.25);
    assert!(point_approx_eq(cam.screen_to_world(cam.world_to_screen(p)), p));
}

#[test]
fn screen_distance_shrinks_when_zoomed_in() {
    let cam = Camera { scale: 4.0, ..Camera::default() };
    assert_eq!(cam.screen_dist_to_world(20.0), 5.0);
}

// --- Pan / zoom ---

#[test]
fn pan_moves_offsets() {
    let mut cam = Camera::default();
    cam.pan_by(15.0, -7.0);
    assert_eq!((cam.offset_x, cam.offset_y), (15.0, -7.0));
}

#[test]
fn zoom_keeps_the_anchor_fixed() {
    let mut cam = Camera { scale: 1.5, offset_x: 40.0, offset_y: 20.0 };
    let anchor = Point::new(300.0, 200.0);
    let world_before = cam.screen_to_world(anchor);
    cam.zoom_at(anchor, 1.1);
    assert!((cam.scale - 1.65).abs() < EPSILON);
    assert!(point_approx_eq(cam.world_to_screen(world_before), anchor));
}

#[test]
fn zoom_is_clamped() {
    let mut cam = Camera::default();
    for _ in 0..200 {
        cam.zoom_at(Point::new(0.0, 0.0), 1.1);
    }
    assert_eq!(cam.scale, 20.0);
    for _ in 0..400 {
        cam.zoom_at(Point::new(0.0, 0.0), 1.0 / 1.1);
    }
    assert_eq!(cam.scale, 0.1);
}
