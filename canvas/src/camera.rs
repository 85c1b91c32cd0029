#[cfg(test)]
#[path = "camera_test.rs"]
mod camera_test;

use crate::consts::{MAX_SCALE, MIN_SCALE};
use crate::geometry::Point;

/// View transform for the infinite canvas.
///
/// `screen = world × scale + offset`. Offsets are in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self { scale: 1.0, offset_x: 0.0, offset_y: 0.0 }
    }
}

impl Camera {
    /// Convert a screen-space point (CSS pixels) to world coordinates.
    #[must_use]
    pub fn screen_to_world(&self, screen: Point) -> Point {
        Point::new((screen.x - self.offset_x) / self.scale, (screen.y - self.offset_y) / self.scale)
    }

    /// Convert a world-space point to screen coordinates (CSS pixels).
    #[must_use]
    pub fn world_to_screen(&self, world: Point) -> Point {
        Point::new(world.x * self.scale + self.offset_x, world.y * self.scale + self.offset_y)
    }

    /// Convert a screen-space distance (pixels) to world-space distance.
    #[must_use]
    pub fn screen_dist_to_world(&self, screen_dist: f64) -> f64 {
        screen_dist / self.scale
    }

    /// Shift the view by a screen-space delta.
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.offset_x += dx;
        self.offset_y += dy;
    }

    /// Multiply the scale by `factor`, keeping the world point under
    /// `screen_pt` fixed. The scale is clamped to `[MIN_SCALE, MAX_SCALE]`.
    pub fn zoom_at(&mut self, screen_pt: Point, factor: f64) {
        let anchor = self.screen_to_world(screen_pt);
        self.scale = (self.scale * factor).clamp(MIN_SCALE, MAX_SCALE);
        self.offset_x = screen_pt.x - anchor.x * self.scale;
        self.offset_y = screen_pt.y - anchor.y * self.scale;
    }
}
