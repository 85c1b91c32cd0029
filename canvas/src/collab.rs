//! Ephemeral collaboration state and send throttles.
//!
//! Remote cursors, in-progress remote pencil strokes and highlighter
//! scribbles are never part of the document: they live here, keyed by user or
//! stroke id, and are drawn on top of the scene.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::consts::CURSOR_TIMEOUT_MS;
use crate::element::{Element, Shape, from_json};
use crate::geometry::Point;

/// Leading-edge rate limiter.
///
/// The first call passes and opens a window of `interval_ms`; calls inside the
/// window are dropped, not queued. Time is supplied by the caller.
#[derive(Debug, Clone, Copy)]
pub struct Throttle {
    interval_ms: f64,
    last_ms: Option<f64>,
}

impl Throttle {
    #[must_use]
    pub const fn new(interval_ms: f64) -> Self {
        Self { interval_ms, last_ms: None }
    }

    /// Whether a call at `now_ms` may go through. Passing calls open a new window.
    pub fn ready(&mut self, now_ms: f64) -> bool {
        if self.last_ms.is_some_and(|last| now_ms - last < self.interval_ms) {
            return false;
        }
        self.last_ms = Some(now_ms);
        true
    }

    /// Forget the current window so the next call passes.
    pub fn reset(&mut self) {
        self.last_ms = None;
    }
}

/// Another participant's pointer.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCursor {
    pub user_name: Option<String>,
    pub at: Point,
    pub updated_ms: f64,
}

#[derive(Debug, Clone, Default)]
pub struct RemoteState {
    pub cursors: BTreeMap<String, RemoteCursor>,
    /// In-progress remote pencil strokes by stroke id.
    pub strokes: BTreeMap<String, Element>,
    /// Highlighter scribbles by stroke id. They stay until cleared.
    pub highlights: BTreeMap<String, Element>,
}

fn decode_stroke(element: &Value) -> Option<Element> {
    match from_json(element.clone()) {
        Ok(el) if matches!(el.shape, Shape::Pencil(_)) => Some(el),
        Ok(el) => {
            tracing::debug!(id = %el.id, kind = el.shape.kind_name(), "non-pencil stroke ignored");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "undecodable stroke ignored");
            None
        }
    }
}

fn set_points(map: &mut BTreeMap<String, Element>, stroke_id: &str, points: &[Point]) -> bool {
    let Some(el) = map.get_mut(stroke_id) else {
        return false;
    };
    if let Shape::Pencil(p) = &mut el.shape {
        p.points = points.to_vec();
    }
    true
}

impl RemoteState {
    pub fn move_cursor(&mut self, user_id: &str, user_name: Option<String>, at: Point, now_ms: f64) {
        self.cursors.insert(user_id.to_owned(), RemoteCursor { user_name, at, updated_ms: now_ms });
    }

    /// Drop cursors not updated within the timeout. Returns true if any were dropped.
    pub fn evict_stale(&mut self, now_ms: f64) -> bool {
        let before = self.cursors.len();
        self.cursors.retain(|_, c| now_ms - c.updated_ms < CURSOR_TIMEOUT_MS);
        self.cursors.len() != before
    }

    pub fn stroke_start(&mut self, element: &Value) -> bool {
        let Some(el) = decode_stroke(element) else {
            return false;
        };
        self.strokes.insert(el.id.clone(), el);
        true
    }

    pub fn stroke_update(&mut self, stroke_id: &str, points: &[Point]) -> bool {
        set_points(&mut self.strokes, stroke_id, points)
    }

    /// The stroke is finished; the committed element arrives separately.
    pub fn stroke_end(&mut self, stroke_id: &str) -> bool {
        self.strokes.remove(stroke_id).is_some()
    }

    pub fn highlight_start(&mut self, element: &Value) -> bool {
        let Some(el) = decode_stroke(element) else {
            return false;
        };
        self.highlights.insert(el.id.clone(), el);
        true
    }

    pub fn highlight_update(&mut self, stroke_id: &str, points: &[Point]) -> bool {
        set_points(&mut self.highlights, stroke_id, points)
    }

    pub fn clear_highlights(&mut self) {
        self.highlights.clear();
    }

    /// Forget everything, for example when leaving the room.
    pub fn clear(&mut self) {
        self.cursors.clear();
        self.strokes.clear();
        self.highlights.clear();
    }
}

#[cfg(test)]
#[path = "collab_test.rs"]
mod collab_test;
