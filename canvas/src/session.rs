//! Room session: turns engine actions into wire messages and filters inbound
//! ones by room.
//!
//! Element payloads leave the client rounded to the persisted precision.
//! Cursor moves and in-progress stroke, highlight and curve updates pass
//! through leading-edge throttles; a dropped update is never queued, the next
//! one after the window carries the full point list anyway.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use serde_json::Value;

use protocol::{Message, RoomId};

use crate::collab::Throttle;
use crate::consts::{CURSOR_THROTTLE_MS, PERSIST_PRECISION, STROKE_THROTTLE_MS};
use crate::element::{Element, round_value, to_json};
use crate::engine::Action;

#[derive(Debug, Clone)]
pub struct Session {
    pub room_id: RoomId,
    pub user_id: String,
    pub user_name: String,
    cursor: Throttle,
    stroke: Throttle,
    highlight: Throttle,
    curve: Throttle,
}

fn rounded(el: &Element) -> Option<Value> {
    match to_json(el) {
        Ok(mut value) => {
            round_value(&mut value, PERSIST_PRECISION);
            Some(value)
        }
        Err(e) => {
            tracing::warn!(id = %el.id, error = %e, "element not encodable; not sent");
            None
        }
    }
}

fn rounded_patches(patches: &[Value]) -> Vec<Value> {
    patches
        .iter()
        .map(|p| {
            let mut p = p.clone();
            round_value(&mut p, PERSIST_PRECISION);
            p
        })
        .collect()
}

impl Session {
    #[must_use]
    pub fn new(room_id: &str, user_id: &str, user_name: &str) -> Self {
        Self {
            room_id: room_id.to_owned(),
            user_id: user_id.to_owned(),
            user_name: user_name.to_owned(),
            cursor: Throttle::new(CURSOR_THROTTLE_MS),
            stroke: Throttle::new(STROKE_THROTTLE_MS),
            highlight: Throttle::new(STROKE_THROTTLE_MS),
            curve: Throttle::new(STROKE_THROTTLE_MS),
        }
    }

    #[must_use]
    pub fn join_message(&self) -> Message {
        Message::JoinRoom { room_id: self.room_id.clone() }
    }

    #[must_use]
    pub fn leave_message(&self) -> Message {
        Message::LeaveRoom { room_id: self.room_id.clone() }
    }

    #[must_use]
    pub fn chat(&self, text: &str) -> Message {
        Message::Chat { room_id: self.room_id.clone(), message: text.to_owned(), user_id: None }
    }

    /// Whether an inbound message belongs to this session's room.
    ///
    /// Messages without a room (status, import failure) always apply.
    #[must_use]
    pub fn accepts(&self, msg: &Message) -> bool {
        msg.room_id().is_none_or(|room| room == self.room_id)
    }

    /// Wire message for one engine action, if it has one and is not throttled.
    pub fn outbound(&mut self, action: &Action, now_ms: f64) -> Option<Message> {
        let room_id = self.room_id.clone();
        let msg = match action {
            Action::ElementCreated(el) => Message::ElementCreate { room_id, element: rounded(el)? },
            Action::ElementsUpdated(patches) => {
                Message::ElementsUpdate { room_id, elements: rounded_patches(patches) }
            }
            Action::ElementsDeleted(ids) => Message::ElementsDelete { room_id, element_ids: ids.clone() },
            Action::ElementsReplaced(elements) => {
                Message::UpdateElements { room_id, message: elements.iter().filter_map(rounded).collect() }
            }
            Action::CanvasCleared => Message::ClearCanvas { room_id },
            Action::StrokeStarted(el) => {
                self.stroke.reset();
                Message::StrokeStart { room_id, element: rounded(el)? }
            }
            Action::StrokeUpdated { stroke_id, points } => {
                if !self.stroke.ready(now_ms) {
                    return None;
                }
                Message::StrokeUpdate { room_id, stroke_id: stroke_id.clone(), points: points.clone() }
            }
            Action::StrokeEnded { stroke_id, points } => {
                Message::StrokeEnd { room_id, stroke_id: stroke_id.clone(), points: points.clone() }
            }
            Action::HighlightStarted(el) => {
                self.highlight.reset();
                Message::HighlightStart { room_id, element: rounded(el)? }
            }
            Action::HighlightUpdated { stroke_id, points } => {
                if !self.highlight.ready(now_ms) {
                    return None;
                }
                Message::HighlightUpdate { room_id, stroke_id: stroke_id.clone(), points: points.clone() }
            }
            Action::HighlightEnded { stroke_id } => Message::HighlightEnd { room_id, stroke_id: stroke_id.clone() },
            Action::HighlightsCleared => Message::ClearHighlights { room_id },
            Action::CurveMoved(patch) => {
                if !self.curve.ready(now_ms) {
                    return None;
                }
                Message::ElementsUpdate { room_id, elements: rounded_patches(std::slice::from_ref(patch)) }
            }
            Action::CursorMoved(at) => {
                if !self.cursor.ready(now_ms) {
                    return None;
                }
                Message::CursorMove {
                    room_id,
                    user_id: Some(self.user_id.clone()),
                    user_name: Some(self.user_name.clone()),
                    x: at.x,
                    y: at.y,
                }
            }
            Action::ElementClicked(_)
            | Action::EditTextRequested { .. }
            | Action::ToolChanged(_)
            | Action::ChatReceived { .. }
            | Action::Notice(_)
            | Action::SetCursor(_)
            | Action::RenderNeeded => return None,
        };
        Some(msg)
    }
}
