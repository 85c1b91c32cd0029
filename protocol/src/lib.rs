//! Shared message model for the realtime whiteboard transport.
//!
//! This crate owns the wire representation used by both `server` and
//! `canvas`. Every message is one JSON object discriminated by its `type`
//! field; room-scoped messages also carry `roomId`. Element payloads stay
//! opaque (`serde_json::Value`) here: the server persists them without
//! interpretation and the canvas crate decodes them into typed elements.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Room identifier. Rooms are only a broadcast and persistence scope here.
pub type RoomId = String;

/// Error returned by [`parse`].
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The text is not a JSON object.
    #[error("malformed json: {0}")]
    Malformed(String),
    /// The object has no string `type` field.
    #[error("message has no type")]
    MissingType,
    /// The `type` field names a message this protocol does not define.
    #[error("unknown message type: {0}")]
    UnknownType(String),
    /// The message type is known but its payload does not match.
    #[error("invalid {kind} message: {reason}")]
    Invalid { kind: String, reason: String },
}

/// A point in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

// =============================================================================
// MESSAGES
// =============================================================================

/// Every message exchanged over the realtime socket.
///
/// Direction is documented per variant. Clients may send any `C→S` variant;
/// the server relays most of them unchanged to the other members of the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    /// C→S: join a room, leaving any previous one.
    #[serde(rename = "join_room", rename_all = "camelCase")]
    JoinRoom { room_id: RoomId },
    /// C→S: leave a room.
    #[serde(rename = "leave_room", rename_all = "camelCase")]
    LeaveRoom { room_id: RoomId },
    /// C↔S: chat line. The server stamps `userId` before relaying.
    #[serde(rename = "chat", rename_all = "camelCase")]
    Chat {
        room_id: RoomId,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
    },
    /// C→S: replace every element of the room (import, undo, redo).
    #[serde(rename = "update-elements", rename_all = "camelCase")]
    UpdateElements { room_id: RoomId, message: Vec<Value> },
    /// S→C: the room's element set was replaced.
    #[serde(rename = "elements-updated", rename_all = "camelCase")]
    ElementsUpdated {
        room_id: RoomId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        message: Vec<Value>,
    },
    /// S→C: a bulk replace failed and nothing was stored.
    #[serde(rename = "import-failed")]
    ImportFailed { message: String },
    /// C↔S: one element was created.
    #[serde(rename = "element-create", rename_all = "camelCase")]
    ElementCreate { room_id: RoomId, element: Value },
    /// C↔S: partial-field patches keyed by id.
    #[serde(rename = "elements-update", rename_all = "camelCase")]
    ElementsUpdate { room_id: RoomId, elements: Vec<Value> },
    /// C↔S: elements deleted. Wire cascades are already included by the sender.
    #[serde(rename = "elements-delete", rename_all = "camelCase")]
    ElementsDelete { room_id: RoomId, element_ids: Vec<String> },
    /// C↔S: pointer position. The server overwrites `userId`.
    #[serde(rename = "cursor-move", rename_all = "camelCase")]
    CursorMove {
        room_id: RoomId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_name: Option<String>,
        x: f64,
        y: f64,
    },
    /// C↔S: a freehand stroke began.
    #[serde(rename = "stroke-start", rename_all = "camelCase")]
    StrokeStart { room_id: RoomId, element: Value },
    /// C↔S: the in-progress stroke's points so far.
    #[serde(rename = "stroke-update", rename_all = "camelCase")]
    StrokeUpdate { room_id: RoomId, stroke_id: String, points: Vec<Point> },
    /// C↔S: the stroke finished with its simplified points.
    #[serde(rename = "stroke-end", rename_all = "camelCase")]
    StrokeEnd { room_id: RoomId, stroke_id: String, points: Vec<Point> },
    /// C↔S: a highlighter scribble began.
    #[serde(rename = "highlight-start", rename_all = "camelCase")]
    HighlightStart { room_id: RoomId, element: Value },
    /// C↔S: the scribble's points so far.
    #[serde(rename = "highlight-update", rename_all = "camelCase")]
    HighlightUpdate { room_id: RoomId, stroke_id: String, points: Vec<Point> },
    /// C↔S: the scribble finished.
    #[serde(rename = "highlight-end", rename_all = "camelCase")]
    HighlightEnd { room_id: RoomId, stroke_id: String },
    /// C↔S: drop every highlighter scribble.
    #[serde(rename = "clear-highlights", rename_all = "camelCase")]
    ClearHighlights { room_id: RoomId },
    /// C→S: delete every element of the room.
    #[serde(rename = "clear-canvas", rename_all = "camelCase")]
    ClearCanvas { room_id: RoomId },
    /// S→C: the room's elements were all deleted.
    #[serde(rename = "canvas-cleared", rename_all = "camelCase")]
    CanvasCleared { room_id: RoomId },
    /// S→C: confirmation that the connection joined a room.
    #[serde(rename = "joined_room", rename_all = "camelCase")]
    JoinedRoom { room_id: RoomId },
    /// S→C: human-readable status line.
    #[serde(rename = "status")]
    Status { message: String },
}

/// Every `type` value defined by [`Message`].
pub const KNOWN_TYPES: &[&str] = &[
    "join_room",
    "leave_room",
    "chat",
    "update-elements",
    "elements-updated",
    "import-failed",
    "element-create",
    "elements-update",
    "elements-delete",
    "cursor-move",
    "stroke-start",
    "stroke-update",
    "stroke-end",
    "highlight-start",
    "highlight-update",
    "highlight-end",
    "clear-highlights",
    "clear-canvas",
    "canvas-cleared",
    "joined_room",
    "status",
];

impl Message {
    /// The wire `type` discriminator of this message.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => "join_room",
            Self::LeaveRoom { .. } => "leave_room",
            Self::Chat { .. } => "chat",
            Self::UpdateElements { .. } => "update-elements",
            Self::ElementsUpdated { .. } => "elements-updated",
            Self::ImportFailed { .. } => "import-failed",
            Self::ElementCreate { .. } => "element-create",
            Self::ElementsUpdate { .. } => "elements-update",
            Self::ElementsDelete { .. } => "elements-delete",
            Self::CursorMove { .. } => "cursor-move",
            Self::StrokeStart { .. } => "stroke-start",
            Self::StrokeUpdate { .. } => "stroke-update",
            Self::StrokeEnd { .. } => "stroke-end",
            Self::HighlightStart { .. } => "highlight-start",
            Self::HighlightUpdate { .. } => "highlight-update",
            Self::HighlightEnd { .. } => "highlight-end",
            Self::ClearHighlights { .. } => "clear-highlights",
            Self::ClearCanvas { .. } => "clear-canvas",
            Self::CanvasCleared { .. } => "canvas-cleared",
            Self::JoinedRoom { .. } => "joined_room",
            Self::Status { .. } => "status",
        }
    }

    /// The room this message is scoped to, if it carries one.
    #[must_use]
    pub fn room_id(&self) -> Option<&str> {
        match self {
            Self::JoinRoom { room_id }
            | Self::LeaveRoom { room_id }
            | Self::Chat { room_id, .. }
            | Self::UpdateElements { room_id, .. }
            | Self::ElementsUpdated { room_id, .. }
            | Self::ElementCreate { room_id, .. }
            | Self::ElementsUpdate { room_id, .. }
            | Self::ElementsDelete { room_id, .. }
            | Self::CursorMove { room_id, .. }
            | Self::StrokeStart { room_id, .. }
            | Self::StrokeUpdate { room_id, .. }
            | Self::StrokeEnd { room_id, .. }
            | Self::HighlightStart { room_id, .. }
            | Self::HighlightUpdate { room_id, .. }
            | Self::HighlightEnd { room_id, .. }
            | Self::ClearHighlights { room_id }
            | Self::ClearCanvas { room_id }
            | Self::CanvasCleared { room_id }
            | Self::JoinedRoom { room_id } => Some(room_id),
            Self::ImportFailed { .. } | Self::Status { .. } => None,
        }
    }

    /// Whether this message is relayed without ever touching storage.
    #[must_use]
    pub fn is_ephemeral(&self) -> bool {
        matches!(
            self,
            Self::CursorMove { .. }
                | Self::StrokeStart { .. }
                | Self::StrokeUpdate { .. }
                | Self::StrokeEnd { .. }
                | Self::HighlightStart { .. }
                | Self::HighlightUpdate { .. }
                | Self::HighlightEnd { .. }
                | Self::ClearHighlights { .. }
        )
    }

    /// Status line sent to a connection.
    #[must_use]
    pub fn status(message: impl Into<String>) -> Self {
        Self::Status { message: message.into() }
    }

    /// Serialize to the JSON text sent over the socket.
    ///
    /// # Errors
    ///
    /// Returns an error if an element payload cannot be serialized.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Check required fields that the type system cannot express.
    fn validate(&self) -> Result<(), String> {
        match self {
            Self::ElementCreate { element, .. } | Self::StrokeStart { element, .. } | Self::HighlightStart { element, .. } => {
                if element_id(element).is_none() {
                    return Err("element.id required".into());
                }
            }
            Self::ElementsUpdate { elements, .. } => {
                if elements.iter().any(|patch| element_id(patch).is_none()) {
                    return Err("every patch needs an id".into());
                }
            }
            Self::StrokeUpdate { stroke_id, .. }
            | Self::StrokeEnd { stroke_id, .. }
            | Self::HighlightUpdate { stroke_id, .. }
            | Self::HighlightEnd { stroke_id, .. } => {
                if stroke_id.is_empty() {
                    return Err("strokeId required".into());
                }
            }
            Self::JoinRoom { room_id } | Self::LeaveRoom { room_id } => {
                if room_id.is_empty() {
                    return Err("roomId required".into());
                }
            }
            _ => {}
        }
        Ok(())
    }
}

// =============================================================================
// PARSING
// =============================================================================

/// Parse one inbound text frame.
///
/// The three failure modes are kept apart so callers can log them at
/// different levels: malformed JSON, an unknown `type`, and a known type whose
/// payload is missing required fields.
///
/// # Errors
///
/// Returns [`ProtocolError`] describing why the text is not a valid message.
pub fn parse(text: &str) -> Result<Message, ProtocolError> {
    let value: Value = serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    let Some(kind) = value.get("type").and_then(Value::as_str) else {
        return Err(ProtocolError::MissingType);
    };
    if !KNOWN_TYPES.contains(&kind) {
        return Err(ProtocolError::UnknownType(kind.to_owned()));
    }
    let kind = kind.to_owned();
    let message: Message = serde_json::from_value(value).map_err(|e| ProtocolError::Invalid {
        kind: kind.clone(),
        reason: e.to_string(),
    })?;
    message
        .validate()
        .map_err(|reason| ProtocolError::Invalid { kind, reason })?;
    Ok(message)
}

/// The non-empty string `id` of an element payload.
#[must_use]
pub fn element_id(element: &Value) -> Option<&str> {
    element
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}

// =============================================================================
// MERGE PATCH
// =============================================================================

/// Shallow merge `patch` into `target`.
///
/// Top-level keys of the patch overwrite the target's; a `null` value deletes
/// the key. The `id` key is never rewritten. Applying the same patch twice
/// yields the same object as applying it once.
pub fn merge_patch(target: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, value) in patch {
        if key == "id" {
            continue;
        }
        if value.is_null() {
            target.remove(key);
        } else {
            target.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
