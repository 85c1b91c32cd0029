//! Input model: tools, modifier keys, mouse buttons, and the gesture state machine.
//!
//! `Tool` and `Modifiers` capture the user's intent at the time of a pointer
//! event. `InputState` is the gesture being tracked between pointer-down and
//! pointer-up. Exactly one gesture is active at a time; pointer-move only
//! updates the working data of the current variant, and only pointer-down and
//! pointer-up move between variants.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use std::fmt;
use std::str::FromStr;

use crate::element::{Element, ElementId, HandleType};
use crate::geometry::{Point, Rect, normalize_rect};

/// Which tool is currently active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    /// Select, move, resize, rotate and bend existing elements.
    #[default]
    Selection,
    Rectangle,
    Diamond,
    Circle,
    Arrow,
    Line,
    /// Freehand stroke. Stays active after each stroke.
    Pencil,
    /// Click to place a text element and open the editor.
    Text,
    /// Connect two element handles.
    Wire,
    Eraser,
    /// Transient pointer trail; nothing is persisted.
    Laser,
    /// Ephemeral translucent scribble shared with the room.
    Highlighter,
    /// Click to place a comment marker.
    Annotation,
}

impl Tool {
    pub const ALL: [Tool; 13] = [
        Self::Selection,
        Self::Rectangle,
        Self::Diamond,
        Self::Circle,
        Self::Arrow,
        Self::Line,
        Self::Pencil,
        Self::Text,
        Self::Wire,
        Self::Eraser,
        Self::Laser,
        Self::Highlighter,
        Self::Annotation,
    ];

    /// Name used by the host toolbar.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Selection => "selection",
            Self::Rectangle => "rectangle",
            Self::Diamond => "diamond",
            Self::Circle => "circle",
            Self::Arrow => "arrow",
            Self::Line => "line",
            Self::Pencil => "pencil",
            Self::Text => "text",
            Self::Wire => "wire",
            Self::Eraser => "eraser",
            Self::Laser => "laser",
            Self::Highlighter => "highlighter",
            Self::Annotation => "annotation",
        }
    }

    /// Whether pointer-down with this tool starts drawing a new element.
    #[must_use]
    pub fn draws(self) -> bool {
        matches!(self, Self::Rectangle | Self::Diamond | Self::Circle | Self::Arrow | Self::Line | Self::Pencil)
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a host passes a tool name this engine does not know.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tool: {0}")]
pub struct UnknownTool(pub String);

impl FromStr for Tool {
    type Err = UnknownTool;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|t| t.as_str() == s).ok_or_else(|| UnknownTool(s.to_owned()))
    }
}

/// Keyboard/mouse modifier keys held during an event.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    /// Meta / Command key. Treated like Ctrl for shortcuts.
    pub meta: bool,
}

impl Modifiers {
    /// Ctrl on most platforms, Command on macOS.
    #[must_use]
    pub fn command(self) -> bool {
        self.ctrl || self.meta
    }
}

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Left mouse button (or single-finger tap).
    Primary,
    /// Middle mouse button (scroll wheel click).
    Middle,
    /// Right mouse button (or two-finger tap).
    Secondary,
}

/// A keyboard key, holding the name reported by the browser (`"Delete"`, `"z"`, `" "`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key(pub String);

impl Key {
    #[must_use]
    pub fn is(&self, name: &str) -> bool {
        self.0.eq_ignore_ascii_case(name)
    }
}

/// Wheel / trackpad scroll delta.
#[derive(Debug, Clone, Copy)]
pub struct WheelDelta {
    /// Horizontal scroll amount in pixels.
    pub dx: f64,
    /// Vertical scroll amount in pixels (positive = down).
    pub dy: f64,
}

/// Element and handle under the pointer while using the wire tool.
#[derive(Debug, Clone, PartialEq)]
pub struct WireHover {
    pub element_id: ElementId,
    pub handle: Option<HandleType>,
}

/// Persistent UI state visible to the renderer.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Default)]
pub struct UiState {
    pub tool: Tool,
    /// Selected element ids, in selection order.
    pub selected: Vec<ElementId>,
    /// When set, only panning and zooming are allowed.
    pub read_only: bool,
    pub space_held: bool,
    pub ctrl_held: bool,
    pub wire_hover: Option<WireHover>,
    /// Last user-visible notice (for example a failed import).
    pub notice: Option<String>,
}

impl UiState {
    #[must_use]
    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.iter().any(|s| s == id)
    }
}

/// What every transform gesture remembers from its pointer-down.
#[derive(Debug, Clone)]
pub struct GestureStart {
    pub screen: Point,
    pub world: Point,
    /// Whole document before the gesture, recorded into history on commit.
    pub doc_before: Vec<Element>,
    /// The affected elements before the gesture, for diffing and click revert.
    pub originals: Vec<Element>,
}

/// The active gesture.
#[derive(Debug, Clone, Default)]
pub enum InputState {
    #[default]
    Idle,
    /// A new element is being sized. It is not in the document yet.
    Drawing { start: GestureStart, element: Element },
    /// Text tool pressed; the element is created on release.
    Placing { start: Point },
    /// Annotation tool pressed; the marker is created on release.
    PlacingAnnotation { start: Point },
    /// Selected elements follow the pointer.
    Dragging { start: GestureStart },
    Resizing { start: GestureStart, handle: HandleType, last_world: Point },
    Rotating { start: GestureStart, center: Point },
    Curving { start: GestureStart },
    Panning { last_screen: Point },
    /// A temporary line follows the pointer from a captured handle.
    Wiring { from_id: ElementId, from_handle: HandleType, from_point: Point, current: Point },
    /// Elements under the pointer are ghosted; they are deleted on release.
    Erasing { marked: Vec<ElementId>, trail: Vec<Point> },
    Lasering { trail: Vec<Point> },
    /// The scribble itself lives with the remote highlights so it clears with them.
    Highlighting { stroke_id: ElementId },
    MultiSelecting { start: Point, current: Point },
}

impl InputState {
    /// Name of the current gesture.
    #[must_use]
    pub fn mode_name(&self) -> &'static str {
        match self {
            Self::Idle => "none",
            Self::Drawing { .. } => "drawing",
            Self::Placing { .. } => "placing",
            Self::PlacingAnnotation { .. } => "placing_annotation",
            Self::Dragging { .. } => "dragging",
            Self::Resizing { .. } => "resizing",
            Self::Rotating { .. } => "rotating",
            Self::Curving { .. } => "curving",
            Self::Panning { .. } => "panning",
            Self::Wiring { .. } => "wiring",
            Self::Erasing { .. } => "erasing",
            Self::Lasering { .. } => "lasering",
            Self::Highlighting { .. } => "highlighting",
            Self::MultiSelecting { .. } => "multi-selecting",
        }
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// The rubber-band rectangle, normalized, while multi-selecting.
    #[must_use]
    pub fn selection_rect(&self) -> Option<Rect> {
        match self {
            Self::MultiSelecting { start, current } => {
                Some(normalize_rect(start.x, start.y, current.x - start.x, current.y - start.y))
            }
            _ => None,
        }
    }
}
