//! Interaction engine: pointer, wheel and keyboard events in, document
//! mutations and outbound [`Action`]s out.
//!
//! ARCHITECTURE
//! ============
//! [`EngineCore`] owns every piece of client state (document, camera, UI
//! flags, the active gesture, history, remote presence) and has no browser
//! dependency, so the whole state machine is tested natively. [`Engine`]
//! wraps it with the `<canvas>` element, the room [`Session`] and the
//! renderer.
//!
//! Local edits are applied optimistically and reported as actions. The host
//! forwards them through [`Engine::outbound`], which turns them into wire
//! messages. Remote messages come back through [`EngineCore::apply_remote`]
//! and go through the same [`DocStore`] methods as local edits.
//!
//! GESTURES
//! ========
//! Exactly one [`InputState`] is active. Pointer-down picks it, pointer-move
//! updates its working data and pointer-up commits it and returns to idle.
//! Panning is the one gesture that can take over mid-stream: a second
//! finger, the middle button, or a held Space/Control aborts whatever was in
//! progress.

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use std::collections::BTreeMap;

use serde_json::Value;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use protocol::Message;

use crate::bounds::{element_center, intersects_rect};
use crate::camera::Camera;
use crate::collab::RemoteState;
use crate::consts::{
    CLICK_SLOP_PX, HOVER_LENIENCY, LINE_HIT_THRESHOLD, MIN_SIZE_THRESHOLD, PERSIST_PRECISION, PLACING_CANCEL_DISTANCE,
    SIMPLIFY_EPSILON, TRAIL_POINTS, ZOOM_STEP,
};
use crate::doc::{DocStore, decode_elements};
use crate::element::{
    AnnotationState, Comment, Element, ElementId, HandleType, Shape, Style, WireRouting, diff, from_json, round_element,
};
use crate::export::{export_bounds, export_json, import_json};
use crate::geometry::{Point, Rect, distance, midpoint, normalize_rect, simplify_path};
use crate::history::History;
use crate::hit::{element_at_position, hit_test_handle, to_local};
use crate::input::{Button, GestureStart, InputState, Key, Modifiers, Tool, UiState, WheelDelta, WireHover};
use crate::render::{self, CanvasTextMeasure};
use crate::session::Session;
use crate::text::{ApproxTextMeasure, TextMeasure};
use crate::transform::{bend_line, local_delta, move_element, resize_element, rotation_after_drag};

/// Effects of an engine call, for the host to act on.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    ElementCreated(Element),
    /// Partial patches, each carrying the element id.
    ElementsUpdated(Vec<Value>),
    /// Every removed id, attached wires included.
    ElementsDeleted(Vec<ElementId>),
    /// Whole-board replacement after undo, redo or import.
    ElementsReplaced(Vec<Element>),
    CanvasCleared,
    StrokeStarted(Element),
    StrokeUpdated { stroke_id: ElementId, points: Vec<Point> },
    StrokeEnded { stroke_id: ElementId, points: Vec<Point> },
    HighlightStarted(Element),
    HighlightUpdated { stroke_id: ElementId, points: Vec<Point> },
    HighlightEnded { stroke_id: ElementId },
    HighlightsCleared,
    /// Live curve-bend patch while the grip is dragged.
    CurveMoved(Value),
    /// Local pointer position in world coordinates.
    CursorMoved(Point),
    /// An annotation was clicked or placed; the host opens its thread.
    ElementClicked(Element),
    /// The host should open a text editor for this element.
    EditTextRequested { id: ElementId, text: String },
    ToolChanged(Tool),
    ChatReceived { user_id: Option<String>, message: String },
    /// User-visible notice, for example a failed import.
    Notice(String),
    SetCursor(String),
    RenderNeeded,
}

fn new_id() -> ElementId {
    uuid::Uuid::new_v4().to_string()
}

// =============================================================
// EngineCore
// =============================================================

/// Core engine state. All logic that doesn't depend on the canvas element.
pub struct EngineCore {
    pub doc: DocStore,
    pub camera: Camera,
    pub ui: UiState,
    pub input: InputState,
    pub history: History,
    pub remote: RemoteState,
    /// Style applied to newly created elements; updated by style edits.
    pub style: Style,
    pub user_id: String,
    pub user_name: String,
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub dpr: f64,
    /// Screen positions of pointers currently down, by pointer id.
    pointers: BTreeMap<i32, Point>,
    measure: Box<dyn TextMeasure>,
}

impl Default for EngineCore {
    fn default() -> Self {
        Self {
            doc: DocStore::new(),
            camera: Camera::default(),
            ui: UiState::default(),
            input: InputState::default(),
            history: History::default(),
            remote: RemoteState::default(),
            style: Style::default(),
            user_id: String::new(),
            user_name: String::new(),
            viewport_width: 0.0,
            viewport_height: 0.0,
            dpr: 1.0,
            pointers: BTreeMap::new(),
            measure: Box::new(ApproxTextMeasure::default()),
        }
    }
}

impl EngineCore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_user(user_id: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), user_name: user_name.into(), ..Self::default() }
    }

    pub fn set_measure(&mut self, measure: Box<dyn TextMeasure>) {
        self.measure = measure;
    }

    #[must_use]
    pub fn measure(&self) -> &dyn TextMeasure {
        &*self.measure
    }

    // --- Data inputs ---

    /// Hydrate the document from the stored element list.
    pub fn load_snapshot(&mut self, values: &[Value]) {
        self.doc.load_values(values);
        self.prune_selection();
    }

    /// Apply one inbound message. Room filtering happens in [`Session::accepts`].
    pub fn apply_remote(&mut self, msg: &Message, now_ms: f64) -> Vec<Action> {
        let mut actions = Vec::new();
        let changed = match msg {
            Message::ElementCreate { element, .. } => match from_json(element.clone()) {
                Ok(el) => self.doc.insert(el),
                Err(e) => {
                    tracing::warn!(error = %e, "undecodable remote element ignored");
                    false
                }
            },
            Message::ElementsUpdate { elements, .. } => {
                elements.iter().fold(false, |changed, patch| self.doc.apply_patch(patch) || changed)
            }
            Message::ElementsDelete { element_ids, .. } => {
                let removed = self.doc.remove_cascade(element_ids);
                self.prune_selection();
                !removed.is_empty()
            }
            Message::ElementsUpdated { message, .. } => {
                self.doc.replace_all(decode_elements(message));
                self.prune_selection();
                true
            }
            Message::CanvasCleared { .. } => {
                self.doc.clear();
                self.ui.selected.clear();
                true
            }
            Message::CursorMove { user_id: Some(user_id), user_name, x, y, .. } => {
                if *user_id == self.user_id {
                    false
                } else {
                    self.remote.move_cursor(user_id, user_name.clone(), Point::new(*x, *y), now_ms);
                    true
                }
            }
            Message::StrokeStart { element, .. } => self.remote.stroke_start(element),
            Message::StrokeUpdate { stroke_id, points, .. } => self.remote.stroke_update(stroke_id, points),
            Message::StrokeEnd { stroke_id, .. } => self.remote.stroke_end(stroke_id),
            Message::HighlightStart { element, .. } => self.remote.highlight_start(element),
            Message::HighlightUpdate { stroke_id, points, .. } => self.remote.highlight_update(stroke_id, points),
            Message::ClearHighlights { .. } => {
                self.remote.clear_highlights();
                true
            }
            Message::ImportFailed { message } => {
                self.ui.notice = Some(message.clone());
                actions.push(Action::Notice(message.clone()));
                false
            }
            Message::Chat { user_id, message, .. } => {
                actions.push(Action::ChatReceived { user_id: user_id.clone(), message: message.clone() });
                false
            }
            Message::Status { message } => {
                tracing::debug!(message, "server status");
                false
            }
            Message::JoinedRoom { room_id } => {
                tracing::debug!(room_id, "joined room");
                false
            }
            Message::CursorMove { user_id: None, .. }
            | Message::HighlightEnd { .. }
            | Message::JoinRoom { .. }
            | Message::LeaveRoom { .. }
            | Message::UpdateElements { .. }
            | Message::ClearCanvas { .. } => false,
        };
        if changed | self.remote.evict_stale(now_ms) {
            actions.push(Action::RenderNeeded);
        }
        actions
    }

    /// Drop stale remote cursors. Returns true when a redraw is needed.
    pub fn tick(&mut self, now_ms: f64) -> bool {
        self.remote.evict_stale(now_ms)
    }

    // --- Tool / mode ---

    pub fn set_tool(&mut self, tool: Tool) {
        self.ui.tool = tool;
        self.ui.wire_hover = None;
    }

    /// In read-only mode only panning and zooming are allowed.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.ui.read_only = read_only;
        if read_only {
            self.ui.selected.clear();
        }
    }

    pub fn set_viewport(&mut self, width_css: f64, height_css: f64, dpr: f64) {
        self.viewport_width = width_css;
        self.viewport_height = height_css;
        self.dpr = dpr;
    }

    // --- Input events ---

    pub fn on_pointer_down(&mut self, pointer_id: i32, screen: Point, button: Button, modifiers: Modifiers) -> Vec<Action> {
        self.pointers.insert(pointer_id, screen);

        let wants_pan = button == Button::Middle
            || self.ui.space_held
            || self.ui.ctrl_held
            || modifiers.ctrl
            || self.pointers.len() > 1;
        if wants_pan {
            let mut actions = self.abort_gesture();
            self.input = InputState::Panning { last_screen: self.pan_anchor(screen) };
            actions.push(Action::SetCursor("grabbing".into()));
            return actions;
        }
        if self.ui.read_only || button != Button::Primary || !self.input.is_idle() {
            return Vec::new();
        }

        let world = self.camera.screen_to_world(screen);
        match self.ui.tool {
            Tool::Selection => self.begin_selection(screen, world),
            Tool::Wire => self.begin_wiring(world),
            Tool::Eraser => {
                let mut marked = Vec::new();
                mark_under(&self.doc, &*self.measure, world, &mut marked);
                self.input = InputState::Erasing { marked, trail: vec![world] };
                vec![Action::RenderNeeded]
            }
            Tool::Laser => {
                self.input = InputState::Lasering { trail: vec![world] };
                vec![Action::RenderNeeded]
            }
            Tool::Highlighter => {
                let el = Element::highlighter(new_id(), world);
                let stroke_id = el.id.clone();
                self.remote.highlights.insert(stroke_id.clone(), el.clone());
                self.input = InputState::Highlighting { stroke_id };
                vec![Action::HighlightStarted(el), Action::RenderNeeded]
            }
            Tool::Text => {
                self.input = InputState::Placing { start: world };
                Vec::new()
            }
            Tool::Annotation => {
                self.input = InputState::PlacingAnnotation { start: world };
                Vec::new()
            }
            Tool::Rectangle | Tool::Diamond | Tool::Circle | Tool::Arrow | Tool::Line | Tool::Pencil => {
                self.begin_drawing(screen, world)
            }
        }
    }

    pub fn on_pointer_move(&mut self, pointer_id: i32, screen: Point, _modifiers: Modifiers) -> Vec<Action> {
        if let Some(p) = self.pointers.get_mut(&pointer_id) {
            *p = screen;
        }
        let world = self.camera.screen_to_world(screen);
        let anchor = self.pan_anchor(screen);
        let mut actions = vec![Action::CursorMoved(world)];
        let mut next = None;
        let m = &*self.measure;

        match &mut self.input {
            InputState::Idle => {
                if self.ui.tool != Tool::Wire {
                    return actions;
                }
                let hover = wire_hover_at(self.doc.elements(), world, None, m);
                if hover == self.ui.wire_hover {
                    return actions;
                }
                self.ui.wire_hover = hover;
            }
            InputState::Panning { last_screen } => {
                self.camera.pan_by(anchor.x - last_screen.x, anchor.y - last_screen.y);
                *last_screen = anchor;
            }
            InputState::Placing { start } | InputState::PlacingAnnotation { start } => {
                if distance(*start, world) > PLACING_CANCEL_DISTANCE {
                    next = Some(InputState::Idle);
                }
            }
            InputState::MultiSelecting { current, .. } => *current = world,
            InputState::Drawing { start, element } => match &mut element.shape {
                Shape::Rectangle(b) | Shape::Diamond(b) => {
                    b.width = world.x - start.world.x;
                    b.height = world.y - start.world.y;
                }
                Shape::Circle(c) => c.radius = distance(start.world, world),
                Shape::Line(l) | Shape::Arrow(l) => {
                    l.x2 = world.x;
                    l.y2 = world.y;
                }
                Shape::Pencil(p) => {
                    p.points.push(world);
                    actions.push(Action::StrokeUpdated { stroke_id: element.id.clone(), points: p.points.clone() });
                }
                Shape::Text(_) | Shape::Annotation(_) | Shape::Wire(_) => {}
            },
            InputState::Dragging { start } => {
                let (dx, dy) = (world.x - start.world.x, world.y - start.world.y);
                for original in &start.originals {
                    if self.doc.contains(&original.id) {
                        let mut el = original.clone();
                        move_element(&mut el, dx, dy);
                        self.doc.upsert(el);
                    }
                }
            }
            InputState::Resizing { start, handle, last_world } => {
                let current = start.originals.first().and_then(|o| self.doc.get(&o.id)).cloned();
                if let Some(mut el) = current {
                    let (dx, dy) = local_delta(&el, world.x - last_world.x, world.y - last_world.y);
                    resize_element(&mut el, *handle, dx, dy);
                    self.doc.upsert(el);
                }
                *last_world = world;
            }
            InputState::Rotating { start, center } => {
                if let Some(original) = start.originals.first().filter(|o| self.doc.contains(&o.id)) {
                    let mut el = original.clone();
                    el.rotation = Some(rotation_after_drag(*center, start.world, world, original.rotation_deg()));
                    self.doc.upsert(el);
                }
            }
            InputState::Curving { start } => {
                if let Some(original) = start.originals.first().filter(|o| self.doc.contains(&o.id)) {
                    let mut el = original.clone();
                    let grip = to_local(original, world, m);
                    let origin = Point::new(el.x, el.y);
                    if let Shape::Line(l) | Shape::Arrow(l) = &mut el.shape {
                        bend_line(origin, l, grip);
                    }
                    if let Some(patch) = diff(original, &el) {
                        actions.push(Action::CurveMoved(patch));
                    }
                    self.doc.upsert(el);
                }
            }
            InputState::Wiring { from_id, current, .. } => {
                *current = world;
                self.ui.wire_hover = wire_hover_at(self.doc.elements(), world, Some(from_id.as_str()), m);
            }
            InputState::Erasing { marked, trail } => {
                push_trail(trail, world);
                mark_under(&self.doc, m, world, marked);
            }
            InputState::Lasering { trail } => push_trail(trail, world),
            InputState::Highlighting { stroke_id } => {
                if let Some(Element { shape: Shape::Pencil(p), .. }) = self.remote.highlights.get_mut(stroke_id.as_str()) {
                    p.points.push(world);
                    actions.push(Action::HighlightUpdated { stroke_id: stroke_id.clone(), points: p.points.clone() });
                }
            }
        }

        if let Some(state) = next {
            self.input = state;
        }
        actions.push(Action::RenderNeeded);
        actions
    }

    pub fn on_pointer_up(&mut self, pointer_id: i32, screen: Point, _button: Button, _modifiers: Modifiers) -> Vec<Action> {
        self.pointers.remove(&pointer_id);
        let world = self.camera.screen_to_world(screen);

        match std::mem::take(&mut self.input) {
            InputState::Idle => Vec::new(),
            InputState::Panning { .. } => {
                if !self.pointers.is_empty() {
                    self.input = InputState::Panning { last_screen: self.pan_anchor(screen) };
                    return Vec::new();
                }
                let cursor = if self.ui.space_held { "grab" } else { "default" };
                vec![Action::SetCursor(cursor.into())]
            }
            InputState::Drawing { start, element } => self.commit_drawing(start, element),
            InputState::Dragging { start }
            | InputState::Resizing { start, .. }
            | InputState::Rotating { start, .. }
            | InputState::Curving { start } => self.commit_transform(start, screen),
            InputState::Placing { start } => self.place_text(start),
            InputState::PlacingAnnotation { start } => self.place_annotation(start),
            InputState::Wiring { from_id, from_handle, from_point, .. } => {
                self.commit_wire(&from_id, from_handle, from_point, world)
            }
            InputState::Erasing { marked, .. } => {
                let mut actions = self.delete_elements(&marked);
                actions.extend(self.revert_tool());
                actions.push(Action::RenderNeeded);
                actions
            }
            InputState::Lasering { .. } => vec![Action::RenderNeeded],
            InputState::Highlighting { stroke_id } => vec![Action::HighlightEnded { stroke_id }, Action::RenderNeeded],
            InputState::MultiSelecting { start, current } => {
                let rect = normalize_rect(start.x, start.y, current.x - start.x, current.y - start.y);
                let m = &*self.measure;
                self.ui.selected = self
                    .doc
                    .elements()
                    .iter()
                    .filter(|el| intersects_rect(el, &rect, m))
                    .map(|el| el.id.clone())
                    .collect();
                vec![Action::RenderNeeded]
            }
        }
    }

    /// A pointer was lost without a release (pointercancel, or released
    /// outside the canvas). The gesture it drove is abandoned.
    pub fn on_pointer_cancel(&mut self, pointer_id: i32) -> Vec<Action> {
        if self.pointers.remove(&pointer_id).is_none() {
            return Vec::new();
        }
        if let InputState::Panning { .. } = self.input {
            if !self.pointers.is_empty() {
                return Vec::new();
            }
        }
        let mut actions = self.abort_gesture();
        actions.push(Action::SetCursor("default".into()));
        actions.push(Action::RenderNeeded);
        actions
    }

    /// Ctrl/Cmd + wheel zooms about the pointer; a plain wheel pans.
    pub fn on_wheel(&mut self, screen: Point, delta: WheelDelta, modifiers: Modifiers) -> Vec<Action> {
        if modifiers.command() {
            let factor = if delta.dy < 0.0 { ZOOM_STEP } else { 1.0 / ZOOM_STEP };
            self.camera.zoom_at(screen, factor);
        } else {
            self.camera.pan_by(-delta.dx, -delta.dy);
        }
        vec![Action::RenderNeeded]
    }

    pub fn on_key_down(&mut self, key: &Key, modifiers: Modifiers) -> Vec<Action> {
        if key.is(" ") {
            self.ui.space_held = true;
            return vec![Action::SetCursor("grab".into())];
        }
        if key.is("Control") {
            self.ui.ctrl_held = true;
            return Vec::new();
        }
        if key.is("Escape") {
            let mut actions = self.abort_gesture();
            self.ui.selected.clear();
            actions.push(Action::RenderNeeded);
            return actions;
        }
        if self.ui.read_only || !self.input.is_idle() {
            return Vec::new();
        }
        if key.is("Delete") || key.is("Backspace") {
            return self.delete_selected();
        }
        if modifiers.command() && key.is("z") {
            return if modifiers.shift { self.redo() } else { self.undo() };
        }
        if modifiers.command() && key.is("y") {
            return self.redo();
        }
        Vec::new()
    }

    pub fn on_key_up(&mut self, key: &Key, _modifiers: Modifiers) -> Vec<Action> {
        if key.is(" ") {
            self.ui.space_held = false;
            if !matches!(self.input, InputState::Panning { .. }) {
                return vec![Action::SetCursor("default".into())];
            }
        } else if key.is("Control") {
            self.ui.ctrl_held = false;
        }
        Vec::new()
    }

    // --- Editing operations ---

    /// Commit editor text. Empty text deletes the element.
    pub fn set_text(&mut self, id: &str, text: &str) -> Vec<Action> {
        if text.trim().is_empty() {
            return self.delete_elements(&[id.to_owned()]);
        }
        self.edit(id, |el| {
            if let Shape::Text(t) = &mut el.shape {
                t.text = text.to_owned();
            } else {
                el.style.label = Some(text.to_owned());
            }
        })
    }

    /// Append a comment by the local user, creating the annotation if it is
    /// not on the canvas yet.
    pub fn add_comment(&mut self, annotation: &Element, text: &str, timestamp_ms: i64) -> Vec<Action> {
        let comment = Comment {
            id: new_id(),
            user_id: self.user_id.clone(),
            user_name: self.user_name.clone(),
            text: text.to_owned(),
            timestamp: timestamp_ms,
        };
        if self.doc.contains(&annotation.id) {
            return self.edit(&annotation.id, |el| {
                if let Shape::Annotation(a) = &mut el.shape {
                    a.comments.push(comment.clone());
                }
            });
        }
        let mut el = annotation.clone();
        let Shape::Annotation(a) = &mut el.shape else {
            return Vec::new();
        };
        a.comments.push(comment);
        self.history.record(self.doc.snapshot());
        self.doc.insert(el.clone());
        vec![Action::ElementCreated(el), Action::RenderNeeded]
    }

    pub fn set_annotation_state(&mut self, id: &str, state: AnnotationState) -> Vec<Action> {
        self.edit(id, |el| {
            if let Shape::Annotation(a) = &mut el.shape {
                a.annotation_state = state;
            }
        })
    }

    /// Overlay `style` onto the selection and onto the style for new elements.
    pub fn apply_style(&mut self, style: &Style) -> Vec<Action> {
        self.style.overlay(style);
        let ids = self.ui.selected.clone();
        self.edit_many(&ids, |el| el.style.overlay(style))
    }

    /// Switch the selected wires between curved and orthogonal routing.
    pub fn set_wire_routing(&mut self, routing: WireRouting) -> Vec<Action> {
        let ids = self.ui.selected.clone();
        self.edit_many(&ids, |el| {
            if let Shape::Wire(w) = &mut el.shape {
                w.routing = routing;
            }
        })
    }

    pub fn delete_selected(&mut self) -> Vec<Action> {
        let ids = self.ui.selected.clone();
        self.delete_elements(&ids)
    }

    /// Remove elements and every wire attached to them, as one undo step.
    pub fn delete_elements(&mut self, ids: &[ElementId]) -> Vec<Action> {
        let present: Vec<ElementId> = ids.iter().filter(|id| self.doc.contains(id)).cloned().collect();
        if present.is_empty() {
            return Vec::new();
        }
        self.history.record(self.doc.snapshot());
        let removed = self.doc.remove_cascade(&present);
        self.prune_selection();
        vec![Action::ElementsDeleted(removed), Action::RenderNeeded]
    }

    pub fn clear_canvas(&mut self) -> Vec<Action> {
        if self.ui.read_only {
            return Vec::new();
        }
        self.history.record(self.doc.snapshot());
        self.doc.clear();
        self.ui.selected.clear();
        vec![Action::CanvasCleared, Action::RenderNeeded]
    }

    pub fn clear_highlights(&mut self) -> Vec<Action> {
        self.remote.clear_highlights();
        vec![Action::HighlightsCleared, Action::RenderNeeded]
    }

    pub fn undo(&mut self) -> Vec<Action> {
        let Some(previous) = self.history.undo(self.doc.snapshot()) else {
            return Vec::new();
        };
        self.replace_doc(previous)
    }

    pub fn redo(&mut self) -> Vec<Action> {
        let Some(next) = self.history.redo(self.doc.snapshot()) else {
            return Vec::new();
        };
        self.replace_doc(next)
    }

    /// Replace the board with an export document, as one undo step.
    pub fn import(&mut self, text: &str) -> Vec<Action> {
        match import_json(text, new_id) {
            Ok(elements) => {
                self.history.record(self.doc.snapshot());
                self.replace_doc(elements)
            }
            Err(e) => {
                tracing::warn!(error = %e, "import rejected");
                let notice = e.to_string();
                self.ui.notice = Some(notice.clone());
                vec![Action::Notice(notice)]
            }
        }
    }

    /// The board as an export document.
    ///
    /// # Errors
    ///
    /// Fails only if an element cannot be serialised.
    pub fn export(&self) -> Result<String, serde_json::Error> {
        export_json(self.doc.elements())
    }

    /// World-space frame for an image export of the whole board.
    #[must_use]
    pub fn export_frame(&self) -> Option<Rect> {
        export_bounds(self.doc.elements(), self.measure())
    }

    // --- Queries ---

    #[must_use]
    pub fn selection(&self) -> &[ElementId] {
        &self.ui.selected
    }

    #[must_use]
    pub fn camera(&self) -> Camera {
        self.camera
    }

    #[must_use]
    pub fn element(&self, id: &str) -> Option<&Element> {
        self.doc.get(id)
    }

    /// The element being drawn, which is not in the document until release.
    #[must_use]
    pub fn drawing_element(&self) -> Option<&Element> {
        match &self.input {
            InputState::Drawing { element, .. } => Some(element),
            _ => None,
        }
    }

    /// Angle in whole degrees of the line or arrow being drawn.
    #[must_use]
    pub fn drawing_angle(&self) -> Option<f64> {
        let el = self.drawing_element()?;
        let (Shape::Line(l) | Shape::Arrow(l)) = &el.shape else {
            return None;
        };
        let (dx, dy) = (l.x2 - el.x, l.y2 - el.y);
        if dx == 0.0 && dy == 0.0 {
            return None;
        }
        Some(dy.atan2(dx).to_degrees().round())
    }

    /// Temporary line from the captured handle to the pointer while wiring.
    #[must_use]
    pub fn wiring_line(&self) -> Option<(Point, Point)> {
        match &self.input {
            InputState::Wiring { from_point, current, .. } => Some((*from_point, *current)),
            _ => None,
        }
    }

    /// Elements marked by the eraser, drawn ghosted until release.
    #[must_use]
    pub fn erasing_ids(&self) -> &[ElementId] {
        match &self.input {
            InputState::Erasing { marked, .. } => marked,
            _ => &[],
        }
    }

    /// Laser or eraser trail in world coordinates.
    #[must_use]
    pub fn trail(&self) -> &[Point] {
        match &self.input {
            InputState::Lasering { trail } | InputState::Erasing { trail, .. } => trail,
            _ => &[],
        }
    }

    // =============================================================
    // Gesture helpers
    // =============================================================

    /// Midpoint of the first two pointers, the single pointer, or `fallback`.
    fn pan_anchor(&self, fallback: Point) -> Point {
        let mut down = self.pointers.values();
        match (down.next(), down.next()) {
            (Some(a), Some(b)) => midpoint(*a, *b),
            (Some(a), None) => *a,
            _ => fallback,
        }
    }

    fn gesture_start(&self, screen: Point, world: Point, originals: Vec<Element>) -> GestureStart {
        GestureStart { screen, world, doc_before: self.doc.snapshot(), originals }
    }

    fn begin_selection(&mut self, screen: Point, world: Point) -> Vec<Action> {
        let m = &*self.measure;

        // 1. A handle of the single selected element.
        if let [id] = self.ui.selected.as_slice() {
            if let Some(el) = self.doc.get(id) {
                if let Some(handle) = hit_test_handle(el, world, false, m) {
                    let center = element_center(el, m);
                    let start = self.gesture_start(screen, world, vec![el.clone()]);
                    self.input = match handle {
                        HandleType::Rotation => InputState::Rotating { start, center },
                        HandleType::Curve => InputState::Curving { start },
                        _ => InputState::Resizing { start, handle, last_world: world },
                    };
                    return vec![Action::RenderNeeded];
                }
            }
        }

        // 2. An element under the pointer; wires only when nothing else is hit.
        let hit = element_at_position(self.doc.elements(), world, HOVER_LENIENCY, false, m)
            .or_else(|| {
                element_at_position(self.doc.elements(), world, LINE_HIT_THRESHOLD, true, m).filter(|el| el.is_wire())
            })
            .cloned();
        if let Some(el) = hit {
            if matches!(el.shape, Shape::Annotation(_)) {
                return vec![Action::ElementClicked(el)];
            }
            if !self.ui.is_selected(&el.id) {
                self.ui.selected = vec![el.id.clone()];
            }
            let originals =
                self.ui.selected.iter().filter_map(|id| self.doc.get(id)).cloned().collect::<Vec<_>>();
            self.input = InputState::Dragging { start: self.gesture_start(screen, world, originals) };
            return vec![Action::RenderNeeded];
        }

        // 3. Empty space: rubber band.
        self.ui.selected.clear();
        self.input = InputState::MultiSelecting { start: world, current: world };
        vec![Action::RenderNeeded]
    }

    fn begin_drawing(&mut self, screen: Point, world: Point) -> Vec<Action> {
        let id = new_id();
        let mut element = match self.ui.tool {
            Tool::Rectangle => Element::rectangle(id, world.x, world.y, 0.0, 0.0),
            Tool::Diamond => Element::diamond(id, world.x, world.y, 0.0, 0.0),
            Tool::Circle => Element::circle(id, world.x, world.y, 0.0),
            Tool::Arrow => Element::arrow(id, world.x, world.y, world.x, world.y),
            Tool::Line => Element::line(id, world.x, world.y, world.x, world.y),
            _ => Element::pencil(id, vec![world]),
        };
        element.style.overlay(&self.style);
        self.ui.selected = vec![element.id.clone()];

        let mut actions = Vec::new();
        if matches!(element.shape, Shape::Pencil(_)) {
            actions.push(Action::StrokeStarted(element.clone()));
        }
        self.input = InputState::Drawing { start: self.gesture_start(screen, world, Vec::new()), element };
        actions.push(Action::RenderNeeded);
        actions
    }

    fn begin_wiring(&mut self, world: Point) -> Vec<Action> {
        let m = &*self.measure;
        let Some(el) = element_at_position(self.doc.elements(), world, HOVER_LENIENCY, false, m) else {
            return Vec::new();
        };
        let Some(handle) = hit_test_handle(el, world, true, m).filter(|h| *h != HandleType::Rotation) else {
            return Vec::new();
        };
        let Some(from_point) = crate::hit::handle_point(el, handle, m) else {
            return Vec::new();
        };
        self.input = InputState::Wiring { from_id: el.id.clone(), from_handle: handle, from_point, current: world };
        vec![Action::RenderNeeded]
    }

    /// Cancel the active gesture, undoing whatever it changed so far.
    fn abort_gesture(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        match std::mem::take(&mut self.input) {
            InputState::Drawing { element, .. } => {
                if matches!(element.shape, Shape::Pencil(_)) {
                    actions.push(Action::StrokeEnded { stroke_id: element.id, points: Vec::new() });
                }
                self.ui.selected.clear();
            }
            InputState::Dragging { start }
            | InputState::Resizing { start, .. }
            | InputState::Rotating { start, .. }
            | InputState::Curving { start } => self.restore(start.originals),
            InputState::Highlighting { stroke_id } => actions.push(Action::HighlightEnded { stroke_id }),
            InputState::Wiring { .. } => self.ui.wire_hover = None,
            _ => {}
        }
        actions
    }

    /// Put elements back the way they were, unless they were removed meanwhile.
    fn restore(&mut self, originals: Vec<Element>) {
        for el in originals {
            if self.doc.contains(&el.id) {
                self.doc.upsert(el);
            }
        }
    }

    fn commit_drawing(&mut self, start: GestureStart, mut element: Element) -> Vec<Action> {
        let mut actions = Vec::new();
        let keep = large_enough(&element);

        match &mut element.shape {
            Shape::Pencil(p) => {
                if p.points.len() > 1 {
                    p.points = simplify_path(&p.points, SIMPLIFY_EPSILON);
                }
                actions.push(Action::StrokeEnded { stroke_id: element.id.clone(), points: p.points.clone() });
            }
            Shape::Rectangle(b) | Shape::Diamond(b) => {
                let r = normalize_rect(element.x, element.y, b.width, b.height);
                (element.x, element.y, b.width, b.height) = (r.x, r.y, r.width, r.height);
            }
            _ => {}
        }

        if keep {
            // Keep the local copy identical to what peers and storage receive.
            let element = round_element(&element, PERSIST_PRECISION);
            self.history.record(start.doc_before);
            self.ui.selected = vec![element.id.clone()];
            self.doc.insert(element.clone());
            actions.push(Action::ElementCreated(element));
        } else {
            tracing::debug!(kind = element.shape.kind_name(), "undersized element discarded");
            self.ui.selected.clear();
        }
        if self.ui.tool != Tool::Pencil {
            actions.extend(self.revert_tool());
        }
        actions.push(Action::RenderNeeded);
        actions
    }

    fn commit_transform(&mut self, start: GestureStart, screen: Point) -> Vec<Action> {
        if distance(screen, start.screen) < CLICK_SLOP_PX {
            self.restore(start.originals);
            return vec![Action::RenderNeeded];
        }
        let patches: Vec<Value> = start
            .originals
            .iter()
            .filter_map(|before| diff(before, self.doc.get(&before.id)?))
            .collect();
        if patches.is_empty() {
            return vec![Action::RenderNeeded];
        }
        self.history.record(start.doc_before);
        vec![Action::ElementsUpdated(patches), Action::RenderNeeded]
    }

    fn place_text(&mut self, at: Point) -> Vec<Action> {
        let mut el = Element::text(new_id(), at.x, at.y, "");
        el.style.overlay(&self.style);
        el.style.fill = None;
        self.history.record(self.doc.snapshot());
        self.doc.insert(el.clone());
        self.ui.selected = vec![el.id.clone()];
        let mut actions =
            vec![Action::EditTextRequested { id: el.id.clone(), text: String::new() }, Action::ElementCreated(el)];
        actions.extend(self.revert_tool());
        actions.push(Action::RenderNeeded);
        actions
    }

    fn place_annotation(&mut self, at: Point) -> Vec<Action> {
        let el = Element::annotation(new_id(), at.x, at.y, &self.user_id, &self.user_name);
        let mut actions = vec![Action::ElementClicked(el)];
        actions.extend(self.revert_tool());
        actions
    }

    fn commit_wire(&mut self, from_id: &str, from_handle: HandleType, from_point: Point, world: Point) -> Vec<Action> {
        self.ui.wire_hover = None;
        let target = wire_hover_at(self.doc.elements(), world, Some(from_id), &*self.measure);
        let mut actions = Vec::new();
        if let Some(WireHover { element_id, handle: Some(end_handle) }) = target {
            let mut wire = Element::wire(new_id(), from_point, (from_id, from_handle), (&element_id, end_handle));
            wire.style.stroke.clone_from(&self.style.stroke);
            wire.style.stroke_width = self.style.stroke_width;
            self.history.record(self.doc.snapshot());
            self.ui.selected = vec![wire.id.clone()];
            self.doc.insert(wire.clone());
            actions.push(Action::ElementCreated(wire));
        } else {
            tracing::debug!(from_id, "wire released away from a handle; cancelled");
        }
        actions.extend(self.revert_tool());
        actions.push(Action::RenderNeeded);
        actions
    }

    fn revert_tool(&mut self) -> Vec<Action> {
        if self.ui.tool == Tool::Selection {
            return Vec::new();
        }
        self.set_tool(Tool::Selection);
        vec![Action::ToolChanged(Tool::Selection)]
    }

    fn replace_doc(&mut self, elements: Vec<Element>) -> Vec<Action> {
        self.input = InputState::Idle;
        self.doc.replace_all(elements);
        self.prune_selection();
        vec![Action::ElementsReplaced(self.doc.snapshot()), Action::RenderNeeded]
    }

    fn prune_selection(&mut self) {
        let doc = &self.doc;
        self.ui.selected.retain(|id| doc.contains(id));
    }

    /// Mutate one element as a single undo step and report the patch.
    fn edit(&mut self, id: &str, f: impl Fn(&mut Element)) -> Vec<Action> {
        self.edit_many(&[id.to_owned()], f)
    }

    fn edit_many(&mut self, ids: &[ElementId], f: impl Fn(&mut Element)) -> Vec<Action> {
        let before = self.doc.snapshot();
        let mut patches = Vec::new();
        for id in ids {
            let Some(original) = self.doc.get(id) else {
                continue;
            };
            let mut el = original.clone();
            f(&mut el);
            if let Some(patch) = diff(original, &el) {
                patches.push(patch);
                self.doc.upsert(el);
            }
        }
        if patches.is_empty() {
            return Vec::new();
        }
        self.history.record(before);
        vec![Action::ElementsUpdated(patches), Action::RenderNeeded]
    }
}

// =============================================================
// Free helpers
// =============================================================

/// Minimum-size rule applied when a drawing gesture completes.
fn large_enough(el: &Element) -> bool {
    match &el.shape {
        Shape::Rectangle(b) | Shape::Diamond(b) => {
            b.width.abs() > MIN_SIZE_THRESHOLD && b.height.abs() > MIN_SIZE_THRESHOLD
        }
        Shape::Circle(c) => c.radius > MIN_SIZE_THRESHOLD,
        Shape::Line(l) | Shape::Arrow(l) => distance(Point::new(el.x, el.y), Point::new(l.x2, l.y2)) > MIN_SIZE_THRESHOLD,
        Shape::Pencil(p) => p.points.len() > 2,
        Shape::Text(_) | Shape::Annotation(_) | Shape::Wire(_) => true,
    }
}

/// Element and wire-capable handle under `world`, skipping `exclude`.
fn wire_hover_at(elements: &[Element], world: Point, exclude: Option<&str>, m: &dyn TextMeasure) -> Option<WireHover> {
    let el = element_at_position(elements, world, HOVER_LENIENCY, false, m)?;
    if exclude == Some(el.id.as_str()) {
        return None;
    }
    let handle = hit_test_handle(el, world, true, m).filter(|h| *h != HandleType::Rotation);
    Some(WireHover { element_id: el.id.clone(), handle })
}

/// Mark the element under the eraser, wires included.
fn mark_under(doc: &DocStore, m: &dyn TextMeasure, world: Point, marked: &mut Vec<ElementId>) {
    if let Some(el) = element_at_position(doc.elements(), world, 0.0, true, m) {
        if !marked.contains(&el.id) {
            marked.push(el.id.clone());
        }
    }
}

fn push_trail(trail: &mut Vec<Point>, p: Point) {
    trail.push(p);
    if trail.len() > TRAIL_POINTS {
        trail.remove(0);
    }
}

// =============================================================
// Engine
// =============================================================

/// The full canvas engine. Wraps `EngineCore` and owns the browser canvas element.
pub struct Engine {
    canvas: HtmlCanvasElement,
    pub core: EngineCore,
    pub session: Option<Session>,
}

impl Engine {
    /// Create a new engine bound to the given canvas element.
    #[must_use]
    pub fn new(canvas: HtmlCanvasElement, user_id: &str, user_name: &str) -> Self {
        let mut core = EngineCore::with_user(user_id, user_name);
        if let Some(ctx) = context_2d(&canvas) {
            core.set_measure(Box::new(CanvasTextMeasure::new(ctx)));
        }
        Self { canvas, core, session: None }
    }

    /// Enter a room. Returns the encoded `join_room` message to send.
    pub fn join(&mut self, room_id: &str) -> Option<String> {
        self.core.remote.clear();
        let session = Session::new(room_id, &self.core.user_id, &self.core.user_name);
        let msg = encode(&session.join_message());
        self.session = Some(session);
        msg
    }

    /// Leave the current room. Returns the encoded `leave_room` message.
    pub fn leave(&mut self) -> Option<String> {
        let session = self.session.take()?;
        self.core.remote.clear();
        encode(&session.leave_message())
    }

    /// Encode the wire messages for a batch of actions.
    pub fn outbound(&mut self, actions: &[Action]) -> Vec<String> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        let now = js_sys::Date::now();
        actions.iter().filter_map(|a| session.outbound(a, now)).filter_map(|m| encode(&m)).collect()
    }

    /// Toolbar state for the undo button.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.core.history.can_undo()
    }

    /// Toolbar state for the redo button.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.core.history.can_redo()
    }

    pub fn chat(&self, text: &str) -> Option<String> {
        encode(&self.session.as_ref()?.chat(text))
    }

    /// Apply one socket frame.
    pub fn receive(&mut self, text: &str) -> Vec<Action> {
        let msg = match protocol::parse(text) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(error = %e, "inbound frame ignored");
                return Vec::new();
            }
        };
        if !self.session.as_ref().is_some_and(|s| s.accepts(&msg)) {
            tracing::debug!(kind = msg.kind(), "message for another room ignored");
            return Vec::new();
        }
        self.core.apply_remote(&msg, js_sys::Date::now())
    }

    // --- Delegated input ---

    pub fn on_pointer_down(&mut self, pointer_id: i32, screen: Point, button: Button, modifiers: Modifiers) -> Vec<Action> {
        self.core.on_pointer_down(pointer_id, screen, button, modifiers)
    }

    pub fn on_pointer_move(&mut self, pointer_id: i32, screen: Point, modifiers: Modifiers) -> Vec<Action> {
        self.core.on_pointer_move(pointer_id, screen, modifiers)
    }

    pub fn on_pointer_up(&mut self, pointer_id: i32, screen: Point, button: Button, modifiers: Modifiers) -> Vec<Action> {
        self.core.on_pointer_up(pointer_id, screen, button, modifiers)
    }

    pub fn on_pointer_cancel(&mut self, pointer_id: i32) -> Vec<Action> {
        self.core.on_pointer_cancel(pointer_id)
    }

    pub fn on_wheel(&mut self, screen: Point, delta: WheelDelta, modifiers: Modifiers) -> Vec<Action> {
        self.core.on_wheel(screen, delta, modifiers)
    }

    pub fn on_key_down(&mut self, key: &Key, modifiers: Modifiers) -> Vec<Action> {
        self.core.on_key_down(key, modifiers)
    }

    pub fn on_key_up(&mut self, key: &Key, modifiers: Modifiers) -> Vec<Action> {
        self.core.on_key_up(key, modifiers)
    }

    /// Update viewport dimensions and device pixel ratio, resizing the backing store.
    pub fn set_viewport(&mut self, width_css: f64, height_css: f64, dpr: f64) {
        self.core.set_viewport(width_css, height_css, dpr);
        self.canvas.set_width(backing_size(width_css * dpr));
        self.canvas.set_height(backing_size(height_css * dpr));
    }

    // --- Render ---

    /// Draw the current state to the canvas.
    pub fn render(&mut self) {
        self.core.tick(js_sys::Date::now());
        let Some(ctx) = context_2d(&self.canvas) else {
            tracing::warn!("canvas has no 2d context");
            return;
        };
        if let Err(e) = render::draw(&ctx, &self.core) {
            tracing::warn!(error = ?e, "render failed");
        }
    }
}

fn encode(msg: &Message) -> Option<String> {
    match msg.encode() {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::warn!(kind = msg.kind(), error = %e, "message not encodable");
            None
        }
    }
}

fn context_2d(canvas: &HtmlCanvasElement) -> Option<CanvasRenderingContext2d> {
    match canvas.get_context("2d") {
        Ok(Some(obj)) => match obj.dyn_into::<CanvasRenderingContext2d>() {
            Ok(ctx) => Some(ctx),
            Err(_) => None,
        },
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn backing_size(px: f64) -> u32 {
    px.round().max(0.0) as u32
}
