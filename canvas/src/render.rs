//! Rendering: draws the full canvas scene to a 2D context.
//!
//! This module is the only place that touches [`web_sys::CanvasRenderingContext2d`].
//! It reads the engine state and produces pixels; it never mutates anything.
//!
//! LAYERS
//! ======
//! 1. Document elements in z-order, eraser-marked ones ghosted.
//! 2. Remote in-progress strokes, then highlighter scribbles.
//! 3. The element being drawn.
//! 4. Selection outline and handles, rubber band, wiring line, trails.
//! 5. Remote cursors, in screen space so they keep a constant size.
//!
//! All fallible `Canvas2D` calls propagate errors via `Result<(), JsValue>`.
//! The top-level caller ([`crate::engine::Engine::render`]) handles the result.

use std::f64::consts::PI;

use wasm_bindgen::JsValue;
use web_sys::CanvasRenderingContext2d;

use crate::bounds::{element_center, local_bounds};
use crate::consts::{DEFAULT_STROKE, HANDLE_HALF};
use crate::element::{AnnotationState, Element, HandleType, LineShape, Shape, TextShape};
use crate::engine::EngineCore;
use crate::geometry::{Point, Rect};
use crate::hit::handles;
use crate::input::InputState;
use crate::text::{ApproxTextMeasure, TextMeasure};
use crate::wire::{WirePathKind, resolve_wire};

/// Arrowhead length in world units.
const ARROW_SIZE: f64 = 10.0;

/// Arrowhead half-angle in radians (~30°).
const ARROW_ANGLE: f64 = PI / 6.0;

const DEFAULT_STROKE_WIDTH: f64 = 2.0;

/// Selection dash segment length in screen pixels.
const SELECTION_DASH_PX: f64 = 4.0;
const SELECTION_COLOR: &str = "#1E90FF";

/// Alpha multiplier for elements the eraser has marked.
const GHOST_ALPHA: f64 = 0.3;

const LASER_COLOR: &str = "rgba(255, 40, 40, 0.8)";
const ERASER_TRAIL_COLOR: &str = "rgba(120, 120, 120, 0.5)";
const CURSOR_COLOR: &str = "#E8590C";

/// Canvas2D-backed text measurement for the browser build.
pub struct CanvasTextMeasure {
    ctx: CanvasRenderingContext2d,
}

impl CanvasTextMeasure {
    #[must_use]
    pub fn new(ctx: CanvasRenderingContext2d) -> Self {
        Self { ctx }
    }
}

impl TextMeasure for CanvasTextMeasure {
    fn line_width(&self, line: &str, font_size: f64, font_family: &str) -> f64 {
        self.ctx.save();
        self.ctx.set_font(&font(font_size, font_family));
        let width = match self.ctx.measure_text(line) {
            Ok(metrics) => metrics.width(),
            Err(_) => ApproxTextMeasure::default().line_width(line, font_size, font_family),
        };
        self.ctx.restore();
        width
    }
}

/// Draw the full scene.
///
/// # Errors
///
/// Returns `Err` if any `Canvas2D` call fails (e.g. invalid context state).
pub fn draw(ctx: &CanvasRenderingContext2d, core: &EngineCore) -> Result<(), JsValue> {
    let camera = core.camera();
    let m = core.measure();
    let elements = core.doc.elements();

    // Layer 1: clear and set up the view transform.
    ctx.set_transform(core.dpr, 0.0, 0.0, core.dpr, 0.0, 0.0)?;
    ctx.clear_rect(0.0, 0.0, core.viewport_width, core.viewport_height);
    ctx.translate(camera.offset_x, camera.offset_y)?;
    ctx.scale(camera.scale, camera.scale)?;

    let ghosted = core.erasing_ids();
    for el in elements {
        let alpha = if ghosted.contains(&el.id) { GHOST_ALPHA } else { 1.0 };
        draw_element(ctx, el, elements, m, alpha)?;
    }

    // Layer 2: remote ephemera.
    for el in core.remote.strokes.values().chain(core.remote.highlights.values()) {
        draw_element(ctx, el, elements, m, 1.0)?;
    }

    // Layer 3: drawing preview.
    if let Some(el) = core.drawing_element() {
        draw_element(ctx, el, elements, m, 1.0)?;
    }

    // Layer 4: interaction overlays.
    let show_handles = core.selection().len() == 1;
    for id in core.selection() {
        if let Some(el) = core.element(id) {
            draw_selection(ctx, el, elements, m, camera.scale, show_handles)?;
        }
    }
    if let Some(rect) = core.input.selection_rect() {
        draw_rubber_band(ctx, rect, camera.scale)?;
    }
    if let Some((from, to)) = core.wiring_line() {
        draw_wiring_line(ctx, from, to, camera.scale)?;
    }
    if let Some(hover) = &core.ui.wire_hover {
        if let Some(el) = core.element(&hover.element_id) {
            draw_wire_targets(ctx, el, m, camera.scale)?;
        }
    }
    let trail_color = match core.input {
        InputState::Lasering { .. } => Some(LASER_COLOR),
        InputState::Erasing { .. } => Some(ERASER_TRAIL_COLOR),
        _ => None,
    };
    if let Some(color) = trail_color {
        draw_trail(ctx, core.trail(), color, camera.scale);
    }

    // Layer 5: remote cursors in screen space.
    ctx.set_transform(core.dpr, 0.0, 0.0, core.dpr, 0.0, 0.0)?;
    for cursor in core.remote.cursors.values() {
        let at = camera.world_to_screen(cursor.at);
        draw_cursor(ctx, at, cursor.user_name.as_deref())?;
    }
    if let (Some(angle), Some(el)) = (core.drawing_angle(), core.drawing_element()) {
        if let Shape::Line(l) | Shape::Arrow(l) = &el.shape {
            draw_angle_label(ctx, camera.world_to_screen(Point::new(l.x2, l.y2)), angle)?;
        }
    }

    Ok(())
}

// =============================================================
// Element dispatch
// =============================================================

fn draw_element(
    ctx: &CanvasRenderingContext2d,
    el: &Element,
    elements: &[Element],
    m: &dyn TextMeasure,
    alpha: f64,
) -> Result<(), JsValue> {
    ctx.save();
    ctx.set_global_alpha(el.style.opacity.unwrap_or(1.0) * alpha);
    ctx.set_stroke_style_str(stroke_color(el));
    ctx.set_line_width(el.style.stroke_width.unwrap_or(DEFAULT_STROKE_WIDTH));
    ctx.set_line_cap("round");
    ctx.set_line_join("round");

    // Wires take their geometry from other elements and are never rotated.
    if let Shape::Wire(_) = el.shape {
        draw_wire(ctx, el, elements, m)?;
        ctx.restore();
        return Ok(());
    }

    rotate_about_center(ctx, el, m)?;
    match &el.shape {
        Shape::Rectangle(_) => {
            let r = local_bounds(el, m);
            if let Some(fill) = &el.style.fill {
                ctx.set_fill_style_str(fill);
                ctx.fill_rect(r.x, r.y, r.width, r.height);
            }
            ctx.stroke_rect(r.x, r.y, r.width, r.height);
        }
        Shape::Diamond(_) => {
            let r = local_bounds(el, m);
            let c = r.center();
            ctx.begin_path();
            ctx.move_to(r.x, c.y);
            ctx.line_to(c.x, r.y);
            ctx.line_to(r.right(), c.y);
            ctx.line_to(c.x, r.bottom());
            ctx.close_path();
            fill_and_stroke(ctx, el);
        }
        Shape::Circle(c) => {
            ctx.begin_path();
            ctx.arc(el.x, el.y, c.radius.abs(), 0.0, 2.0 * PI)?;
            fill_and_stroke(ctx, el);
        }
        Shape::Line(l) => draw_line(ctx, el, l, false),
        Shape::Arrow(l) => draw_line(ctx, el, l, true),
        Shape::Text(t) => draw_text(ctx, el, t)?,
        Shape::Pencil(p) => draw_polyline(ctx, &p.points),
        Shape::Annotation(a) => {
            let r = local_bounds(el, m);
            let color = match a.annotation_state {
                AnnotationState::Open => "#F5A623",
                AnnotationState::Resolved => "#7ED321",
            };
            ctx.set_fill_style_str(color);
            ctx.fill_rect(r.x, r.y, r.width, r.height);
            ctx.stroke_rect(r.x, r.y, r.width, r.height);
            if !a.comments.is_empty() {
                ctx.set_fill_style_str("#fff");
                ctx.set_text_align("center");
                ctx.set_text_baseline("middle");
                ctx.set_font(&font(r.height * 0.5, "sans-serif"));
                ctx.fill_text(&a.comments.len().to_string(), r.center().x, r.center().y)?;
            }
        }
        Shape::Wire(_) => {}
    }
    draw_label(ctx, el, m)?;
    ctx.restore();
    Ok(())
}

fn draw_line(ctx: &CanvasRenderingContext2d, el: &Element, l: &LineShape, arrowhead: bool) {
    let start = Point::new(el.x, el.y);
    let end = Point::new(l.x2, l.y2);
    ctx.begin_path();
    ctx.move_to(start.x, start.y);
    let toward_end = match l.control_point() {
        Some(cp) => {
            ctx.quadratic_curve_to(cp.x, cp.y, end.x, end.y);
            cp
        }
        None => {
            ctx.line_to(end.x, end.y);
            start
        }
    };
    ctx.stroke();
    if arrowhead {
        ctx.set_fill_style_str(stroke_color(el));
        draw_arrowhead(ctx, end, (end.y - toward_end.y).atan2(end.x - toward_end.x));
    }
}

fn draw_wire(ctx: &CanvasRenderingContext2d, el: &Element, elements: &[Element], m: &dyn TextMeasure) -> Result<(), JsValue> {
    let Some(path) = resolve_wire(el, elements, m) else {
        return Ok(());
    };
    let toward_end = match &path.kind {
        WirePathKind::Curve { cp1, cp2 } => {
            ctx.begin_path();
            ctx.move_to(path.start.x, path.start.y);
            ctx.bezier_curve_to(cp1.x, cp1.y, cp2.x, cp2.y, path.end.x, path.end.y);
            ctx.stroke();
            *cp2
        }
        WirePathKind::Orthogonal(points) => {
            draw_polyline(ctx, points);
            points.iter().rev().nth(1).copied().unwrap_or(path.start)
        }
    };
    if toward_end != path.end {
        ctx.set_fill_style_str(stroke_color(el));
        draw_arrowhead(ctx, path.end, (path.end.y - toward_end.y).atan2(path.end.x - toward_end.x));
    }
    Ok(())
}

fn draw_polyline(ctx: &CanvasRenderingContext2d, points: &[Point]) {
    let Some((first, rest)) = points.split_first() else {
        return;
    };
    ctx.begin_path();
    ctx.move_to(first.x, first.y);
    for p in rest {
        ctx.line_to(p.x, p.y);
    }
    ctx.stroke();
}

fn draw_arrowhead(ctx: &CanvasRenderingContext2d, tip: Point, angle: f64) {
    let x1 = tip.x - ARROW_SIZE * (angle - ARROW_ANGLE).cos();
    let y1 = tip.y - ARROW_SIZE * (angle - ARROW_ANGLE).sin();
    let x2 = tip.x - ARROW_SIZE * (angle + ARROW_ANGLE).cos();
    let y2 = tip.y - ARROW_SIZE * (angle + ARROW_ANGLE).sin();

    ctx.begin_path();
    ctx.move_to(tip.x, tip.y);
    ctx.line_to(x1, y1);
    ctx.line_to(x2, y2);
    ctx.close_path();
    ctx.fill();
}

// =============================================================
// Text
// =============================================================

fn draw_text(ctx: &CanvasRenderingContext2d, el: &Element, t: &TextShape) -> Result<(), JsValue> {
    ctx.set_fill_style_str(stroke_color(el));
    ctx.set_text_align("left");
    ctx.set_text_baseline("top");
    ctx.set_font(&font(t.font_size, &t.font_family));
    let mut y = el.y;
    for line in t.text.split('\n') {
        ctx.fill_text(line, el.x, y)?;
        y += t.font_size;
    }
    Ok(())
}

/// Centered label on a shape, over an optional background box.
fn draw_label(ctx: &CanvasRenderingContext2d, el: &Element, m: &dyn TextMeasure) -> Result<(), JsValue> {
    let Some(label) = el.style.label.as_deref().filter(|l| !l.is_empty()) else {
        return Ok(());
    };
    let size = el.style.label_font_size.unwrap_or(16.0);
    let family = el.style.label_font_family.as_deref().unwrap_or("sans-serif");
    let c = local_bounds(el, m).center();

    if let Some(bg) = &el.style.label_background_color {
        let w = m.line_width(label, size, family);
        ctx.set_fill_style_str(bg);
        ctx.fill_rect(c.x - w / 2.0 - 4.0, c.y - size / 2.0 - 2.0, w + 8.0, size + 4.0);
    }
    ctx.set_fill_style_str(el.style.label_color.as_deref().unwrap_or(DEFAULT_STROKE));
    ctx.set_text_align("center");
    ctx.set_text_baseline("middle");
    ctx.set_font(&font(size, family));
    ctx.fill_text(label, c.x, c.y)
}

fn font(size: f64, family: &str) -> String {
    format!("{size}px {family}")
}

// =============================================================
// Overlays
// =============================================================

fn draw_selection(
    ctx: &CanvasRenderingContext2d,
    el: &Element,
    elements: &[Element],
    m: &dyn TextMeasure,
    scale: f64,
    show_handles: bool,
) -> Result<(), JsValue> {
    ctx.save();
    ctx.set_stroke_style_str(SELECTION_COLOR);
    ctx.set_line_width(1.0 / scale);

    if let Shape::Wire(_) = el.shape {
        // A selected wire is shown by its endpoint dots.
        if let Some(path) = resolve_wire(el, elements, m) {
            ctx.set_fill_style_str("#fff");
            for p in [path.start, path.end] {
                ctx.begin_path();
                ctx.arc(p.x, p.y, HANDLE_HALF / 2.0, 0.0, 2.0 * PI)?;
                ctx.fill();
                ctx.stroke();
            }
        }
        ctx.restore();
        return Ok(());
    }

    rotate_about_center(ctx, el, m)?;
    let r = local_bounds(el, m).inflate(2.0 / scale);
    set_dash(ctx, SELECTION_DASH_PX / scale)?;
    ctx.stroke_rect(r.x, r.y, r.width, r.height);
    set_dash(ctx, 0.0)?;

    if show_handles {
        ctx.set_fill_style_str("#fff");
        for h in handles(el, m) {
            ctx.begin_path();
            ctx.rect(h.at.x - HANDLE_HALF, h.at.y - HANDLE_HALF, HANDLE_HALF * 2.0, HANDLE_HALF * 2.0);
            ctx.fill();
            ctx.stroke();
        }
    }
    ctx.restore();
    Ok(())
}

fn draw_rubber_band(ctx: &CanvasRenderingContext2d, rect: Rect, scale: f64) -> Result<(), JsValue> {
    ctx.save();
    set_dash(ctx, SELECTION_DASH_PX / scale)?;
    ctx.set_stroke_style_str(SELECTION_COLOR);
    ctx.set_fill_style_str("rgba(30, 144, 255, 0.12)");
    ctx.set_line_width(1.0 / scale);
    ctx.fill_rect(rect.x, rect.y, rect.width, rect.height);
    ctx.stroke_rect(rect.x, rect.y, rect.width, rect.height);
    ctx.restore();
    Ok(())
}

fn draw_wiring_line(ctx: &CanvasRenderingContext2d, from: Point, to: Point, scale: f64) -> Result<(), JsValue> {
    ctx.save();
    set_dash(ctx, SELECTION_DASH_PX / scale)?;
    ctx.set_stroke_style_str(SELECTION_COLOR);
    ctx.set_line_width(2.0 / scale);
    ctx.begin_path();
    ctx.move_to(from.x, from.y);
    ctx.line_to(to.x, to.y);
    ctx.stroke();
    ctx.restore();
    Ok(())
}

/// Connection points of the element under the wire tool.
fn draw_wire_targets(ctx: &CanvasRenderingContext2d, el: &Element, m: &dyn TextMeasure, scale: f64) -> Result<(), JsValue> {
    ctx.save();
    rotate_about_center(ctx, el, m)?;
    ctx.set_fill_style_str(SELECTION_COLOR);
    for h in handles(el, m).into_iter().filter(|h| h.kind != HandleType::Rotation) {
        ctx.begin_path();
        ctx.arc(h.at.x, h.at.y, 4.0 / scale, 0.0, 2.0 * PI)?;
        ctx.fill();
    }
    ctx.restore();
    Ok(())
}

fn draw_trail(ctx: &CanvasRenderingContext2d, trail: &[Point], color: &str, scale: f64) {
    ctx.save();
    ctx.set_stroke_style_str(color);
    ctx.set_line_width(4.0 / scale);
    ctx.set_line_cap("round");
    ctx.set_line_join("round");
    draw_polyline(ctx, trail);
    ctx.restore();
}

fn draw_cursor(ctx: &CanvasRenderingContext2d, at: Point, name: Option<&str>) -> Result<(), JsValue> {
    ctx.save();
    ctx.set_fill_style_str(CURSOR_COLOR);
    ctx.begin_path();
    ctx.move_to(at.x, at.y);
    ctx.line_to(at.x + 4.0, at.y + 14.0);
    ctx.line_to(at.x + 7.0, at.y + 8.0);
    ctx.line_to(at.x + 13.0, at.y + 6.0);
    ctx.close_path();
    ctx.fill();
    if let Some(name) = name {
        ctx.set_font(&font(12.0, "sans-serif"));
        ctx.set_text_align("left");
        ctx.set_text_baseline("top");
        ctx.fill_text(name, at.x + 12.0, at.y + 14.0)?;
    }
    ctx.restore();
    Ok(())
}

/// Degree readout beside the end of a line being drawn.
fn draw_angle_label(ctx: &CanvasRenderingContext2d, at: Point, angle: f64) -> Result<(), JsValue> {
    ctx.save();
    ctx.set_fill_style_str(CURSOR_COLOR);
    ctx.set_font(&font(12.0, "sans-serif"));
    ctx.set_text_align("left");
    ctx.set_text_baseline("bottom");
    ctx.fill_text(&format!("{angle}°"), at.x + 10.0, at.y - 10.0)?;
    ctx.restore();
    Ok(())
}

// =============================================================
// Helpers
// =============================================================

fn stroke_color(el: &Element) -> &str {
    el.style.stroke.as_deref().unwrap_or(DEFAULT_STROKE)
}

fn fill_and_stroke(ctx: &CanvasRenderingContext2d, el: &Element) {
    if let Some(fill) = &el.style.fill {
        ctx.set_fill_style_str(fill);
        ctx.fill();
    }
    ctx.stroke();
}

/// Rotate the context about the element's center by its rotation.
fn rotate_about_center(ctx: &CanvasRenderingContext2d, el: &Element, m: &dyn TextMeasure) -> Result<(), JsValue> {
    let angle = el.rotation_rad();
    if angle == 0.0 {
        return Ok(());
    }
    let c = element_center(el, m);
    ctx.translate(c.x, c.y)?;
    ctx.rotate(angle)?;
    ctx.translate(-c.x, -c.y)
}

/// Dashed strokes with equal dash and gap; zero turns dashing off.
fn set_dash(ctx: &CanvasRenderingContext2d, segment: f64) -> Result<(), JsValue> {
    let dash = js_sys::Array::new();
    if segment > 0.0 {
        dash.push(&segment.into());
        dash.push(&segment.into());
    }
    ctx.set_line_dash(&dash)
}
