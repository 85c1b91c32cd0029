//! Element model: the closed set of drawable kinds and their wire format.
//!
//! An [`Element`] is the common envelope (id, position, rotation, style) plus
//! a [`Shape`] carrying the kind-specific fields. Both flatten into one JSON
//! object with a `type` discriminator, which is exactly what travels over the
//! socket and what the server stores as opaque row data.
//!
//! Kind-specific behavior lives in sibling modules and always dispatches with
//! an exhaustive `match` on [`Shape`]: bounds in [`crate::bounds`], handles
//! and hit-testing in [`crate::hit`], move and resize in [`crate::transform`].
//!
//! Edits travel as partial patches. [`diff`] produces one from a before/after
//! pair and [`apply_patch`] folds one into an element; both go through the
//! JSON form so a patch means the same thing here and on the server.

#[cfg(test)]
#[path = "element_test.rs"]
mod element_test;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::consts::{
    ANNOTATION_SIZE, DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE, DEFAULT_SHAPE_FILL, HIGHLIGHTER_OPACITY,
    HIGHLIGHTER_STROKE, HIGHLIGHTER_WIDTH,
};
use crate::geometry::Point;

/// Element identifier. Generated client-side and never reassigned.
pub type ElementId = String;

// =============================================================
// Envelope
// =============================================================

/// One drawable object on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub id: ElementId,
    pub x: f64,
    pub y: f64,
    /// Clockwise rotation in degrees about the element's local bounds center.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(flatten)]
    pub style: Style,
    #[serde(flatten)]
    pub shape: Shape,
}

/// Optional presentation fields shared by every kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Style {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_font_size: Option<f64>,
}

impl Style {
    /// Overlay every field that is set in `other`.
    pub fn overlay(&mut self, other: &Style) {
        fn pick<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
            if let Some(v) = src {
                *dst = Some(v.clone());
            }
        }
        pick(&mut self.stroke, &other.stroke);
        pick(&mut self.fill, &other.fill);
        pick(&mut self.stroke_width, &other.stroke_width);
        pick(&mut self.opacity, &other.opacity);
        pick(&mut self.label, &other.label);
        pick(&mut self.label_color, &other.label_color);
        pick(&mut self.label_background_color, &other.label_background_color);
        pick(&mut self.label_font_family, &other.label_font_family);
        pick(&mut self.label_font_size, &other.label_font_size);
    }
}

// =============================================================
// Shapes
// =============================================================

/// Kind-specific payload, discriminated by the JSON `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Shape {
    Rectangle(BoxShape),
    Diamond(BoxShape),
    Circle(CircleShape),
    Line(LineShape),
    Arrow(LineShape),
    Wire(WireShape),
    Text(TextShape),
    Pencil(PencilShape),
    Annotation(AnnotationShape),
}

impl Shape {
    /// The JSON `type` value.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Rectangle(_) => "rectangle",
            Self::Diamond(_) => "diamond",
            Self::Circle(_) => "circle",
            Self::Line(_) => "line",
            Self::Arrow(_) => "arrow",
            Self::Wire(_) => "wire",
            Self::Text(_) => "text",
            Self::Pencil(_) => "pencil",
            Self::Annotation(_) => "annotation",
        }
    }
}

/// Rectangle and diamond extent. May be negative mid-resize.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxShape {
    pub width: f64,
    pub height: f64,
}

/// Circle centered on the element's `(x, y)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircleShape {
    pub radius: f64,
}

/// Line or arrow from `(x, y)` to `(x2, y2)`, optionally bent through a
/// quadratic control point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineShape {
    pub x2: f64,
    pub y2: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cp1x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cp1y: Option<f64>,
    /// Where the user grabbed the curve; lies on the curve at t = 0.5.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve_handle_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve_handle_y: Option<f64>,
    /// Explicit polyline, used by orthogonal routes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<Point>>,
}

impl LineShape {
    #[must_use]
    pub fn new(x2: f64, y2: f64) -> Self {
        Self { x2, y2, cp1x: None, cp1y: None, curve_handle_x: None, curve_handle_y: None, points: None }
    }

    /// The quadratic control point, when the line is curved.
    #[must_use]
    pub fn control_point(&self) -> Option<Point> {
        Some(Point::new(self.cp1x?, self.cp1y?))
    }

    /// The curve grip, when one has been placed.
    #[must_use]
    pub fn curve_handle(&self) -> Option<Point> {
        Some(Point::new(self.curve_handle_x?, self.curve_handle_y?))
    }

    /// Drop the curve so the line is straight again.
    pub fn reset_curve(&mut self) {
        self.cp1x = None;
        self.cp1y = None;
        self.curve_handle_x = None;
        self.curve_handle_y = None;
    }
}

/// How a wire is drawn between its derived endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireRouting {
    /// Cubic S-curve leaving each handle along its normal.
    #[default]
    Curved,
    /// Axis-aligned route found by the grid router.
    Orthogonal,
}

/// Connector between two elements. Its endpoints are derived from the
/// referenced elements' handle positions and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireShape {
    pub start_element_id: ElementId,
    pub end_element_id: ElementId,
    pub start_handle: HandleType,
    pub end_handle: HandleType,
    #[serde(default, skip_serializing_if = "is_curved")]
    pub routing: WireRouting,
}

fn is_curved(routing: &WireRouting) -> bool {
    *routing == WireRouting::Curved
}

/// Text anchored at its top-left corner. Its box comes from measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextShape {
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    #[serde(default = "default_font_family")]
    pub font_family: String,
}

fn default_font_size() -> f64 {
    DEFAULT_FONT_SIZE
}

fn default_font_family() -> String {
    DEFAULT_FONT_FAMILY.to_owned()
}

/// Freehand stroke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PencilShape {
    #[serde(default)]
    pub points: Vec<Point>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_highlighter: bool,
}

/// Open or resolved discussion marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationState {
    #[default]
    Open,
    Resolved,
}

/// One comment on an annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub text: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// Fixed-size annotation marker with its comment thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationShape {
    #[serde(default)]
    pub annotation_state: AnnotationState,
    #[serde(default = "default_annotation_size")]
    pub width: f64,
    #[serde(default = "default_annotation_size")]
    pub height: f64,
    #[serde(default)]
    pub author_id: String,
    #[serde(default)]
    pub author_name: String,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

fn default_annotation_size() -> f64 {
    ANNOTATION_SIZE
}

// =============================================================
// Handles
// =============================================================

/// Named control point on an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HandleType {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Start,
    End,
    CircleTop,
    CircleBottom,
    CircleLeft,
    CircleRight,
    Radius,
    Rotation,
    Curve,
}

impl HandleType {
    /// Direction a wire leaves this handle in, derived from the handle's name.
    ///
    /// Corner handles combine both axes; endpoint and grip handles have no
    /// preferred direction.
    #[must_use]
    pub fn outward_normal(self) -> Point {
        match self {
            Self::TopLeft => Point::new(-1.0, -1.0),
            Self::TopRight => Point::new(1.0, -1.0),
            Self::BottomLeft => Point::new(-1.0, 1.0),
            Self::BottomRight => Point::new(1.0, 1.0),
            Self::CircleTop => Point::new(0.0, -1.0),
            Self::CircleBottom => Point::new(0.0, 1.0),
            Self::CircleLeft => Point::new(-1.0, 0.0),
            Self::CircleRight | Self::Radius => Point::new(1.0, 0.0),
            Self::Start | Self::End | Self::Rotation | Self::Curve => Point::default(),
        }
    }
}

/// A handle positioned in the element's local (unrotated) space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Handle {
    pub kind: HandleType,
    pub at: Point,
}

// =============================================================
// Construction
// =============================================================

impl Element {
    #[must_use]
    pub fn new(id: impl Into<ElementId>, x: f64, y: f64, shape: Shape) -> Self {
        Self { id: id.into(), x, y, rotation: None, style: Style::default(), shape }
    }

    #[must_use]
    pub fn rectangle(id: impl Into<ElementId>, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(id, x, y, Shape::Rectangle(BoxShape { width, height })).with_fill(DEFAULT_SHAPE_FILL)
    }

    #[must_use]
    pub fn diamond(id: impl Into<ElementId>, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(id, x, y, Shape::Diamond(BoxShape { width, height })).with_fill(DEFAULT_SHAPE_FILL)
    }

    #[must_use]
    pub fn circle(id: impl Into<ElementId>, cx: f64, cy: f64, radius: f64) -> Self {
        Self::new(id, cx, cy, Shape::Circle(CircleShape { radius })).with_fill(DEFAULT_SHAPE_FILL)
    }

    #[must_use]
    pub fn line(id: impl Into<ElementId>, x: f64, y: f64, x2: f64, y2: f64) -> Self {
        Self::new(id, x, y, Shape::Line(LineShape::new(x2, y2)))
    }

    #[must_use]
    pub fn arrow(id: impl Into<ElementId>, x: f64, y: f64, x2: f64, y2: f64) -> Self {
        Self::new(id, x, y, Shape::Arrow(LineShape::new(x2, y2)))
    }

    #[must_use]
    pub fn text(id: impl Into<ElementId>, x: f64, y: f64, text: impl Into<String>) -> Self {
        Self::new(
            id,
            x,
            y,
            Shape::Text(TextShape { text: text.into(), font_size: DEFAULT_FONT_SIZE, font_family: default_font_family() }),
        )
    }

    /// Freehand stroke whose position is its first point.
    #[must_use]
    pub fn pencil(id: impl Into<ElementId>, points: Vec<Point>) -> Self {
        let origin = points.first().copied().unwrap_or_default();
        Self::new(id, origin.x, origin.y, Shape::Pencil(PencilShape { points, is_highlighter: false }))
    }

    /// Translucent highlighter scribble.
    #[must_use]
    pub fn highlighter(id: impl Into<ElementId>, start: Point) -> Self {
        let mut el = Self::new(id, start.x, start.y, Shape::Pencil(PencilShape { points: vec![start], is_highlighter: true }));
        el.style.stroke = Some(HIGHLIGHTER_STROKE.to_owned());
        el.style.stroke_width = Some(HIGHLIGHTER_WIDTH);
        el.style.opacity = Some(HIGHLIGHTER_OPACITY);
        el
    }

    #[must_use]
    pub fn annotation(id: impl Into<ElementId>, x: f64, y: f64, author_id: &str, author_name: &str) -> Self {
        Self::new(
            id,
            x,
            y,
            Shape::Annotation(AnnotationShape {
                annotation_state: AnnotationState::Open,
                width: ANNOTATION_SIZE,
                height: ANNOTATION_SIZE,
                author_id: author_id.to_owned(),
                author_name: author_name.to_owned(),
                comments: Vec::new(),
            }),
        )
    }

    /// Wire from `start_id`'s `start_handle` to `end_id`'s `end_handle`.
    ///
    /// `origin` only records where the wire was drawn; renderers always derive
    /// the real endpoints from the referenced elements.
    #[must_use]
    pub fn wire(
        id: impl Into<ElementId>,
        origin: Point,
        start: (&str, HandleType),
        end: (&str, HandleType),
    ) -> Self {
        Self::new(
            id,
            origin.x,
            origin.y,
            Shape::Wire(WireShape {
                start_element_id: start.0.to_owned(),
                end_element_id: end.0.to_owned(),
                start_handle: start.1,
                end_handle: end.1,
                routing: WireRouting::Curved,
            }),
        )
    }

    #[must_use]
    pub fn with_fill(mut self, fill: &str) -> Self {
        self.style.fill = Some(fill.to_owned());
        self
    }

    #[must_use]
    pub fn with_rotation(mut self, degrees: f64) -> Self {
        self.rotation = Some(degrees);
        self
    }

    /// Rotation in degrees, zero when unset.
    #[must_use]
    pub fn rotation_deg(&self) -> f64 {
        self.rotation.unwrap_or(0.0)
    }

    /// Rotation in radians, zero when unset.
    #[must_use]
    pub fn rotation_rad(&self) -> f64 {
        self.rotation_deg().to_radians()
    }

    #[must_use]
    pub fn is_wire(&self) -> bool {
        matches!(self.shape, Shape::Wire(_))
    }

    /// Whether this wire references `id` at either end.
    #[must_use]
    pub fn references(&self, id: &str) -> bool {
        match &self.shape {
            Shape::Wire(w) => w.start_element_id == id || w.end_element_id == id,
            _ => false,
        }
    }
}

// =============================================================
// Patches
// =============================================================

/// Encode an element as its wire JSON object.
///
/// # Errors
///
/// Returns an error if a float field is not finite.
pub fn to_json(el: &Element) -> Result<Value, serde_json::Error> {
    serde_json::to_value(el)
}

/// Decode an element from its wire JSON object.
///
/// # Errors
///
/// Returns an error if the object is missing required fields for its kind.
pub fn from_json(value: Value) -> Result<Element, serde_json::Error> {
    serde_json::from_value(value)
}

/// Partial patch turning `before` into `after`.
///
/// Contains `id`, every field whose value changed, and `null` for every field
/// `after` no longer has. Returns `None` when nothing changed.
#[must_use]
pub fn diff(before: &Element, after: &Element) -> Option<Value> {
    let (Ok(Value::Object(old)), Ok(Value::Object(new))) = (to_json(before), to_json(after)) else {
        return None;
    };
    let mut patch = Map::new();
    for (key, value) in &new {
        if old.get(key) != Some(value) {
            patch.insert(key.clone(), value.clone());
        }
    }
    for key in old.keys() {
        if !new.contains_key(key) {
            patch.insert(key.clone(), Value::Null);
        }
    }
    if patch.is_empty() {
        return None;
    }
    patch.insert("id".into(), Value::String(after.id.clone()));
    Some(Value::Object(patch))
}

/// Fold a partial patch into an element.
///
/// Returns `None` if the merged object is no longer a valid element (for
/// example a patch that nulls a required field); callers keep the original.
#[must_use]
pub fn apply_patch(el: &Element, patch: &Value) -> Option<Element> {
    let Value::Object(patch) = patch else {
        return None;
    };
    let Ok(Value::Object(mut merged)) = to_json(el) else {
        return None;
    };
    protocol::merge_patch(&mut merged, patch);
    match from_json(Value::Object(merged)) {
        Ok(next) => Some(next),
        Err(e) => {
            tracing::warn!(id = %el.id, error = %e, "patch produced an invalid element; ignored");
            None
        }
    }
}

// =============================================================
// Rounding
// =============================================================

/// Round every non-integer number in a JSON tree to `precision` decimals.
///
/// Integers are left untouched so integer fields keep their type.
pub fn round_value(value: &mut Value, precision: u32) {
    match value {
        Value::Number(n) => {
            if n.is_f64() {
                if let Some(f) = n.as_f64() {
                    let factor = 10_f64.powi(i32::try_from(precision).unwrap_or(i32::MAX));
                    let rounded = (f * factor).round() / factor;
                    if let Some(num) = serde_json::Number::from_f64(rounded) {
                        *n = num;
                    }
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(|v| round_value(v, precision)),
        Value::Object(map) => map.values_mut().for_each(|v| round_value(v, precision)),
        _ => {}
    }
}

/// Element with every numeric field rounded to `precision` decimals.
#[must_use]
pub fn round_element(el: &Element, precision: u32) -> Element {
    let Ok(mut value) = to_json(el) else {
        return el.clone();
    };
    round_value(&mut value, precision);
    from_json(value).unwrap_or_else(|_| el.clone())
}
