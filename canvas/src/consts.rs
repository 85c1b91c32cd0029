//! Shared numeric constants for the canvas crate.

// ── Handles ─────────────────────────────────────────────────────

/// Half the side of a square handle hit box, in world units.
pub const HANDLE_HALF: f64 = 7.5;

/// Half the side of a lenient (icon) handle hit box, in world units.
pub const LENIENT_HANDLE_HALF: f64 = 12.0;

/// Vertical offset of the rotation grip from the element's top edge.
pub const ROTATION_HANDLE_OFFSET: f64 = -55.0;

// ── Hit-testing ─────────────────────────────────────────────────

/// Maximum distance from a line or stroke segment that still counts as a hit.
pub const LINE_HIT_THRESHOLD: f64 = 5.0;

/// Radius around an arrow tip that counts as hitting the arrow.
pub const ARROWHEAD_HIT_RADIUS: f64 = 10.0;

/// Padding used when hovering or selecting elements with the pointer.
pub const HOVER_LENIENCY: f64 = 30.0;

/// Number of samples taken along a quadratic curve for hit-testing.
pub const CURVE_SAMPLES: u32 = 11;

/// Number of samples taken along a curved wire for hit-testing.
pub const WIRE_HIT_SAMPLES: u32 = 24;

// ── Commit thresholds ───────────────────────────────────────────

/// Shapes smaller than this (per axis, radius, or length) are discarded.
pub const MIN_SIZE_THRESHOLD: f64 = 10.0;

/// Straight-line pointer travel, in screen pixels, below which a transform is a click.
pub const CLICK_SLOP_PX: f64 = 5.0;

/// Pointer travel that cancels a pending text or annotation placement.
pub const PLACING_CANCEL_DISTANCE: f64 = 5.0;

/// Douglas-Peucker tolerance applied when a freehand stroke completes.
pub const SIMPLIFY_EPSILON: f64 = 1.0;

/// Smallest font size reachable through the text resize handle.
pub const MIN_FONT_SIZE: f64 = 8.0;

/// Font size change per world unit of horizontal handle drag.
pub const FONT_RESIZE_RATE: f64 = 0.5;

// ── Wires and routing ───────────────────────────────────────────

/// Bezier control distance as a fraction of the wire's length.
pub const CURVE_TENSION: f64 = 0.2;

/// Side of one routing grid cell.
pub const GRID_SIZE: f64 = 20.0;

/// Padding added around every obstacle before routing.
pub const OBSTACLE_PADDING: f64 = 20.0;

/// Extra cost charged whenever the route changes direction.
pub const TURN_PENALTY: f64 = 2.0 * GRID_SIZE;

/// Node expansions before the router gives up and draws a direct line.
pub const MAX_ROUTE_ITERATIONS: usize = 3000;

// ── Collaboration ───────────────────────────────────────────────

/// Minimum interval between outbound cursor messages.
pub const CURSOR_THROTTLE_MS: f64 = 100.0;

/// Minimum interval between outbound stroke, highlight and curve updates.
pub const STROKE_THROTTLE_MS: f64 = 50.0;

/// Points kept in the laser and eraser trails.
pub const TRAIL_POINTS: usize = 40;

/// Remote cursors not refreshed for this long are dropped.
pub const CURSOR_TIMEOUT_MS: f64 = 5000.0;

/// Decimal places kept when elements are persisted or exported.
pub const PERSIST_PRECISION: u32 = 2;

/// Maximum number of undo snapshots kept.
pub const HISTORY_LIMIT: usize = 100;

// ── Camera ──────────────────────────────────────────────────────

/// Zoom multiplier applied per wheel notch.
pub const ZOOM_STEP: f64 = 1.1;

/// Smallest allowed view scale.
pub const MIN_SCALE: f64 = 0.1;

/// Largest allowed view scale.
pub const MAX_SCALE: f64 = 20.0;

// ── Defaults ────────────────────────────────────────────────────

/// Default font size for new text elements.
pub const DEFAULT_FONT_SIZE: f64 = 36.0;

/// Default font family for new text elements.
pub const DEFAULT_FONT_FAMILY: &str = "'virgil', sans-serif";

/// Default fill for new closed shapes.
pub const DEFAULT_SHAPE_FILL: &str = "#e6e6e6";

/// Default stroke color.
pub const DEFAULT_STROKE: &str = "#000000";

/// Highlighter stroke color.
pub const HIGHLIGHTER_STROKE: &str = "#ff0000";

/// Highlighter stroke width.
pub const HIGHLIGHTER_WIDTH: f64 = 8.0;

/// Highlighter opacity.
pub const HIGHLIGHTER_OPACITY: f64 = 0.6;

/// Side of the square annotation marker.
pub const ANNOTATION_SIZE: f64 = 32.0;

// ── Export ──────────────────────────────────────────────────────

/// Margin added around the combined bounds of exported elements.
pub const EXPORT_PADDING: f64 = 20.0;
