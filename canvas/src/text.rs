//! Text measurement.
//!
//! Text width depends on a shaping primitive the engine does not own. The
//! browser build measures with a Canvas2D context (see
//! [`crate::render::CanvasTextMeasure`]); native builds and tests use the
//! fixed-advance approximation below. Every function that needs a text box
//! receives the measurer explicitly.

/// Measures the advance width of one line of text.
pub trait TextMeasure {
    /// Width of `line` rendered at `font_size` in `font_family`.
    fn line_width(&self, line: &str, font_size: f64, font_family: &str) -> f64;
}

/// Fixed-advance measurer: every character is `advance × font_size` wide.
#[derive(Debug, Clone, Copy)]
pub struct ApproxTextMeasure {
    pub advance: f64,
}

impl Default for ApproxTextMeasure {
    fn default() -> Self {
        Self { advance: 0.6 }
    }
}

impl TextMeasure for ApproxTextMeasure {
    fn line_width(&self, line: &str, font_size: f64, _font_family: &str) -> f64 {
        let chars = u32::try_from(line.chars().count()).unwrap_or(u32::MAX);
        f64::from(chars) * font_size * self.advance
    }
}

/// Width and height of a (possibly multi-line) text block.
///
/// Width is the widest line; height is `line count × font_size`.
#[must_use]
pub fn measure_text(measure: &dyn TextMeasure, text: &str, font_size: f64, font_family: &str) -> (f64, f64) {
    let mut width: f64 = 0.0;
    let mut lines = 0_u32;
    for line in text.split('\n') {
        width = width.max(measure.line_width(line, font_size, font_family));
        lines += 1;
    }
    (width, f64::from(lines) * font_size)
}
