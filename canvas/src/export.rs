//! Import and export of whole boards as JSON.
//!
//! Exports are the element array with every number rounded to the persisted
//! precision. Imports accept the same shape, but every element gets a fresh
//! id so an import never collides with ids already stored in another room.
//! Wires are rewritten to follow their endpoints' new ids; a wire whose
//! endpoint is not part of the import is dropped.

#[cfg(test)]
#[path = "export_test.rs"]
mod export_test;

use std::collections::HashMap;

use serde_json::Value;

use crate::bounds::combined_bounds;
use crate::consts::{EXPORT_PADDING, PERSIST_PRECISION};
use crate::doc::decode_elements;
use crate::element::{Element, ElementId, Shape, round_value, to_json};
use crate::geometry::Rect;
use crate::text::TextMeasure;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("import is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("import must be a JSON array of elements")]
    NotAnArray,
    #[error("import contains no usable elements")]
    Empty,
}

/// Rounded JSON values for every element, in z-order.
///
/// # Errors
///
/// Returns an error if an element holds a non-finite number.
pub fn export_values(elements: &[Element]) -> Result<Vec<Value>, serde_json::Error> {
    elements
        .iter()
        .map(|el| {
            let mut value = to_json(el)?;
            round_value(&mut value, PERSIST_PRECISION);
            Ok(value)
        })
        .collect()
}

/// Pretty-printed export document.
///
/// # Errors
///
/// Returns an error if an element holds a non-finite number.
pub fn export_json(elements: &[Element]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&export_values(elements)?)
}

/// Frame for an image export: the combined bounds plus a margin.
///
/// `None` for an empty board.
#[must_use]
pub fn export_bounds(elements: &[Element], measure: &dyn TextMeasure) -> Option<Rect> {
    if elements.is_empty() {
        return None;
    }
    Some(combined_bounds(elements, measure).inflate(EXPORT_PADDING))
}

/// Parse an export document into fresh elements.
///
/// `next_id` supplies the new ids. Undecodable entries are skipped.
///
/// # Errors
///
/// Returns [`ImportError`] when the text is not JSON, not an array, or holds
/// nothing that decodes.
pub fn import_json(text: &str, mut next_id: impl FnMut() -> ElementId) -> Result<Vec<Element>, ImportError> {
    let Value::Array(values) = serde_json::from_str::<Value>(text)? else {
        return Err(ImportError::NotAnArray);
    };
    let decoded = decode_elements(&values);
    if decoded.is_empty() {
        return Err(ImportError::Empty);
    }

    let mut renamed: HashMap<ElementId, ElementId> = HashMap::new();
    for el in decoded.iter().filter(|el| !el.is_wire()) {
        renamed.insert(el.id.clone(), next_id());
    }

    let mut out = Vec::with_capacity(decoded.len());
    for mut el in decoded {
        if let Shape::Wire(w) = &mut el.shape {
            let (Some(start), Some(end)) = (renamed.get(&w.start_element_id), renamed.get(&w.end_element_id)) else {
                tracing::debug!(id = %el.id, "imported wire references a missing element; dropped");
                continue;
            };
            w.start_element_id = start.clone();
            w.end_element_id = end.clone();
            el.id = next_id();
        } else if let Some(id) = renamed.get(&el.id) {
            el.id = id.clone();
        }
        out.push(el);
    }
    Ok(out)
}
