//! Document store: the ordered element list for one room.
//!
//! Array order is z-order: later elements draw on top and win hit-tests.
//! Every mutation, local or remote, goes through one of the methods here so
//! wire cascades and duplicate ids are handled in a single place.
//!
//! Remote payloads arrive as raw JSON. Anything that does not decode into an
//! [`Element`] is logged and skipped rather than failing the whole batch.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use std::collections::HashSet;

use serde_json::Value;

use crate::element::{Element, ElementId, apply_patch, from_json};

/// In-memory element list.
#[derive(Debug, Clone, Default)]
pub struct DocStore {
    elements: Vec<Element>,
}

impl DocStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Elements in z-order, bottom first.
    #[must_use]
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Element> {
        self.elements.iter().find(|el| el.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Copy of the full element list, for history.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Element> {
        self.elements.clone()
    }

    /// Append an element on top. Returns false if the id already exists.
    pub fn insert(&mut self, el: Element) -> bool {
        if self.contains(&el.id) {
            tracing::debug!(id = %el.id, "duplicate element create ignored");
            return false;
        }
        self.elements.push(el);
        true
    }

    /// Replace an element in place, keeping its z-position, or append it.
    pub fn upsert(&mut self, el: Element) {
        match self.elements.iter_mut().find(|e| e.id == el.id) {
            Some(slot) => *slot = el,
            None => self.elements.push(el),
        }
    }

    /// Merge one partial patch into the element it names.
    ///
    /// Returns false when the patch has no id, the element is unknown, or the
    /// merge would produce an invalid element.
    pub fn apply_patch(&mut self, patch: &Value) -> bool {
        let Some(id) = protocol::element_id(patch) else {
            tracing::debug!("patch without id ignored");
            return false;
        };
        let Some(slot) = self.elements.iter_mut().find(|e| e.id == id) else {
            tracing::debug!(id, "patch for unknown element ignored");
            return false;
        };
        match apply_patch(slot, patch) {
            Some(next) => {
                *slot = next;
                true
            }
            None => false,
        }
    }

    /// Ids of `ids` plus every wire attached to any of them.
    #[must_use]
    pub fn cascade(&self, ids: &[ElementId]) -> Vec<ElementId> {
        let roots: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut out: Vec<ElementId> = ids.to_vec();
        for el in &self.elements {
            if el.is_wire() && !roots.contains(el.id.as_str()) && roots.iter().any(|id| el.references(id)) {
                out.push(el.id.clone());
            }
        }
        out
    }

    /// Remove `ids` and every wire attached to them.
    ///
    /// Returns the ids that were actually present and removed.
    pub fn remove_cascade(&mut self, ids: &[ElementId]) -> Vec<ElementId> {
        let doomed: HashSet<ElementId> = self.cascade(ids).into_iter().collect();
        let mut removed = Vec::new();
        self.elements.retain(|el| {
            if doomed.contains(&el.id) {
                removed.push(el.id.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Replace the whole list.
    pub fn replace_all(&mut self, elements: Vec<Element>) {
        self.elements = elements;
    }

    /// Replace the whole list from raw JSON, skipping undecodable entries.
    pub fn load_values(&mut self, values: &[Value]) {
        self.elements = decode_elements(values);
    }

    pub fn clear(&mut self) {
        self.elements.clear();
    }
}

/// Decode a batch of remote element objects, dropping the ones that fail.
#[must_use]
pub fn decode_elements(values: &[Value]) -> Vec<Element> {
    values
        .iter()
        .filter_map(|v| match from_json(v.clone()) {
            Ok(el) => Some(el),
            Err(e) => {
                tracing::warn!(error = %e, "undecodable element skipped");
                None
            }
        })
        .collect()
}
