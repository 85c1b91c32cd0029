//! Undo/redo over whole-document snapshots.
//!
//! Each entry is a full copy of the element list taken just before a committed
//! change. Undo and redo swap whole lists and the engine rebroadcasts the
//! result as a bulk replace, so there is never a partial-undo ambiguity.

use std::collections::VecDeque;

use crate::consts::HISTORY_LIMIT;
use crate::element::Element;

#[derive(Debug, Clone)]
pub struct History {
    undo: VecDeque<Vec<Element>>,
    redo: Vec<Vec<Element>>,
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::with_limit(HISTORY_LIMIT)
    }
}

impl History {
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self { undo: VecDeque::new(), redo: Vec::new(), limit: limit.max(1) }
    }

    /// Record the state before a change. Clears the redo stack and drops the
    /// oldest entry once the limit is reached.
    pub fn record(&mut self, before: Vec<Element>) {
        if self.undo.len() == self.limit {
            self.undo.pop_front();
        }
        self.undo.push_back(before);
        self.redo.clear();
    }

    /// Step back. `current` moves to the redo stack; the previous state is returned.
    pub fn undo(&mut self, current: Vec<Element>) -> Option<Vec<Element>> {
        let previous = self.undo.pop_back()?;
        self.redo.push(current);
        Some(previous)
    }

    /// Step forward again after an undo.
    pub fn redo(&mut self, current: Vec<Element>) -> Option<Vec<Element>> {
        let next = self.redo.pop()?;
        self.undo.push_back(current);
        Some(next)
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }
}

#[cfg(test)]
#[path = "history_test.rs"]
mod history_test;
