//! Element storage contract and the in-memory implementation.
//!
//! DESIGN
//! ======
//! The relay treats element payloads as opaque JSON documents keyed by their
//! `id` and scoped to a room. [`ElementStore`] is the seam between the
//! protocol handler and storage: Postgres in production
//! ([`super::pg_store::PgStore`]), [`MemoryStore`] for development and tests.
//! Both implementations follow the same rules:
//!
//! - `list` returns rows in insertion order, which is the canvas z-order.
//! - A row owned by one room is never read or written through another room.
//! - `upsert_many` and `replace_all` are all-or-nothing.

use std::collections::{HashMap, HashSet};

use protocol::{RoomId, element_id, merge_patch};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::ErrorCode;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("element {index} has no id")]
    MissingId { index: usize },
    #[error("element id {0} appears more than once")]
    DuplicateId(String),
    #[error("element id {0} belongs to another room")]
    IdTaken(String),
}

impl ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Database(_) => "E_DATABASE",
            Self::MissingId { .. } => "E_MISSING_ID",
            Self::DuplicateId(_) => "E_DUPLICATE_ID",
            Self::IdTaken(_) => "E_ID_TAKEN",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// One stored element, as returned by the room elements read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementRow {
    pub id: String,
    pub room_id: RoomId,
    pub data: Value,
}

/// Persistence operations the protocol handler needs.
#[async_trait::async_trait]
pub trait ElementStore: Send + Sync {
    /// Every element of the room, in insertion order.
    async fn list(&self, room_id: &str) -> Result<Vec<ElementRow>, StoreError>;

    /// Store one element. An existing row of the same room is overwritten.
    async fn create(&self, room_id: &str, element: &Value) -> Result<(), StoreError>;

    /// Merge each patch into its row, inserting rows that do not exist yet.
    async fn upsert_many(&self, room_id: &str, patches: &[Value]) -> Result<(), StoreError>;

    /// Delete the given ids from the room. Unknown ids are ignored.
    async fn delete_many(&self, room_id: &str, ids: &[String]) -> Result<u64, StoreError>;

    /// Delete every element of the room.
    async fn delete_all(&self, room_id: &str) -> Result<u64, StoreError>;

    /// Atomically replace the room's elements with `elements`.
    async fn replace_all(&self, room_id: &str, elements: &[Value]) -> Result<(), StoreError>;

    /// Record one chat line.
    async fn save_chat(&self, room_id: &str, user_id: &str, message: &str) -> Result<(), StoreError>;
}

/// Check that every element carries a non-empty id and that no id repeats.
///
/// # Errors
///
/// Returns the first missing or duplicated id.
pub fn validate_ids(elements: &[Value]) -> Result<Vec<&str>, StoreError> {
    let mut seen = HashSet::with_capacity(elements.len());
    let mut ids = Vec::with_capacity(elements.len());
    for (index, element) in elements.iter().enumerate() {
        let Some(id) = element_id(element) else {
            return Err(StoreError::MissingId { index });
        };
        if !seen.insert(id) {
            return Err(StoreError::DuplicateId(id.to_owned()));
        }
        ids.push(id);
    }
    Ok(ids)
}

// =============================================================================
// MEMORY STORE
// =============================================================================

#[derive(Debug, Clone)]
struct StoredElement {
    room_id: RoomId,
    data: Value,
    seq: u64,
}

/// A stored chat line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRow {
    pub room_id: RoomId,
    pub user_id: String,
    pub message: String,
}

#[derive(Default)]
struct MemoryInner {
    elements: HashMap<String, StoredElement>,
    chats: Vec<ChatRow>,
    next_seq: u64,
}

impl MemoryInner {
    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn owned_by_other_room(&self, id: &str, room_id: &str) -> bool {
        self.elements.get(id).is_some_and(|row| row.room_id != room_id)
    }
}

/// Process-local element store. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Chat lines recorded so far, oldest first.
    #[cfg(test)]
    pub async fn chats(&self) -> Vec<ChatRow> {
        self.inner.read().await.chats.clone()
    }
}

#[async_trait::async_trait]
impl ElementStore for MemoryStore {
    async fn list(&self, room_id: &str) -> Result<Vec<ElementRow>, StoreError> {
        let inner = self.inner.read().await;
        let mut rows: Vec<(&String, &StoredElement)> =
            inner.elements.iter().filter(|(_, row)| row.room_id == room_id).collect();
        rows.sort_by_key(|(_, row)| row.seq);
        Ok(rows
            .into_iter()
            .map(|(id, row)| ElementRow { id: id.clone(), room_id: row.room_id.clone(), data: row.data.clone() })
            .collect())
    }

    async fn create(&self, room_id: &str, element: &Value) -> Result<(), StoreError> {
        let Some(id) = element_id(element) else {
            return Err(StoreError::MissingId { index: 0 });
        };
        let mut inner = self.inner.write().await;
        if inner.owned_by_other_room(id, room_id) {
            return Err(StoreError::IdTaken(id.to_owned()));
        }
        if let Some(row) = inner.elements.get_mut(id) {
            row.data = element.clone();
            return Ok(());
        }
        let seq = inner.next_seq();
        inner
            .elements
            .insert(id.to_owned(), StoredElement { room_id: room_id.to_owned(), data: element.clone(), seq });
        Ok(())
    }

    async fn upsert_many(&self, room_id: &str, patches: &[Value]) -> Result<(), StoreError> {
        for (index, patch) in patches.iter().enumerate() {
            if element_id(patch).is_none() || !patch.is_object() {
                return Err(StoreError::MissingId { index });
            }
        }

        let mut inner = self.inner.write().await;
        for patch in patches {
            let (Some(id), Some(fields)) = (element_id(patch), patch.as_object()) else {
                continue;
            };
            if inner.owned_by_other_room(id, room_id) {
                continue;
            }
            if let Some(Value::Object(target)) = inner.elements.get_mut(id).map(|row| &mut row.data) {
                merge_patch(target, fields);
                continue;
            }
            let seq = inner.next_seq();
            inner
                .elements
                .insert(id.to_owned(), StoredElement { room_id: room_id.to_owned(), data: patch.clone(), seq });
        }
        Ok(())
    }

    async fn delete_many(&self, room_id: &str, ids: &[String]) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let mut removed = 0;
        for id in ids {
            if inner.elements.get(id).is_some_and(|row| row.room_id == room_id) {
                inner.elements.remove(id);
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn delete_all(&self, room_id: &str) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let before = inner.elements.len();
        inner.elements.retain(|_, row| row.room_id != room_id);
        Ok((before - inner.elements.len()) as u64)
    }

    async fn replace_all(&self, room_id: &str, elements: &[Value]) -> Result<(), StoreError> {
        let ids = validate_ids(elements)?;
        let mut inner = self.inner.write().await;
        if let Some(taken) = ids.iter().find(|id| inner.owned_by_other_room(id, room_id)) {
            return Err(StoreError::IdTaken((*taken).to_owned()));
        }
        inner.elements.retain(|_, row| row.room_id != room_id);
        for (id, element) in ids.into_iter().zip(elements) {
            let seq = inner.next_seq();
            inner
                .elements
                .insert(id.to_owned(), StoredElement { room_id: room_id.to_owned(), data: element.clone(), seq });
        }
        Ok(())
    }

    async fn save_chat(&self, room_id: &str, user_id: &str, message: &str) -> Result<(), StoreError> {
        self.inner.write().await.chats.push(ChatRow {
            room_id: room_id.to_owned(),
            user_id: user_id.to_owned(),
            message: message.to_owned(),
        });
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
