//! Postgres-backed element store.
//!
//! Rows live in the `elements` and `chats` tables created by the startup
//! migrations. `seq` is a `BIGSERIAL` assigned on insert, so ordering by it
//! keeps the canvas z-order across reloads.

use protocol::{element_id, merge_patch};
use serde_json::Value;
use sqlx::{PgPool, Row};

use super::store::{ElementRow, ElementStore, StoreError, validate_ids};

/// `SQLSTATE` for a unique constraint violation.
const UNIQUE_VIOLATION: &str = "23505";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_insert_error(err: sqlx::Error, id: &str) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return StoreError::IdTaken(id.to_owned());
        }
    }
    StoreError::Database(err)
}

#[async_trait::async_trait]
impl ElementStore for PgStore {
    async fn list(&self, room_id: &str) -> Result<Vec<ElementRow>, StoreError> {
        let rows = sqlx::query("SELECT id, room_id, data FROM elements WHERE room_id = $1 ORDER BY seq")
            .bind(room_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|r| ElementRow { id: r.get("id"), room_id: r.get("room_id"), data: r.get("data") })
            .collect())
    }

    async fn create(&self, room_id: &str, element: &Value) -> Result<(), StoreError> {
        let Some(id) = element_id(element) else {
            return Err(StoreError::MissingId { index: 0 });
        };
        let result = sqlx::query(
            r"INSERT INTO elements (id, room_id, data) VALUES ($1, $2, $3)
              ON CONFLICT (id) DO UPDATE SET data = EXCLUDED.data, updated_at = now()
              WHERE elements.room_id = EXCLUDED.room_id",
        )
        .bind(id)
        .bind(room_id)
        .bind(element)
        .execute(&self.pool)
        .await?;

        // The conflict branch skips rows of other rooms without erroring.
        if result.rows_affected() == 0 {
            return Err(StoreError::IdTaken(id.to_owned()));
        }
        Ok(())
    }

    async fn upsert_many(&self, room_id: &str, patches: &[Value]) -> Result<(), StoreError> {
        for (index, patch) in patches.iter().enumerate() {
            if element_id(patch).is_none() || !patch.is_object() {
                return Err(StoreError::MissingId { index });
            }
        }

        let mut tx = self.pool.begin().await?;
        for patch in patches {
            let (Some(id), Some(fields)) = (element_id(patch), patch.as_object()) else {
                continue;
            };
            let existing = sqlx::query("SELECT room_id, data FROM elements WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

            match existing {
                Some(row) => {
                    let owner: String = row.get("room_id");
                    if owner != room_id {
                        continue;
                    }
                    let mut data: Value = row.get("data");
                    match &mut data {
                        Value::Object(target) => merge_patch(target, fields),
                        other => *other = patch.clone(),
                    }
                    update_data(&mut tx, id, &data).await?;
                }
                None => {
                    sqlx::query("INSERT INTO elements (id, room_id, data) VALUES ($1, $2, $3)")
                        .bind(id)
                        .bind(room_id)
                        .bind(patch)
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| map_insert_error(e, id))?;
                }
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_many(&self, room_id: &str, ids: &[String]) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM elements WHERE room_id = $1 AND id = ANY($2)")
            .bind(room_id)
            .bind(ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_all(&self, room_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM elements WHERE room_id = $1")
            .bind(room_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn replace_all(&self, room_id: &str, elements: &[Value]) -> Result<(), StoreError> {
        let ids = validate_ids(elements)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM elements WHERE room_id = $1")
            .bind(room_id)
            .execute(&mut *tx)
            .await?;
        for (id, element) in ids.into_iter().zip(elements) {
            sqlx::query("INSERT INTO elements (id, room_id, data) VALUES ($1, $2, $3)")
                .bind(id)
                .bind(room_id)
                .bind(element)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_insert_error(e, id))?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn save_chat(&self, room_id: &str, user_id: &str, message: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO chats (room_id, user_id, message) VALUES ($1, $2, $3)")
            .bind(room_id)
            .bind(user_id)
            .bind(message)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

async fn update_data(tx: &mut sqlx::Transaction<'_, sqlx::Postgres>, id: &str, data: &Value) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE elements SET data = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(data)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[cfg(all(test, feature = "live-db-tests"))]
#[path = "pg_store_test.rs"]
mod tests;
