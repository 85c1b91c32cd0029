//! Room elements read.
//!
//! `GET /api/rooms/{room_id}/elements` returns the stored rows of a room in
//! z-order as `[{id, roomId, data}]`, where `data` is the opaque element
//! document. Clients call it once when opening a board, before joining the
//! room over the websocket.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use tracing::error;

use crate::error::ErrorCode;
use crate::services::store::ElementRow;
use crate::state::AppState;

pub async fn list_elements(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<ElementRow>>, StatusCode> {
    state.store.list(&room_id).await.map(Json).map_err(|e| {
        error!(room_id = %room_id, code = e.error_code(), error = %e, "elements: list failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}
