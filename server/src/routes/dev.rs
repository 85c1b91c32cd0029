//! Development ticket issuing.
//!
//! `POST /api/dev/ws-ticket` with `{"userId": "..."}` returns `{"ticket": "..."}`
//! from the in-process ticket store. The route is only mounted when
//! `DEV_TICKETS` is enabled; it stands in for the auth API during local
//! development and tests.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketRequest {
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct TicketResponse {
    pub ticket: String,
}

pub async fn issue_ticket(
    State(state): State<AppState>,
    Json(body): Json<TicketRequest>,
) -> Result<Json<TicketResponse>, StatusCode> {
    let Some(tickets) = &state.dev_tickets else {
        return Err(StatusCode::NOT_FOUND);
    };
    let user_id = body.user_id.trim();
    if user_id.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    info!(user_id, "dev: issued ws ticket");
    Ok(Json(TicketResponse { ticket: tickets.issue(user_id) }))
}
