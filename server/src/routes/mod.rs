//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! One Axum router serves the websocket upgrade at `/`, a health probe, the
//! room elements read and, in development, the ticket issuing endpoint. CORS
//! is permissive because the board UI is served from a different origin.

pub mod dev;
pub mod elements;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router: Router<AppState> = Router::new()
        .route("/", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .route("/api/rooms/{room_id}/elements", get(elements::list_elements));

    if state.dev_tickets.is_some() {
        router = router.route("/api/dev/ws-ticket", post(dev::issue_ticket));
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
