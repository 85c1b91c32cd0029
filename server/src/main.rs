mod config;
mod db;
mod error;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use services::pg_store::PgStore;
use services::store::{ElementStore, MemoryStore};
use services::ticket::{DevTickets, HttpTicketValidator, RejectAll, TicketValidator};

#[tokio::main]
async fn main() {
    // Load .env before the subscriber so RUST_LOG can come from it.
    let dotenv = dotenvy::dotenv();
    tracing_subscriber::fmt::init();
    config::report_dotenv(&dotenv);

    let config = config::Config::from_env().expect("invalid configuration");

    let store: Arc<dyn ElementStore> = match &config.database_url {
        Some(url) => {
            let pool = db::init_pool(url, config.db_max_connections)
                .await
                .expect("database init failed");
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; elements are kept in memory and lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let dev_tickets = config
        .dev_tickets
        .then(|| Arc::new(DevTickets::new(config.ticket_ttl)));

    let tickets: Arc<dyn TicketValidator> = if let Some(url) = &config.ticket_validation_url {
        tracing::info!(url = %url, "validating ws tickets against auth api");
        Arc::new(HttpTicketValidator::new(url.clone()).expect("failed to build ticket http client"))
    } else if let Some(dev) = &dev_tickets {
        tracing::warn!("DEV_TICKETS enabled; tickets are issued in-process without authentication");
        dev.clone()
    } else {
        Arc::new(RejectAll)
    };
    if !config.accepts_tickets() {
        tracing::warn!("no ticket source configured; every websocket upgrade will be refused");
    }

    let port = config.port;
    let state = state::AppState::new(store, tickets, dev_tickets, config);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "whiteboard relay listening");
    axum::serve(listener, app).await.expect("server failed");
}
