//! Websocket ticket validation.
//!
//! ARCHITECTURE
//! ============
//! Browsers cannot attach auth headers to a websocket upgrade, so clients
//! first obtain a short-lived single-use ticket from the authenticated HTTP
//! API and pass it as `?ticket=` on the upgrade. The relay exchanges the
//! ticket for a user id before accepting the socket.
//!
//! Two sources are supported:
//! - [`HttpTicketValidator`] calls `GET {base}/internal/validate-ticket/{ticket}`
//!   on the auth API, which answers `{"userId": ...}` or a 4xx.
//! - [`DevTickets`] issues and consumes tickets in-process, for local
//!   development without the auth API.
//!
//! With neither configured, [`RejectAll`] refuses every ticket.
//!
//! TRADE-OFFS
//! ==========
//! Consumption is destructive: a ticket is removed on first presentation even
//! if it has expired, which favors replay safety over reconnect convenience.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rand::Rng;
use serde::Deserialize;

use crate::error::ErrorCode;

const VALIDATION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum TicketError {
    #[error("ticket rejected")]
    Rejected,
    #[error("no ticket validator configured")]
    NotConfigured,
    #[error("ticket validator unavailable: {0}")]
    Unavailable(String),
}

impl ErrorCode for TicketError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Rejected => "E_TICKET_REJECTED",
            Self::NotConfigured => "E_TICKET_UNCONFIGURED",
            Self::Unavailable(_) => "E_TICKET_UNAVAILABLE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Exchanges a websocket ticket for the id of the user it was issued to.
#[async_trait::async_trait]
pub trait TicketValidator: Send + Sync {
    async fn validate(&self, ticket: &str) -> Result<String, TicketError>;
}

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Generate a short-lived 16-byte hex ticket.
#[must_use]
pub fn generate_ticket() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// Tickets are opaque tokens, but they are spliced into a URL path.
fn is_well_formed(ticket: &str) -> bool {
    !ticket.is_empty() && ticket.len() <= 128 && ticket.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

// =============================================================================
// HTTP VALIDATOR
// =============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidatedTicket {
    user_id: String,
}

/// Validates tickets against the auth API.
pub struct HttpTicketValidator {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTicketValidator {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(VALIDATION_TIMEOUT).build()?;
        Ok(Self { client, base_url: base_url.into() })
    }

    fn url(&self, ticket: &str) -> String {
        format!("{}/internal/validate-ticket/{ticket}", self.base_url)
    }
}

#[async_trait::async_trait]
impl TicketValidator for HttpTicketValidator {
    async fn validate(&self, ticket: &str) -> Result<String, TicketError> {
        if !is_well_formed(ticket) {
            return Err(TicketError::Rejected);
        }

        let response = self
            .client
            .get(self.url(ticket))
            .send()
            .await
            .map_err(|e| TicketError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            return Err(TicketError::Rejected);
        }
        if !status.is_success() {
            return Err(TicketError::Unavailable(format!("validator answered {status}")));
        }

        let body: ValidatedTicket = response
            .json()
            .await
            .map_err(|e| TicketError::Unavailable(e.to_string()))?;
        if body.user_id.is_empty() {
            return Err(TicketError::Rejected);
        }
        Ok(body.user_id)
    }
}

// =============================================================================
// IN-PROCESS TICKETS
// =============================================================================

/// Single-use tickets issued and consumed inside this process.
pub struct DevTickets {
    ttl: Duration,
    tickets: Mutex<HashMap<String, (String, Instant)>>,
}

impl DevTickets {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, tickets: Mutex::new(HashMap::new()) }
    }

    /// Issue a ticket for `user_id`. Expired tickets are swept on the way.
    #[must_use]
    pub fn issue(&self, user_id: &str) -> String {
        let ticket = generate_ticket();
        let now = Instant::now();
        let mut tickets = self
            .tickets
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        tickets.retain(|_, (_, expires_at)| *expires_at > now);
        tickets.insert(ticket.clone(), (user_id.to_owned(), now + self.ttl));
        ticket
    }

    fn consume(&self, ticket: &str, now: Instant) -> Result<String, TicketError> {
        let mut tickets = self
            .tickets
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match tickets.remove(ticket) {
            Some((user_id, expires_at)) if expires_at > now => Ok(user_id),
            _ => Err(TicketError::Rejected),
        }
    }
}

#[async_trait::async_trait]
impl TicketValidator for DevTickets {
    async fn validate(&self, ticket: &str) -> Result<String, TicketError> {
        self.consume(ticket, Instant::now())
    }
}

/// Used when no ticket source is configured.
pub struct RejectAll;

#[async_trait::async_trait]
impl TicketValidator for RejectAll {
    async fn validate(&self, _ticket: &str) -> Result<String, TicketError> {
        Err(TicketError::NotConfigured)
    }
}

#[cfg(test)]
#[path = "ticket_test.rs"]
mod tests;
