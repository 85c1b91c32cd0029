//! Domain services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own room membership, persistence and ticket concerns so
//! route handlers can stay focused on protocol translation and auth plumbing.

pub mod heartbeat;
pub mod pg_store;
pub mod room;
pub mod store;
pub mod ticket;
