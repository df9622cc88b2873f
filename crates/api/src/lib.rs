//! HTTP surface for the dispatcher.
//!
//! Endpoints:
//! - GET  /health — liveness
//! - POST /triggers/notification-queue — document-created event for a queue record

pub mod routes;
pub mod state;
