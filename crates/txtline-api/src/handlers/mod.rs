//! HTTP API handlers: ingest, lookup and queue endpoints over the store.

pub mod lookup;
pub mod messages;
pub mod status;
pub mod upload;

use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;

use txtline_core::config::ChannelConfig;
use txtline_store::{QueueManager, Resolver, StoreError};

#[derive(Clone)]
pub struct ApiState {
    pub queue: Arc<QueueManager>,
    pub resolver: Resolver,
    /// Zone the daemon answers for.
    pub domain: String,
    pub started_at: Instant,
}

impl ApiState {
    pub fn new(queue: Arc<QueueManager>, channel: ChannelConfig) -> Self {
        Self {
            domain: channel.domain.clone(),
            resolver: Resolver::new(queue.clone(), channel),
            queue,
            started_at: Instant::now(),
        }
    }
}

// ── Shared helpers ────────────────────────────────────────────────────────────

/// Map a store failure to a status code with a plain-text body.
fn store_error(e: StoreError) -> (StatusCode, String) {
    let status = match &e {
        StoreError::Duplicate(_) => StatusCode::CONFLICT,
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Malformed(_) => StatusCode::BAD_REQUEST,
        StoreError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(error = %e, "request failed");
    } else {
        tracing::debug!(error = %e, status = status.as_u16(), "request rejected");
    }
    (status, e.to_string())
}

pub use lookup::handle_lookup;
pub use messages::{handle_consume, handle_get_messages, handle_message_status};
pub use status::handle_status;
pub use upload::handle_upload;
