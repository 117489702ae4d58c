//! /status: store counters and daemon uptime.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use txtline_store::StoreStats;

use super::ApiState;

#[derive(Debug, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub domain: String,
    pub uptime_secs: u64,
    pub stats: StoreStats,
}

pub async fn handle_status(State(state): State<ApiState>) -> Json<DaemonStatus> {
    Json(DaemonStatus {
        domain: state.domain.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        stats: state.queue.store().stats(),
    })
}
