//! /upload: ingest one message's TXT records.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{store_error, ApiState};

#[derive(Debug, Deserialize, Serialize)]
pub struct UploadRequest {
    pub message_id: String,
    /// Frame record name → value.
    pub chunks: BTreeMap<String, String>,
    #[serde(default)]
    pub manifest: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub status: String,
    pub message_id: String,
    pub chunks: usize,
}

pub async fn handle_upload(
    State(state): State<ApiState>,
    Json(req): Json<UploadRequest>,
) -> Result<Json<UploadResponse>, (StatusCode, String)> {
    let chunks = req.chunks.len();
    state
        .queue
        .publish(&req.message_id, req.chunks, &req.manifest)
        .map_err(store_error)?;

    Ok(Json(UploadResponse {
        status: "success".to_string(),
        message_id: req.message_id,
        chunks,
    }))
}
