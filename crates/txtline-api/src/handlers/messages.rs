//! /messages, /messages/{id}/status, /consume: queue endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use txtline_store::StoredMessage;

use super::{store_error, ApiState};

// ── /messages?client= (GET) ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub client: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub client_id: String,
    pub messages: Vec<MessageJson>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageJson {
    pub id: String,
    pub total_chunks: usize,
    pub manifest: String,
    /// Unix ms.
    pub created_at: u64,
    /// Frame record names, in name order.
    pub chunks: Vec<String>,
}

impl From<StoredMessage> for MessageJson {
    fn from(m: StoredMessage) -> Self {
        Self {
            id: m.id,
            total_chunks: m.total_chunks,
            manifest: m.manifest,
            created_at: m.created_at,
            chunks: m.chunks.into_keys().collect(),
        }
    }
}

/// Deliver every message `client` has not seen yet.
pub async fn handle_get_messages(
    State(state): State<ApiState>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<MessagesResponse>, (StatusCode, String)> {
    let client_id = query
        .client
        .filter(|c| !c.trim().is_empty())
        .ok_or((StatusCode::BAD_REQUEST, "client is required".to_string()))?;

    let messages = state.queue.consume(&client_id).map_err(store_error)?;

    Ok(Json(MessagesResponse {
        client_id,
        messages: messages.into_iter().map(MessageJson::from).collect(),
    }))
}

// ── /consume (POST) ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize)]
pub struct ConsumeRequest {
    pub message_id: String,
    pub client_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub message_id: String,
    pub status: String,
}

pub async fn handle_consume(
    State(state): State<ApiState>,
    Json(req): Json<ConsumeRequest>,
) -> Result<Json<StatusResponse>, (StatusCode, String)> {
    state
        .queue
        .acknowledge(&req.message_id, &req.client_id)
        .map_err(store_error)?;
    let status = state.queue.status(&req.message_id).map_err(store_error)?;

    Ok(Json(StatusResponse {
        message_id: req.message_id,
        status,
    }))
}

// ── /messages/{id}/status (GET) ───────────────────────────────────────────────

pub async fn handle_message_status(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, (StatusCode, String)> {
    let status = state.queue.status(&id).map_err(store_error)?;
    Ok(Json(StatusResponse {
        message_id: id,
        status,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::state;

    fn publish(state: &ApiState, id: &str) {
        state
            .queue
            .publish(id, [(format!("c-0-{id}.d.x.com"), "v".to_string())].into(), "1:pending:0")
            .unwrap();
    }

    #[tokio::test]
    async fn consume_flow() {
        let state = state();
        publish(&state, "aa");

        let Json(resp) = handle_get_messages(
            State(state.clone()),
            Query(MessagesQuery {
                client: Some("alice".into()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(resp.messages.len(), 1);
        assert_eq!(resp.messages[0].id, "aa");
        assert_eq!(resp.messages[0].chunks, ["c-0-aa.d.x.com"]);

        let Json(status) = handle_message_status(State(state.clone()), Path("aa".into()))
            .await
            .unwrap();
        assert_eq!(status.status, "delivered to 1 clients");

        let req = ConsumeRequest {
            message_id: "aa".into(),
            client_id: "alice".into(),
        };
        let Json(status) = handle_consume(State(state), Json(req)).await.unwrap();
        assert_eq!(status.status, "consumed");
    }

    #[tokio::test]
    async fn missing_client_is_bad_request() {
        let (code, _) = handle_get_messages(State(state()), Query(MessagesQuery { client: None }))
            .await
            .unwrap_err();
        assert_eq!(code, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_message_is_not_found() {
        let (code, _) = handle_message_status(State(state()), Path("nope".into()))
            .await
            .unwrap_err();
        assert_eq!(code, StatusCode::NOT_FOUND);

        let req = ConsumeRequest {
            message_id: "nope".into(),
            client_id: "alice".into(),
        };
        let (code, _) = handle_consume(State(state()), Json(req)).await.unwrap_err();
        assert_eq!(code, StatusCode::NOT_FOUND);
    }
}
