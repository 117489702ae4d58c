//! /lookup/{name}: answer one TXT query.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use txtline_core::TxtRecord;
use txtline_store::StoreError;

use super::{store_error, ApiState};

pub async fn handle_lookup(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<Json<TxtRecord>, (StatusCode, String)> {
    match state.resolver.resolve(&name) {
        Ok(record) => Ok(Json(record)),
        Err(StoreError::NotFound(what)) => {
            tracing::debug!(name = %name, missing = %what, "lookup miss");
            Err((StatusCode::NOT_FOUND, "not found".to_string()))
        }
        Err(e) => Err(store_error(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::state;

    #[tokio::test]
    async fn hit_and_miss() {
        let state = state();
        state
            .queue
            .publish(
                "abcd",
                [("c-0-abcd.data.covert.example.com".to_string(), "444e".to_string())].into(),
                "1:pending:0",
            )
            .unwrap();

        let Json(rec) = handle_lookup(State(state.clone()), Path("c-0-abcd.data.covert.example.com".into()))
            .await
            .unwrap();
        assert_eq!(rec.value, "444e");
        assert_eq!(rec.record_type, "TXT");

        let (code, body) = handle_lookup(State(state), Path("c-1-abcd.data.covert.example.com".into()))
            .await
            .unwrap_err();
        assert_eq!(code, StatusCode::NOT_FOUND);
        assert_eq!(body, "not found");
    }
}
