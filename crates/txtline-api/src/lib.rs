pub mod handlers;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub use handlers::ApiState;

/// All routes, nested under `/api`.
pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/status", get(handlers::handle_status))
        .route("/upload", post(handlers::handle_upload))
        .route("/lookup/{name}", get(handlers::handle_lookup))
        .route("/messages", get(handlers::handle_get_messages))
        .route("/messages/{id}/status", get(handlers::handle_message_status))
        .route("/consume", post(handlers::handle_consume))
        .with_state(state);

    Router::new().nest("/api", api_routes).layer(cors)
}

pub async fn serve(state: ApiState, port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!(port, "API listening on 127.0.0.1");
    serve_on(listener, state).await
}

/// Serve on an already-bound listener.
pub async fn serve_on(listener: TcpListener, state: ApiState) -> anyhow::Result<()> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}
