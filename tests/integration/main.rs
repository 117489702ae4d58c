//! txtline integration test harness.
//!
//! Each test starts the HTTP API in-process on an ephemeral port over its
//! own store and drives it with reqwest, the way txtline-ctl does.
//!
//!   cargo test --test integration

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use txtline_core::config::ChannelConfig;
use txtline_store::{MemoryStore, MessageStore, QueueManager};

mod persistence;
mod queue;
mod roundtrip;

// ── Harness ───────────────────────────────────────────────────────────────────

/// A running API over one store. Aborted on drop.
pub struct Daemon {
    pub base: String,
    pub queue: Arc<QueueManager>,
    handle: JoinHandle<()>,
}

impl Drop for Daemon {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl Daemon {
    pub async fn start(store: Arc<dyn MessageStore>) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();

        let queue = Arc::new(QueueManager::new(store));
        let state = txtline_api::ApiState::new(queue.clone(), ChannelConfig::default());
        let handle = tokio::spawn(async move {
            if let Err(e) = txtline_api::serve_on(listener, state).await {
                eprintln!("api server failed: {e}");
            }
        });

        Ok(Self {
            base: format!("http://127.0.0.1:{port}/api"),
            queue,
            handle,
        })
    }

    pub async fn in_memory() -> Result<Self> {
        Self::start(Arc::new(MemoryStore::new())).await
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// GET returning status code and body as JSON (or the raw text as a
    /// JSON string when it does not parse).
    pub async fn get(&self, path: &str) -> Result<(u16, serde_json::Value)> {
        let resp = reqwest::get(self.url(path))
            .await
            .with_context(|| format!("GET {path}"))?;
        read(resp).await
    }

    pub async fn post(&self, path: &str, body: &serde_json::Value) -> Result<(u16, serde_json::Value)> {
        let resp = reqwest::Client::new()
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {path}"))?;
        read(resp).await
    }
}

async fn read(resp: reqwest::Response) -> Result<(u16, serde_json::Value)> {
    let status = resp.status().as_u16();
    let text = resp.text().await?;
    let body = serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text));
    Ok((status, body))
}

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Fresh path under the temp dir for a snapshot file.
pub fn temp_snapshot() -> PathBuf {
    let id = COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!("txtline-it-{}-{}", std::process::id(), id));
    let _ = std::fs::remove_dir_all(&dir);
    dir.join("state.json")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_status_reports_empty_store() {
    let d = Daemon::in_memory().await.unwrap();
    let (code, body) = d.get("/status").await.unwrap();
    assert_eq!(code, 200);
    assert_eq!(body["domain"], "covert.example.com");
    assert_eq!(body["stats"]["total_messages"], 0);
    assert_eq!(body["stats"]["total_chunks"], 0);
}
