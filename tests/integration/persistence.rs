use std::sync::Arc;

use txtline_core::SystemClock;
use txtline_store::PersistedStore;

use crate::*;

/// State written by one daemon is served by the next one over the same file.
#[tokio::test]
async fn test_restart_keeps_messages() {
    let path = temp_snapshot();

    {
        let store = PersistedStore::json_file(&path, Arc::new(SystemClock)).unwrap();
        let d = Daemon::start(Arc::new(store)).await.unwrap();
        let body = serde_json::json!({
            "message_id": "abcd",
            "chunks": { "c-0-abcd.data.covert.example.com": "00" },
            "manifest": "1:pending:0",
        });
        let (code, _) = d.post("/upload", &body).await.unwrap();
        assert_eq!(code, 200);
        let (_, resp) = d.get("/messages?client=alice").await.unwrap();
        assert_eq!(resp["messages"].as_array().unwrap().len(), 1);
    }

    let store = PersistedStore::json_file(&path, Arc::new(SystemClock)).unwrap();
    let d = Daemon::start(Arc::new(store)).await.unwrap();

    let (code, rec) = d.get("/lookup/c-0-abcd.data.covert.example.com").await.unwrap();
    assert_eq!(code, 200);
    assert_eq!(rec["value"], "00");

    let (_, status) = d.get("/messages/abcd/status").await.unwrap();
    assert_eq!(status["status"], "delivered to 1 clients");

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}
