use crate::*;

async fn publish(d: &Daemon, id: &str) {
    let body = serde_json::json!({
        "message_id": id,
        "chunks": { (format!("c-0-{id}.data.covert.example.com")): "00" },
        "manifest": "1:pending:0",
    });
    let (code, _) = d.post("/upload", &body).await.unwrap();
    assert_eq!(code, 200);
}

/// Only the first client to discover a message receives it; acknowledgment
/// is idempotent.
#[tokio::test]
async fn test_fan_out_and_ack() {
    let d = Daemon::in_memory().await.unwrap();
    publish(&d, "aa").await;

    // alice sees it over the discovery name, bob never gets to: it is no
    // longer New once alice has it
    let (code, rec) = d.get("/lookup/consume.alice.covert.example.com").await.unwrap();
    assert_eq!(code, 200);
    assert_eq!(rec["value"], "aa");
    assert_eq!(rec["ttl"], 60);

    let (_, resp) = d.get("/messages?client=bob").await.unwrap();
    assert_eq!(resp["messages"].as_array().unwrap().len(), 0);

    let (_, status) = d.get("/messages/aa/status").await.unwrap();
    assert_eq!(status["status"], "delivered to 1 clients");

    let ack = serde_json::json!({ "message_id": "aa", "client_id": "alice" });
    let (code, first) = d.post("/consume", &ack).await.unwrap();
    assert_eq!(code, 200);
    assert_eq!(first["status"], "consumed");
    let (_, before) = d.get("/status").await.unwrap();

    let (code, second) = d.post("/consume", &ack).await.unwrap();
    assert_eq!(code, 200);
    assert_eq!(second["status"], "consumed");
    let (_, after) = d.get("/status").await.unwrap();
    assert_eq!(before["stats"], after["stats"]);
}

#[tokio::test]
async fn test_each_client_discovers_once() {
    let d = Daemon::in_memory().await.unwrap();
    publish(&d, "aa").await;
    publish(&d, "bb").await;

    let (_, resp) = d.get("/messages?client=alice").await.unwrap();
    let mut ids: Vec<&str> = resp["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    ids.sort();
    assert_eq!(ids, ["aa", "bb"]);

    let (_, again) = d.get("/messages?client=alice").await.unwrap();
    assert!(again["messages"].as_array().unwrap().is_empty());

    let (code, _) = d.get("/lookup/consume.alice.covert.example.com").await.unwrap();
    assert_eq!(code, 404);
}

#[tokio::test]
async fn test_queue_errors() {
    let d = Daemon::in_memory().await.unwrap();

    let (code, _) = d.get("/messages").await.unwrap();
    assert_eq!(code, 400);

    let (code, _) = d.get("/messages/zz/status").await.unwrap();
    assert_eq!(code, 404);

    let ack = serde_json::json!({ "message_id": "zz", "client_id": "alice" });
    let (code, _) = d.post("/consume", &ack).await.unwrap();
    assert_eq!(code, 404);
}
