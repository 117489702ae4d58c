//! Queue commands: discover, ack, state.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::http::{base_url, get_json, post_json_body};

#[derive(Deserialize)]
struct MessagesResponse {
    client_id: String,
    messages: Vec<MessageJson>,
}

#[derive(Deserialize)]
#[allow(dead_code)]
struct MessageJson {
    id: String,
    total_chunks: usize,
    manifest: String,
    created_at: u64,
    chunks: Vec<String>,
}

#[derive(Serialize)]
struct ConsumeRequest<'a> {
    message_id: &'a str,
    client_id: &'a str,
}

#[derive(Deserialize)]
struct StatusResponse {
    message_id: String,
    status: String,
}

fn discover_url(port: u16, client: &str) -> Result<reqwest::Url> {
    let base = format!("{}/messages", base_url(port));
    reqwest::Url::parse_with_params(&base, &[("client", client)]).context("failed to build discover url")
}

pub async fn cmd_discover(port: u16, client: &str) -> Result<()> {
    let resp: MessagesResponse = get_json(discover_url(port, client)?.as_str()).await?;

    if resp.messages.is_empty() {
        println!("No new messages for {}.", resp.client_id);
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  New messages for {} ({})", resp.client_id, resp.messages.len());
    println!("═══════════════════════════════════════");
    for m in &resp.messages {
        println!("  ┌─ {}", m.id);
        println!("  │  chunks   : {}", m.total_chunks);
        println!("  └─ manifest : {}", m.manifest);
    }
    Ok(())
}

pub async fn cmd_ack(port: u16, id: &str, client: &str) -> Result<()> {
    let req = ConsumeRequest {
        message_id: id,
        client_id: client,
    };
    let resp: StatusResponse = post_json_body(&format!("{}/consume", base_url(port)), &req).await?;
    println!("  {} : {}", resp.message_id, resp.status);
    Ok(())
}

pub async fn cmd_state(port: u16, id: &str) -> Result<()> {
    let resp: StatusResponse =
        get_json(&format!("{}/messages/{}/status", base_url(port), id)).await?;
    println!("  {} : {}", resp.message_id, resp.status);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_url_escapes_client_id() {
        let url = discover_url(8080, "a b&client=eve").unwrap();
        assert_eq!(url.path(), "/api/messages");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs, [("client".to_string(), "a b&client=eve".to_string())]);
    }
}
