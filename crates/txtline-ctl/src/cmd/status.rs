//! Daemon status.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json};

#[derive(Deserialize)]
struct DaemonStatus {
    domain: String,
    uptime_secs: u64,
    stats: Stats,
}

#[derive(Deserialize)]
struct Stats {
    total_messages: usize,
    new_messages: usize,
    delivered: usize,
    consumed: usize,
    expired: usize,
    total_chunks: usize,
    memory_usage: usize,
}

pub async fn cmd_status(port: u16) -> Result<()> {
    let resp: DaemonStatus = get_json(&format!("{}/status", base_url(port))).await?;
    let s = &resp.stats;

    println!("═══════════════════════════════════════");
    println!("  txtlined Status");
    println!("═══════════════════════════════════════");
    println!("  Domain     : {}", resp.domain);
    println!("  Uptime     : {}s", resp.uptime_secs);
    println!("  Messages   : {}", s.total_messages);
    println!("    new        : {}", s.new_messages);
    println!("    delivered  : {}", s.delivered);
    println!("    consumed   : {}", s.consumed);
    println!("  Expired    : {}", s.expired);
    println!("  Chunks     : {}", s.total_chunks);
    println!("  Memory     : {} ({:.1} KB)", s.memory_usage, s.memory_usage as f64 / 1024.0);

    Ok(())
}
