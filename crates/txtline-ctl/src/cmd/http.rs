//! Shared HTTP request helpers for CLI commands.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use txtline_core::TxtRecord;

pub fn base_url(port: u16) -> String {
    format!("http://127.0.0.1:{}/api", port)
}

async fn read_json<T: for<'de> Deserialize<'de>>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!("txtlined answered {}: {}", status, body.trim());
    }
    resp.json::<T>().await.context("failed to parse response")
}

pub async fn get_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    let resp = reqwest::get(url)
        .await
        .with_context(|| format!("failed to connect to txtlined at {}; is it running?", url))?;
    read_json(resp).await
}

pub async fn post_json_body<T, R>(url: &str, body: &T) -> Result<R>
where
    T: Serialize,
    R: for<'de> Deserialize<'de>,
{
    let resp = reqwest::Client::new()
        .post(url)
        .json(body)
        .send()
        .await
        .with_context(|| format!("failed to connect to txtlined at {}; is it running?", url))?;
    read_json(resp).await
}

/// One TXT lookup. `None` when the daemon has no answer for `name`.
pub async fn lookup(port: u16, name: &str) -> Result<Option<TxtRecord>> {
    let url = format!("{}/lookup/{}", base_url(port), name);
    let resp = reqwest::get(&url)
        .await
        .with_context(|| format!("failed to connect to txtlined at {}; is it running?", url))?;
    if resp.status() == reqwest::StatusCode::NOT_FOUND {
        tracing::debug!(name, "lookup miss");
        return Ok(None);
    }
    read_json(resp).await.map(Some)
}
