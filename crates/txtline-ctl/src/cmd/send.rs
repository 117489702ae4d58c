//! send / fetch: move a file through the daemon as TXT records.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use txtline_core::fragment::reassemble;
use txtline_core::names::record_kind;
use txtline_core::{ChannelMapper, Fragmenter, RecordKind, TxtlineConfig};

use super::http::{base_url, lookup, post_json_body};

#[derive(Serialize)]
struct UploadRequest {
    message_id: String,
    chunks: BTreeMap<String, String>,
    manifest: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    status: String,
    message_id: String,
    chunks: usize,
}

pub async fn cmd_send(port: u16, config: &TxtlineConfig, file: &str) -> Result<()> {
    let data = std::fs::read(file).with_context(|| format!("failed to read {}", file))?;

    let mut fragmenter = Fragmenter::new(config.protocol.clone());
    let msg = fragmenter.fragment(&data).context("failed to fragment input")?;

    let mapper = ChannelMapper::new(config.channel.clone(), config.protocol.clone());
    let (manifest, records) = mapper.encode_message(&msg);

    let chunks: BTreeMap<String, String> = records
        .into_iter()
        .filter(|r| record_kind(&r.name) == Some(RecordKind::Frame))
        .map(|r| (r.name, r.value))
        .collect();

    let req = UploadRequest {
        message_id: manifest.message_id.clone(),
        chunks,
        manifest: manifest.value(),
    };
    let resp: UploadResponse = post_json_body(&format!("{}/upload", base_url(port)), &req).await?;

    println!("  {} : {}", resp.status, resp.message_id);
    println!("  bytes    : {}", data.len());
    println!("  frames   : {} ({})", resp.chunks, config.protocol.encoding.as_str());
    println!("  manifest : {}", mapper.manifest_name(&resp.message_id));

    Ok(())
}

pub async fn cmd_fetch(port: u16, config: &TxtlineConfig, id: &str, out: &str) -> Result<()> {
    let mapper = ChannelMapper::new(config.channel.clone(), config.protocol.clone());

    let manifest_record = lookup(port, &mapper.manifest_name(id))
        .await?
        .with_context(|| format!("no manifest published for {}", id))?;
    let manifest = mapper
        .parse_manifest_record(&manifest_record)
        .context("manifest record is malformed")?;
    let total = u16::try_from(manifest.total_frames).context("manifest claims too many frames")?;

    let mut records = vec![manifest_record];
    for seq in 0..total {
        match lookup(port, &mapper.frame_name(seq, id)).await? {
            Some(r) => records.push(r),
            None => tracing::warn!(message_id = id, sequence = seq, "frame not served"),
        }
    }

    let (frames, _) = mapper.parse_batch(&records);
    tracing::debug!(message_id = id, frames = frames.len(), total, "reassembling");
    let data = match reassemble(frames) {
        Ok(data) => data,
        Err(e) => {
            if let Some(missing) = e.missing() {
                bail!("message {} incomplete, missing frames {:?}", id, missing);
            }
            return Err(e).context("reassembly failed");
        }
    };

    std::fs::write(Path::new(out), &data).with_context(|| format!("failed to write {}", out))?;
    println!("  fetched {} : {} bytes in {} frames → {}", id, data.len(), total, out);
    Ok(())
}
