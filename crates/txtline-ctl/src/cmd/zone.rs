//! Render a file as a zone file, without talking to the daemon.

use anyhow::{Context, Result};

use txtline_core::{ChannelMapper, Clock, Fragmenter, SystemClock, TxtlineConfig, render_zone};

pub fn cmd_zone(config: &TxtlineConfig, file: &str, out: Option<&str>) -> Result<()> {
    let data = std::fs::read(file).with_context(|| format!("failed to read {}", file))?;

    let mut fragmenter = Fragmenter::new(config.protocol.clone());
    let msg = fragmenter.fragment(&data).context("failed to fragment input")?;
    let mapper = ChannelMapper::new(config.channel.clone(), config.protocol.clone());
    let (manifest, records) = mapper.encode_message(&msg);

    let zone = render_zone(&records, SystemClock.now_secs());
    match out {
        Some(path) => {
            std::fs::write(path, &zone).with_context(|| format!("failed to write {}", path))?;
            eprintln!(
                "  {} : {} records → {}",
                manifest.message_id,
                records.len(),
                path
            );
        }
        None => print!("{}", zone),
    }
    Ok(())
}
