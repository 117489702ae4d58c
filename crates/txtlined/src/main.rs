//! txtlined: serves stored messages as TXT lookups over the HTTP API.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use txtline_core::{parse_zone, SystemClock, TxtlineConfig};
use txtline_store::{MemoryStore, MessageStore, PersistedStore, QueueManager, StoreError};

mod sweep;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = TxtlineConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = TxtlineConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        TxtlineConfig::default()
    });
    tracing::info!(
        domain = %config.channel.domain,
        encoding = config.protocol.encoding.as_str(),
        persistent = config.server.persistent,
        "txtlined starting"
    );

    // Store
    let persisted = if config.server.persistent {
        let store = PersistedStore::json_file(&config.server.data_file, Arc::new(SystemClock))
            .with_context(|| format!("failed to open {}", config.server.data_file.display()))?;
        tracing::info!(path = %config.server.data_file.display(), "persistent store ready");
        Some(Arc::new(store))
    } else {
        None
    };
    let store: Arc<dyn MessageStore> = match &persisted {
        Some(p) => p.clone(),
        None => Arc::new(MemoryStore::new()),
    };
    let queue = Arc::new(QueueManager::new(store.clone()));

    if let Some(path) = &config.server.zone_file {
        if let Err(e) = load_zone(&queue, path) {
            tracing::warn!(path = %path.display(), error = %e, "zone file not loaded");
        }
    }
    log_stats(store.as_ref(), "store ready");

    // Shutdown broadcast
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);
    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    let sweep_task = tokio::spawn(sweep::sweep_loop(
        store.clone(),
        Duration::from_secs(config.server.clean_interval_secs.max(1)),
        Duration::from_secs(config.server.message_ttl_secs),
    ));

    let state = txtline_api::ApiState::new(queue.clone(), config.channel.clone());
    let api_port = config.server.api_port;
    let api_task = tokio::spawn(async move { txtline_api::serve(state, api_port).await });

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv() => tracing::info!("shutting down"),
        r = sweep_task         => tracing::error!("sweep task exited: {:?}", r),
        r = api_task           => tracing::error!("API server exited: {:?}", r),
    }

    if let Some(p) = &persisted {
        match p.save() {
            Ok(()) => tracing::info!(path = %config.server.data_file.display(), "final snapshot saved"),
            Err(e) => tracing::error!(error = %e, "final snapshot failed"),
        }
    }
    log_stats(store.as_ref(), "store at shutdown");

    Ok(())
}

/// Publish the TXT records of a zone file as one message.
fn load_zone(queue: &QueueManager, path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let zone = parse_zone(&text);

    let id = zone
        .message_id
        .clone()
        .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .context("zone has no manifest and the path has no file name")?;
    let chunks = zone.chunks.len();

    match queue.publish(&id, zone.chunks, zone.manifest.as_deref().unwrap_or_default()) {
        Ok(()) => {
            tracing::info!(message_id = %id, chunks, path = %path.display(), "zone file loaded");
            Ok(())
        }
        Err(StoreError::Duplicate(_)) => {
            tracing::info!(message_id = %id, "zone message already stored");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn log_stats(store: &dyn MessageStore, what: &str) {
    let s = store.stats();
    tracing::info!(
        messages = s.total_messages,
        new = s.new_messages,
        delivered = s.delivered,
        consumed = s.consumed,
        expired = s.expired,
        chunks = s.total_chunks,
        bytes = s.memory_usage,
        "{what}"
    );
}
