//! Answers single-name TXT lookups out of the queue's store.

use std::sync::Arc;

use txtline_core::config::ChannelConfig;
use txtline_core::names::{canonical_label, parse_frame_label, strip_time_prefix};
use txtline_core::TxtRecord;

use crate::queue::QueueManager;
use crate::store::{Result, StoreError, StoredMessage};

/// First label that turns a lookup into a queue-discovery request:
/// `consume.{client}.{anything}`.
pub const DISCOVERY_LABEL: &str = "consume";

#[derive(Clone)]
pub struct Resolver {
    queue: Arc<QueueManager>,
    channel: ChannelConfig,
}

impl Resolver {
    pub fn new(queue: Arc<QueueManager>, channel: ChannelConfig) -> Self {
        Self { queue, channel }
    }

    pub fn queue(&self) -> &Arc<QueueManager> {
        &self.queue
    }

    pub fn resolve(&self, name: &str) -> Result<TxtRecord> {
        let name = name.trim_end_matches('.').to_ascii_lowercase();
        let mut labels = name.split('.');
        let first = labels.next().unwrap_or_default();

        if first == DISCOVERY_LABEL {
            let client = labels
                .next()
                .filter(|c| !c.is_empty())
                .ok_or_else(|| StoreError::NotFound(name.clone()))?;
            return self.discover(&name, client);
        }

        let label = strip_time_prefix(first);

        if let Some(id) = label.strip_prefix("m-") {
            let msg = self.find_message(id)?;
            tracing::debug!(name = %name, message_id = %msg.id, "manifest lookup");
            return Ok(TxtRecord::txt(name.clone(), self.channel.record_ttl, msg.manifest));
        }

        if let Some((seq, id)) = parse_frame_label(label) {
            let value = self.frame_value(&name, label, &id)?;
            tracing::debug!(name = %name, sequence = seq, "frame lookup");
            return Ok(TxtRecord::txt(name.clone(), self.channel.record_ttl, value));
        }

        Err(StoreError::NotFound(name))
    }

    fn discover(&self, name: &str, client: &str) -> Result<TxtRecord> {
        let messages = self.queue.consume(client)?;
        if messages.is_empty() {
            return Err(StoreError::NotFound(format!("new messages for {client}")));
        }
        let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
        Ok(TxtRecord::txt(name, self.channel.discovery_ttl, ids.join(",")))
    }

    /// Exact name first; then any frame of the message whose label matches
    /// once time buckets are ignored.
    fn frame_value(&self, name: &str, label: &str, id: &str) -> Result<String> {
        let store = self.queue.store();
        if let Some(owner) = store.chunk_owner(name) {
            return store.get_chunk(&owner, name);
        }

        let msg = self.find_message(id)?;
        msg.chunks
            .iter()
            .find(|(stored, _)| canonical_label(stored) == label)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    /// Look a message up by the id used in its labels, which may be a
    /// truncated form of the stored id or unrelated to it entirely. Anything
    /// other than exactly one candidate is a miss.
    fn find_message(&self, label_id: &str) -> Result<StoredMessage> {
        if label_id.is_empty() {
            return Err(StoreError::NotFound("empty message id".into()));
        }

        let store = self.queue.store();
        match store.get_message(label_id) {
            Err(StoreError::NotFound(_)) => {}
            other => return other,
        }

        let mut candidates = store.list_messages()?.into_iter().filter(|m| {
            m.id.to_ascii_lowercase().starts_with(label_id)
                || m.chunks.keys().any(|k| {
                    parse_frame_label(&canonical_label(k)).is_some_and(|(_, id)| id == label_id)
                })
        });

        match (candidates.next(), candidates.next()) {
            (Some(msg), None) => Ok(msg),
            (Some(_), Some(_)) => {
                tracing::debug!(label_id, "ambiguous message id");
                Err(StoreError::NotFound(format!("message {label_id}")))
            }
            (None, _) => Err(StoreError::NotFound(format!("message {label_id}"))),
        }
    }
}
