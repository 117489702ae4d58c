//! In-memory message store. One `RwLock` guards everything.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use txtline_core::{Clock, SystemClock};

use crate::store::{
    ConsumerRecord, MessageState, MessageStore, Result, Snapshot, StoreError, StoreStats,
    StoredMessage,
};

#[derive(Default)]
struct Inner {
    /// message id → message
    messages: HashMap<String, StoredMessage>,
    /// frame record name → owning message id
    frames: HashMap<String, String>,
    /// client id → ids that client has been told about
    index: BTreeMap<String, BTreeSet<String>>,
    stats: StoreStats,
}

impl Inner {
    fn index_frames(&mut self, msg: &StoredMessage) {
        for name in msg.chunks.keys() {
            if let Some(prev) = self.frames.insert(name.clone(), msg.id.clone()) {
                if prev != msg.id {
                    tracing::warn!(name = %name, previous = %prev, message_id = %msg.id, "frame name now served by a newer message");
                }
            }
        }
    }
}

/// Volatile store. Clones share the same state.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            clock,
        }
    }

    /// Copy of the persistent part of the state.
    pub fn snapshot(&self) -> Snapshot {
        let inner = self.inner.read();
        Snapshot {
            messages: inner
                .messages
                .iter()
                .map(|(id, m)| (id.clone(), m.clone()))
                .collect(),
            index: inner.index.clone(),
            stats: inner.stats,
        }
    }

    /// Replace the whole state with `snapshot`, rebuilding the frame index.
    pub fn restore(&self, snapshot: Snapshot) {
        let mut inner = self.inner.write();
        inner.messages = snapshot.messages.into_iter().collect();
        inner.index = snapshot.index;
        inner.stats = snapshot.stats;
        inner.frames.clear();

        let messages: Vec<StoredMessage> = inner.messages.values().cloned().collect();
        for msg in &messages {
            inner.index_frames(msg);
        }
        tracing::debug!(
            messages = inner.messages.len(),
            frames = inner.frames.len(),
            "store state restored"
        );
    }
}

impl MessageStore for MemoryStore {
    fn store_message(&self, mut msg: StoredMessage) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.messages.contains_key(&msg.id) {
            return Err(StoreError::Duplicate(msg.id));
        }

        msg.state = MessageState::New;
        msg.created_at = self.clock.now_ms();
        msg.total_chunks = msg.chunks.len();

        inner.index_frames(&msg);
        inner.stats.total_messages += 1;
        inner.stats.new_messages += 1;
        inner.stats.total_chunks += msg.chunks.len();

        tracing::debug!(message_id = %msg.id, chunks = msg.chunks.len(), "message stored");
        inner.messages.insert(msg.id.clone(), msg);
        Ok(())
    }

    fn get_message(&self, id: &str) -> Result<StoredMessage> {
        self.inner
            .read()
            .messages
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("message {id}")))
    }

    fn get_chunk(&self, message_id: &str, name: &str) -> Result<String> {
        let inner = self.inner.read();
        inner
            .messages
            .get(message_id)
            .and_then(|m| m.chunks.get(name))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("chunk {name}")))
    }

    fn chunk_owner(&self, name: &str) -> Option<String> {
        self.inner.read().frames.get(name).cloned()
    }

    fn get_new_messages(&self, client_id: &str) -> Result<Vec<StoredMessage>> {
        let inner = self.inner.read();
        let seen = inner.index.get(client_id);

        let mut out: Vec<StoredMessage> = inner
            .messages
            .values()
            .filter(|m| m.state == MessageState::New)
            .filter(|m| seen.map_or(true, |s| !s.contains(&m.id)))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }

    fn mark_as_delivered(&self, message_id: &str, client_id: &str) -> Result<()> {
        let now = self.clock.now_ms();
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        let msg = inner
            .messages
            .get_mut(message_id)
            .ok_or_else(|| StoreError::NotFound(format!("message {message_id}")))?;

        if msg.state == MessageState::New {
            msg.state = MessageState::Delivered;
            inner.stats.transition(MessageState::New, MessageState::Delivered);
        }
        msg.consumers.push(ConsumerRecord {
            client_id: client_id.to_string(),
            fetched_at: now,
            chunks_fetched: msg.chunks.keys().cloned().collect(),
        });

        inner
            .index
            .entry(client_id.to_string())
            .or_default()
            .insert(message_id.to_string());

        tracing::debug!(message_id, client_id, consumers = msg.consumers.len(), "message delivered");
        Ok(())
    }

    fn mark_as_consumed(&self, message_id: &str, client_id: &str) -> Result<()> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        let msg = inner
            .messages
            .get_mut(message_id)
            .ok_or_else(|| StoreError::NotFound(format!("message {message_id}")))?;

        if msg.state != MessageState::Consumed {
            inner.stats.transition(msg.state, MessageState::Consumed);
            msg.state = MessageState::Consumed;
            tracing::debug!(message_id, client_id, "message consumed");
        }
        Ok(())
    }

    fn list_messages(&self) -> Result<Vec<StoredMessage>> {
        let mut out: Vec<StoredMessage> = self.inner.read().messages.values().cloned().collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }

    fn clean_expired(&self, ttl: Duration) -> Result<usize> {
        let cutoff = self.clock.now_ms().saturating_sub(ttl.as_millis() as u64);
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        let expired: Vec<String> = inner
            .messages
            .values()
            .filter(|m| m.created_at < cutoff)
            .map(|m| m.id.clone())
            .collect();

        for id in &expired {
            let Some(msg) = inner.messages.remove(id) else {
                continue;
            };
            for name in msg.chunks.keys() {
                if inner.frames.get(name).is_some_and(|owner| owner == id) {
                    inner.frames.remove(name);
                }
            }
            inner.stats.transition(msg.state, MessageState::Expired);
            inner.stats.total_messages = inner.stats.total_messages.saturating_sub(1);
            inner.stats.total_chunks = inner.stats.total_chunks.saturating_sub(msg.chunks.len());
            inner.stats.expired += 1;
            tracing::debug!(message_id = %id, chunks = msg.chunks.len(), "message expired");
        }

        Ok(expired.len())
    }

    fn stats(&self) -> StoreStats {
        let inner = self.inner.read();
        let mut stats = inner.stats;
        stats.memory_usage = inner.messages.values().map(StoredMessage::approx_size).sum();
        stats
    }
}
