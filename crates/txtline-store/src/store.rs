//! Stored-message model and the `MessageStore` trait both backends implement.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::persisted::PersistError;

/// Lifecycle of a stored message. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageState {
    /// Uploaded, never fetched.
    #[default]
    New,
    /// Fetched by at least one client.
    Delivered,
    /// Acknowledged.
    Consumed,
    /// Swept by the TTL cleaner.
    Expired,
}

impl MessageState {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageState::New => "new",
            MessageState::Delivered => "delivered",
            MessageState::Consumed => "consumed",
            MessageState::Expired => "expired",
        }
    }
}

/// One fetch of a message by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerRecord {
    pub client_id: String,
    /// Unix ms.
    pub fetched_at: u64,
    #[serde(default)]
    pub chunks_fetched: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    /// Frame record name → record value.
    pub chunks: BTreeMap<String, String>,
    pub total_chunks: usize,
    /// Manifest record value.
    pub manifest: String,
    /// Unix ms. Set by the store on insert.
    pub created_at: u64,
    pub state: MessageState,
    #[serde(default)]
    pub consumers: Vec<ConsumerRecord>,
}

impl StoredMessage {
    pub fn new(id: impl Into<String>, chunks: BTreeMap<String, String>, manifest: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            total_chunks: chunks.len(),
            chunks,
            manifest: manifest.into(),
            created_at: 0,
            state: MessageState::New,
            consumers: Vec::new(),
        }
    }

    /// Rough heap footprint of the message's strings.
    pub fn approx_size(&self) -> usize {
        self.id.len()
            + self.manifest.len()
            + self.chunks.iter().map(|(k, v)| k.len() + v.len()).sum::<usize>()
    }
}

/// Aggregate counters. By-state counts always sum to `total_messages`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreStats {
    pub total_messages: usize,
    pub new_messages: usize,
    pub delivered: usize,
    pub consumed: usize,
    /// Messages removed by sweeps since the store was created.
    pub expired: usize,
    pub total_chunks: usize,
    /// Approximate bytes held by message strings.
    pub memory_usage: usize,
}

impl StoreStats {
    pub(crate) fn counter(&mut self, state: MessageState) -> Option<&mut usize> {
        match state {
            MessageState::New => Some(&mut self.new_messages),
            MessageState::Delivered => Some(&mut self.delivered),
            MessageState::Consumed => Some(&mut self.consumed),
            MessageState::Expired => None,
        }
    }

    /// Move one message from `from` to `to` in the by-state counters.
    pub(crate) fn transition(&mut self, from: MessageState, to: MessageState) {
        if from == to {
            return;
        }
        if let Some(c) = self.counter(from) {
            *c = c.saturating_sub(1);
        }
        if let Some(c) = self.counter(to) {
            *c += 1;
        }
    }
}

/// Full store state as written to disk. The frame-name index is derived
/// and rebuilt on load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub messages: BTreeMap<String, StoredMessage>,
    pub index: BTreeMap<String, BTreeSet<String>>,
    pub stats: StoreStats,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("message {0} already exists")]
    Duplicate(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("malformed message: {0}")]
    Malformed(String),

    #[error(transparent)]
    Persistence(#[from] PersistError),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Message storage with per-client queue bookkeeping.
///
/// Implementations serialize every call through one lock; callers may share
/// a store across threads freely.
pub trait MessageStore: Send + Sync {
    /// Insert a new message in state `New`, stamping `created_at`.
    fn store_message(&self, msg: StoredMessage) -> Result<()>;

    fn get_message(&self, id: &str) -> Result<StoredMessage>;

    /// Value of frame record `name` belonging to message `message_id`.
    fn get_chunk(&self, message_id: &str, name: &str) -> Result<String>;

    /// Id of the message that owns frame record `name`.
    fn chunk_owner(&self, name: &str) -> Option<String>;

    /// Messages in state `New` that `client_id` has not been told about yet.
    fn get_new_messages(&self, client_id: &str) -> Result<Vec<StoredMessage>>;

    fn mark_as_delivered(&self, message_id: &str, client_id: &str) -> Result<()>;

    fn mark_as_consumed(&self, message_id: &str, client_id: &str) -> Result<()>;

    /// All messages, oldest first.
    fn list_messages(&self) -> Result<Vec<StoredMessage>>;

    /// Remove messages created more than `ttl` ago. Returns how many.
    fn clean_expired(&self, ttl: Duration) -> Result<usize>;

    fn stats(&self) -> StoreStats;
}
