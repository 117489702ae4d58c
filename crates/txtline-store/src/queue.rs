//! Queue semantics over a [`MessageStore`]: publish, consume, acknowledge.
//!
//! Delivery is at-least-once. Every client discovers each `New` message
//! once, independently of other clients; acknowledging moves it to
//! `Consumed`.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::store::{MessageState, MessageStore, Result, StoreError, StoredMessage};

#[derive(Clone)]
pub struct QueueManager {
    store: Arc<dyn MessageStore>,
}

impl QueueManager {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    /// Wrap the frame records into a stored message and insert it.
    pub fn publish(&self, id: &str, chunks: BTreeMap<String, String>, manifest: &str) -> Result<()> {
        if id.trim().is_empty() {
            return Err(StoreError::Malformed("empty message id".into()));
        }
        if chunks.is_empty() {
            return Err(StoreError::Malformed(format!("message {id} has no chunks")));
        }
        let total = chunks.len();
        self.store.store_message(StoredMessage::new(id, chunks, manifest))?;
        tracing::info!(message_id = id, chunks = total, "message published");
        Ok(())
    }

    /// New messages for `client_id`, each marked delivered to it.
    ///
    /// Listing and marking take the store lock separately. A message swept
    /// in between is skipped.
    pub fn consume(&self, client_id: &str) -> Result<Vec<StoredMessage>> {
        let messages = self.store.get_new_messages(client_id)?;
        let mut delivered = Vec::with_capacity(messages.len());

        for msg in messages {
            match self.store.mark_as_delivered(&msg.id, client_id) {
                Ok(()) => delivered.push(msg),
                Err(StoreError::NotFound(_)) => {
                    tracing::warn!(message_id = %msg.id, client_id, "message expired during delivery");
                }
                Err(e) => return Err(e),
            }
        }

        if !delivered.is_empty() {
            tracing::info!(client_id, messages = delivered.len(), "messages delivered");
        }
        Ok(delivered)
    }

    pub fn acknowledge(&self, id: &str, client_id: &str) -> Result<()> {
        self.store.mark_as_consumed(id, client_id)?;
        tracing::info!(message_id = id, client_id, "message acknowledged");
        Ok(())
    }

    /// Human-readable state.
    pub fn status(&self, id: &str) -> Result<String> {
        let msg = self.store.get_message(id)?;
        Ok(match msg.state {
            MessageState::Delivered => format!("delivered to {} clients", msg.consumers.len()),
            other => other.as_str().to_string(),
        })
    }
}
