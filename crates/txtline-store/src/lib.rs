//! txtline-store: stored messages, queue bookkeeping and name lookups.
//!
//! `MemoryStore` keeps everything behind one lock; `PersistedStore` wraps it
//! and rewrites a JSON snapshot after every change.

pub mod memory;
pub mod persisted;
pub mod queue;
pub mod resolver;
pub mod store;

pub use memory::MemoryStore;
pub use persisted::{JsonFile, PersistError, PersistedStore, Persistence};
pub use queue::QueueManager;
pub use resolver::Resolver;
pub use store::{
    ConsumerRecord, MessageState, MessageStore, Snapshot, StoreError, StoreStats, StoredMessage,
};
