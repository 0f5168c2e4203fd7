//! Escrow backing store: capability trait and implementations.

pub mod memory;

pub use memory::MemoryStore;

use std::time::Duration;

use async_trait::async_trait;

/// Errors from the backing store.
///
/// A store failure (including a client-side timeout) is fatal for the
/// current request; the engine propagates it rather than retrying.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Key-value store capability used by the escrow engine.
///
/// Keys are namespaced strings; values are opaque serialized documents.
/// Each operation is atomic per key. `take` is the linearizable
/// fetch-and-delete the consume path relies on: two concurrent `take`s for
/// the same key must not both return the value.
#[async_trait]
pub trait EscrowStore: Send + Sync {
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Set or reset the key's time-to-live.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Atomically fetch and delete. Returns the value iff the key was
    /// present (and unexpired) at the moment of removal.
    async fn take(&self, key: &str) -> Result<Option<String>, StoreError>;
}
