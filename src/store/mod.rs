//! The underlying key/value store this crate layers namespaces on top of.
//!
//! - [`KeyValueStore`]: the async capability the field store consumes
//! - [`memory`]: an in-process reference backend with per-entry deadlines

pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("write rejected for key {key}: {reason}")]
    Rejected { key: String, reason: String },

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Whole-value async storage with optional per-key TTL.
///
/// Values are opaque to the store; a `ttl` of `None` means the entry
/// never expires.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the value stored at `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Store `value` at `key`, replacing whatever was there.
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Remove `key`. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Remove every key in `keys`.
    async fn delete_multiple(&self, keys: &[String]) -> Result<(), StoreError>;

    /// Remove everything.
    async fn clear(&self) -> Result<(), StoreError>;

    /// Whether a live value exists at `key`.
    async fn has(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key).await?.is_some())
    }

    /// Store several values with a shared TTL.
    async fn set_multiple(
        &self,
        entries: Vec<(String, Value)>,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        for (key, value) in entries {
            self.set(&key, value, ttl).await?;
        }
        Ok(())
    }
}
