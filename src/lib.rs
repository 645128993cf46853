//! bot-state-cache: namespaced per-entity state over an async key/value cache.
//!
//! Callers read and write named fields of per-chat, per-user, global and
//! per-conversation dictionaries, while the underlying store only sees whole
//! values under opaque keys with an optional TTL.

pub mod cache;
pub mod config;
pub mod conversation;
pub mod server;
pub mod store;

pub use cache::field_store::{CacheError, ScopeHandle, ScopedCache};
pub use cache::key::{EntityKey, Namespace, Scope};
pub use cache::ttl::{CacheSettings, Ttl, TtlSource};
pub use conversation::{ConversationRouter, DispatchOutcome, HandlerRef, Update};
pub use store::{KeyValueStore, StoreError};
