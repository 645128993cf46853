//! Field-level access to entity dictionaries.
//!
//! The store only knows whole values. [`ScopedCache`] gives every entity a
//! dictionary of named fields by reading the current dictionary, changing one
//! field and writing the whole dictionary back. There is no locking: two
//! mutations of the same entity that overlap in time race, and the later
//! write wins.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::cache::dictionary::{FieldDictionary, NotADictionary, NotASequence};
use crate::cache::key::{EntityKey, Scope};
use crate::cache::report::{FailureReporter, TracingReporter};
use crate::cache::ttl::{Ttl, TtlSource};
use crate::conversation::HandlerRef;
use crate::store::{KeyValueStore, StoreError};

/// Field holding the active handler in a conversation dictionary.
pub const CONVERSATION_STATE_FIELD: &str = "state";

#[derive(Error, Debug)]
pub enum CacheError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("value at {key} is not a dictionary")]
    MalformedDictionary { key: EntityKey, found: Value },

    #[error("field {field:?} at {key} is not a sequence")]
    NotASequence { key: EntityKey, field: String },

    #[error("could not convert field value: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Namespaced dictionary access over a [`KeyValueStore`].
#[derive(Clone)]
pub struct ScopedCache {
    store: Arc<dyn KeyValueStore>,
    ttl_source: Arc<dyn TtlSource>,
    reporter: Arc<dyn FailureReporter>,
}

impl ScopedCache {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl_source: Arc<dyn TtlSource>) -> Self {
        Self {
            store,
            ttl_source,
            reporter: Arc::new(TracingReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn FailureReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// The underlying store, for operations that bypass namespacing.
    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    pub(crate) fn reporter(&self) -> &dyn FailureReporter {
        self.reporter.as_ref()
    }

    pub fn scope(&self, scope: Scope) -> ScopeHandle<'_> {
        ScopeHandle {
            cache: self,
            key: scope.key(),
        }
    }

    pub fn global(&self) -> ScopeHandle<'_> {
        self.scope(Scope::Global)
    }

    pub fn chat(&self, chat_id: i64) -> ScopeHandle<'_> {
        self.scope(Scope::Chat(chat_id))
    }

    pub fn user(&self, user_id: i64) -> ScopeHandle<'_> {
        self.scope(Scope::User(user_id))
    }

    pub fn conversation(&self, chat_id: i64) -> ScopeHandle<'_> {
        self.scope(Scope::Conversation(chat_id))
    }

    /// Lifetime for a write requested with `ttl`, read from the source now.
    pub fn resolve_ttl(&self, ttl: Ttl) -> Option<Duration> {
        ttl.resolve(self.ttl_source.as_ref())
    }

    /// Read the whole dictionary at `key`.
    pub async fn get_dictionary(&self, key: &EntityKey) -> Result<Option<FieldDictionary>, CacheError> {
        let raw = self.store.get(key.as_str()).await?;
        FieldDictionary::from_stored(raw).map_err(|NotADictionary(found)| {
            CacheError::MalformedDictionary {
                key: key.clone(),
                found,
            }
        })
    }

    /// Read one field. A missing dictionary or field is `Ok(None)`.
    pub async fn get_field(&self, key: &EntityKey, field: &str) -> Result<Option<Value>, CacheError> {
        Ok(self
            .get_dictionary(key)
            .await?
            .and_then(|mut dict| dict.remove(field)))
    }

    /// Read one field and deserialize it.
    pub async fn get_field_as<T: DeserializeOwned>(
        &self,
        key: &EntityKey,
        field: &str,
    ) -> Result<Option<T>, CacheError> {
        match self.get_field(key, field).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Set `field` to `value`, keeping every other field.
    pub async fn set_field(
        &self,
        key: &EntityKey,
        field: &str,
        value: impl Into<Value>,
        ttl: Ttl,
    ) -> Result<(), CacheError> {
        let ttl = self.resolve_ttl(ttl);
        let mut dict = self.load_for_update(key).await?.unwrap_or_default();
        dict.set(field, value.into());
        self.write(key, dict, ttl).await
    }

    /// Push `value` onto the sequence in `field`, creating it if missing.
    pub async fn append_field(
        &self,
        key: &EntityKey,
        field: &str,
        value: impl Into<Value>,
        ttl: Ttl,
    ) -> Result<(), CacheError> {
        let ttl = self.resolve_ttl(ttl);
        let mut dict = self.load_for_update(key).await?.unwrap_or_default();
        dict.append(field, value.into())
            .map_err(|NotASequence(_)| CacheError::NotASequence {
                key: key.clone(),
                field: field.to_string(),
            })?;
        self.write(key, dict, ttl).await
    }

    /// Remove `field`. An absent dictionary is left absent.
    ///
    /// The remaining fields are written back with the configured default
    /// TTL, so removing a field also restarts the entity's lifetime.
    pub async fn delete_field(&self, key: &EntityKey, field: &str) -> Result<(), CacheError> {
        let Some(mut dict) = self.load_for_update(key).await? else {
            return Ok(());
        };
        dict.remove(field);
        let ttl = self.resolve_ttl(Ttl::Default);
        self.write(key, dict, ttl).await
    }

    /// Delete whole dictionaries.
    pub async fn delete_entities(&self, keys: &[EntityKey]) -> Result<(), CacheError> {
        let raw: Vec<String> = keys.iter().map(|k| k.as_str().to_string()).collect();
        if let Err(err) = self.store.delete_multiple(&raw).await {
            self.reporter.clear_failed(keys, &err);
            return Err(err.into());
        }
        debug!(count = keys.len(), "Deleted entities");
        Ok(())
    }

    /// Clear the entire store, across every namespace.
    pub async fn wipe_all(&self) -> Result<(), CacheError> {
        if let Err(err) = self.store.clear().await {
            self.reporter.clear_failed(&[], &err);
            return Err(err.into());
        }
        debug!("Wiped cache");
        Ok(())
    }

    /// Make `handler` the active handler for `chat_id`, with the default TTL.
    pub async fn set_conversation_handler(
        &self,
        chat_id: i64,
        handler: &HandlerRef,
    ) -> Result<(), CacheError> {
        let state = serde_json::to_value(handler)?;
        self.set_field(
            &EntityKey::conversation(chat_id),
            CONVERSATION_STATE_FIELD,
            state,
            Ttl::Default,
        )
        .await
    }

    /// Drop the conversation entity for `chat_id`.
    pub async fn delete_conversation(&self, chat_id: i64) -> Result<(), CacheError> {
        self.delete_entities(&[EntityKey::conversation(chat_id)]).await
    }

    async fn load_for_update(&self, key: &EntityKey) -> Result<Option<FieldDictionary>, CacheError> {
        match self.get_dictionary(key).await {
            Err(CacheError::Store(err)) => {
                self.reporter.read_failed(key, &err);
                Err(CacheError::Store(err))
            }
            other => other,
        }
    }

    async fn write(
        &self,
        key: &EntityKey,
        dict: FieldDictionary,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let fields = dict.len();
        if let Err(err) = self.store.set(key.as_str(), dict.into_value(), ttl).await {
            self.reporter.write_failed(key, &err);
            return Err(err.into());
        }
        debug!(key = %key, fields, ttl = ?ttl, "Wrote dictionary");
        Ok(())
    }
}

/// [`ScopedCache`] operations bound to one entity.
pub struct ScopeHandle<'a> {
    cache: &'a ScopedCache,
    key: EntityKey,
}

impl ScopeHandle<'_> {
    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    pub async fn get(&self) -> Result<Option<FieldDictionary>, CacheError> {
        self.cache.get_dictionary(&self.key).await
    }

    pub async fn get_field(&self, field: &str) -> Result<Option<Value>, CacheError> {
        self.cache.get_field(&self.key, field).await
    }

    pub async fn get_field_as<T: DeserializeOwned>(&self, field: &str) -> Result<Option<T>, CacheError> {
        self.cache.get_field_as(&self.key, field).await
    }

    pub async fn set_field(&self, field: &str, value: impl Into<Value>) -> Result<(), CacheError> {
        self.cache.set_field(&self.key, field, value, Ttl::Default).await
    }

    pub async fn set_field_with_ttl(
        &self,
        field: &str,
        value: impl Into<Value>,
        ttl: Ttl,
    ) -> Result<(), CacheError> {
        self.cache.set_field(&self.key, field, value, ttl).await
    }

    pub async fn append_field(&self, field: &str, value: impl Into<Value>) -> Result<(), CacheError> {
        self.cache.append_field(&self.key, field, value, Ttl::Default).await
    }

    pub async fn append_field_with_ttl(
        &self,
        field: &str,
        value: impl Into<Value>,
        ttl: Ttl,
    ) -> Result<(), CacheError> {
        self.cache.append_field(&self.key, field, value, ttl).await
    }

    pub async fn delete_field(&self, field: &str) -> Result<(), CacheError> {
        self.cache.delete_field(&self.key, field).await
    }

    /// Delete the whole entity.
    pub async fn delete(&self) -> Result<(), CacheError> {
        self.cache.delete_entities(std::slice::from_ref(&self.key)).await
    }
}
