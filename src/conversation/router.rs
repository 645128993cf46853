//! Dispatch of inbound updates to the handler parked in a chat's
//! conversation state.
//!
//! A chat is either idle (no `state` field) or has a handler set. Any
//! failure to run the stored handler drops the conversation so that the
//! broken state is not retried on the next update. A store failure while
//! loading the state is only reported.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::dictionary::is_blank;
use crate::cache::field_store::{CacheError, ScopedCache, CONVERSATION_STATE_FIELD};
use crate::cache::key::EntityKey;
use crate::conversation::{
    Container, Context, DispatchError, HandlerRef, HandlerRegistry, Update,
};

/// How a dispatch ended. Every failure has already been reported.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// The chat has no active handler; nothing ran.
    NoHandler,
    /// The handler ran and replied.
    Handled(Value),
    /// The handler could not run or failed; the conversation was cleared.
    Failed,
    /// The conversation state could not be loaded; nothing ran.
    FetchFailed,
}

#[derive(Clone)]
pub struct ConversationRouter {
    cache: ScopedCache,
    registry: HandlerRegistry,
}

impl ConversationRouter {
    pub fn new(cache: ScopedCache, registry: HandlerRegistry) -> Self {
        Self { cache, registry }
    }

    pub fn cache(&self) -> &ScopedCache {
        &self.cache
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Park `handler` as the chat's active handler with the default TTL.
    pub async fn set_handler(&self, chat_id: i64, handler: &HandlerRef) -> Result<(), CacheError> {
        self.cache.set_conversation_handler(chat_id, handler).await
    }

    /// Drop the chat's conversation entirely.
    pub async fn clear_handler(&self, chat_id: i64) -> Result<(), CacheError> {
        self.cache.delete_conversation(chat_id).await
    }

    /// The handler currently parked for `chat_id`, if any.
    pub async fn current_handler(&self, chat_id: i64) -> Result<Option<HandlerRef>, CacheError> {
        let state = self
            .cache
            .get_field(&EntityKey::conversation(chat_id), CONVERSATION_STATE_FIELD)
            .await?;
        match state {
            Some(state) if !is_blank(&state) => Ok(Some(serde_json::from_value(state)?)),
            _ => Ok(None),
        }
    }

    /// Hand `update` to the chat's active handler, if there is one.
    pub async fn dispatch(&self, chat_id: i64, update: &Update, container: Arc<Container>) -> DispatchOutcome {
        let key = EntityKey::conversation(chat_id);

        let state = match self.cache.get_dictionary(&key).await {
            Ok(Some(mut dict)) => dict.remove(CONVERSATION_STATE_FIELD),
            Ok(None) => None,
            Err(CacheError::MalformedDictionary { .. }) => {
                let err = DispatchError::Malformed(format!("{key} does not hold a dictionary"));
                return self.fail(chat_id, update, err).await;
            }
            Err(err) => {
                self.cache
                    .reporter()
                    .dispatch_failed(chat_id, update, &DispatchError::Fetch(err));
                return DispatchOutcome::FetchFailed;
            }
        };

        let state = match state {
            Some(state) if !is_blank(&state) => state,
            _ => {
                debug!(chat_id, update_id = update.update_id, "No active conversation");
                return DispatchOutcome::NoHandler;
            }
        };

        match self.invoke(chat_id, update, container, state).await {
            Ok(reply) => DispatchOutcome::Handled(reply),
            Err(err) => self.fail(chat_id, update, err).await,
        }
    }

    async fn invoke(
        &self,
        chat_id: i64,
        update: &Update,
        container: Arc<Container>,
        state: Value,
    ) -> Result<Value, DispatchError> {
        let state: HandlerRef =
            serde_json::from_value(state).map_err(|e| DispatchError::Malformed(e.to_string()))?;
        let name = state.handler.clone();
        let handler = self
            .registry
            .get(&name)
            .ok_or_else(|| DispatchError::Unregistered(name.clone()))?;

        debug!(chat_id, update_id = update.update_id, handler = %name, "Dispatching update");

        let ctx = Context::new(chat_id, update.clone(), container, state);
        match AssertUnwindSafe(handler.handle(ctx)).catch_unwind().await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(source)) => Err(DispatchError::Handler { name, source }),
            Err(panic) => Err(DispatchError::Panicked {
                name,
                message: panic_message(panic.as_ref()),
            }),
        }
    }

    async fn fail(&self, chat_id: i64, update: &Update, err: DispatchError) -> DispatchOutcome {
        self.cache.reporter().dispatch_failed(chat_id, update, &err);
        // A failed delete has already been reported by the cache.
        if self.cache.delete_conversation(chat_id).await.is_err() {
            warn!(chat_id, "Conversation state could not be cleared");
        }
        DispatchOutcome::Failed
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
