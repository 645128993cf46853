//! Handler trait and the context handed to it.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::cache::field_store::{CacheError, ScopedCache};
use crate::conversation::{HandlerRef, Update};

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("missing dependency: {0}")]
    MissingDependency(&'static str),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("invalid update: {0}")]
    InvalidUpdate(String),

    #[error("{0}")]
    Failed(String),
}

/// A step of a conversation, resumable from stored state.
#[async_trait]
pub trait ConversationHandler: Send + Sync {
    /// Handle one update. The returned value is the reply.
    async fn handle(&self, ctx: Context) -> Result<Value, HandlerError>;
}

/// Type-keyed dependencies shared with handlers.
#[derive(Default)]
pub struct Container {
    entries: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `value`, replacing any previous value of the same type.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) {
        self.entries.insert(TypeId::of::<T>(), Arc::new(value));
    }

    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.insert(value);
        self
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Everything a handler sees for one invocation.
#[derive(Debug, Clone)]
pub struct Context {
    chat_id: i64,
    update: Update,
    container: Arc<Container>,
    state: HandlerRef,
}

impl Context {
    pub fn new(chat_id: i64, update: Update, container: Arc<Container>, state: HandlerRef) -> Self {
        Self {
            chat_id,
            update,
            container,
            state,
        }
    }

    pub fn chat_id(&self) -> i64 {
        self.chat_id
    }

    pub fn update(&self) -> &Update {
        &self.update
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    /// The stored handler reference this invocation was resumed from.
    pub fn state(&self) -> &HandlerRef {
        &self.state
    }

    pub fn payload(&self) -> &Value {
        &self.state.payload
    }

    /// The cache registered in the container.
    pub fn cache(&self) -> Result<&ScopedCache, HandlerError> {
        self.container
            .get::<ScopedCache>()
            .ok_or(HandlerError::MissingDependency("ScopedCache"))
    }
}
