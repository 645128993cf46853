//! Per-chat conversation state.
//!
//! A chat's conversation dictionary holds a reserved `state` field naming the
//! handler that should receive the chat's next update.
//!
//! - [`handler`]: handler trait, context and dependency container
//! - [`registry`]: name → handler lookup
//! - [`router`]: dispatch with self-healing state removal
//! - [`builtin`]: handlers shipped with the server

pub mod builtin;
pub mod handler;
pub mod registry;
pub mod router;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::cache::field_store::CacheError;

pub use handler::{ConversationHandler, Container, Context, HandlerError};
pub use registry::HandlerRegistry;
pub use router::{ConversationRouter, DispatchOutcome};

/// An inbound event addressed to a chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub chat_id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub text: Option<String>,
}

/// What gets stored as conversation state: a registered handler name plus
/// the data it was parked with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerRef {
    pub handler: String,
    #[serde(default)]
    pub payload: Value,
}

impl HandlerRef {
    pub fn new(handler: impl Into<String>) -> Self {
        Self {
            handler: handler.into(),
            payload: Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("failed to load conversation: {0}")]
    Fetch(CacheError),

    #[error("conversation state is malformed: {0}")]
    Malformed(String),

    #[error("no handler registered as {0:?}")]
    Unregistered(String),

    #[error("handler {name:?} failed: {source}")]
    Handler {
        name: String,
        #[source]
        source: HandlerError,
    },

    #[error("handler {name:?} panicked: {message}")]
    Panicked { name: String, message: String },
}
